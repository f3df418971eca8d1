use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use office_engine::{CategoryWeights, GridError, ParcelRegion, WorldConfig};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::records::{AvatarRecord, GridRecord, ZoneRecord};
use super::script::ScriptEntry;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read world file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse world json: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
    #[error("parse world json at {path}: {source}")]
    ParseAt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("grid has {actual} rows, expected {expected}")]
    RowCount { expected: u32, actual: usize },
    #[error("grid row {row} has {actual} tiles, expected {expected}")]
    RowWidth {
        row: usize,
        expected: u32,
        actual: usize,
    },
    #[error("invalid grid: {0}")]
    Grid(#[from] GridError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub(crate) struct ScreenRecord {
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl Default for ScreenRecord {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ParcelSettings {
    /// Whole map when absent.
    #[serde(default)]
    pub(crate) region: Option<ParcelRegion>,
    pub(crate) cell_size: u32,
    #[serde(default)]
    pub(crate) weights: CategoryWeights,
    #[serde(default = "default_assign_buildings")]
    pub(crate) assign_buildings: bool,
    #[serde(default)]
    pub(crate) seed: Option<u64>,
}

fn default_assign_buildings() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorldFile {
    pub(crate) grid: GridRecord,
    #[serde(default)]
    pub(crate) screen: ScreenRecord,
    /// Raw entries: a malformed zone is skipped by `zone_records`, it does
    /// not fail the whole file.
    #[serde(default)]
    pub(crate) zones: Vec<Value>,
    #[serde(default)]
    pub(crate) avatars: Vec<AvatarRecord>,
    #[serde(default)]
    pub(crate) script: Vec<ScriptEntry>,
    #[serde(default)]
    pub(crate) parcels: Option<ParcelSettings>,
    #[serde(flatten)]
    pub(crate) simulation: WorldConfig,
}

pub(crate) fn load_world_file(path: &Path) -> Result<WorldFile, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_world_json(&raw)
}

pub(crate) fn parse_world_json(raw: &str) -> Result<WorldFile, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, WorldFile>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        if path.is_empty() || path == "." {
            ConfigError::Parse { source }
        } else {
            ConfigError::ParseAt { path, source }
        }
    })
}

/// Converts each raw zone entry on its own. Entries that do not describe a
/// zone are logged with their JSON path and dropped.
pub(crate) fn zone_records(entries: Vec<Value>) -> Vec<ZoneRecord> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            match serde_path_to_error::deserialize::<_, ZoneRecord>(entry) {
                Ok(record) => Some(record),
                Err(error) => {
                    warn!(
                        index,
                        path = %error.path(),
                        error = %error.inner(),
                        "zone_record_skipped"
                    );
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use office_engine::Easing;
    use tempfile::TempDir;

    use super::*;

    const MINIMAL: &str = r#"{
        "grid": { "width": 2, "height": 1, "tileSize": 32, "rows": [".."] }
    }"#;

    #[test]
    fn minimal_file_uses_defaults() {
        let file = parse_world_json(MINIMAL).expect("parse");
        assert_eq!(file.grid.width, 2);
        assert!(file.zones.is_empty());
        assert_eq!(file.screen, ScreenRecord::default());
        assert_eq!(file.simulation, WorldConfig::default());
    }

    #[test]
    fn overrides_apply_to_named_fields_only() {
        let raw = r#"{
            "grid": { "width": 1, "height": 1, "tileSize": 8, "rows": ["."] },
            "planner": { "allowDiagonal": true },
            "movement": { "pathEasing": "ease_out_cubic" },
            "zoneCheckIntervalSeconds": 0.25
        }"#;
        let file = parse_world_json(raw).expect("parse");
        assert!(file.simulation.planner.allow_diagonal);
        assert_eq!(file.simulation.planner.max_expanded_nodes, 20_000);
        assert_eq!(file.simulation.movement.path_easing, Easing::EaseOutCubic);
        assert_eq!(file.simulation.zone_check_interval_seconds, 0.25);
    }

    #[test]
    fn parse_error_names_json_path() {
        let raw = r#"{
            "grid": { "width": 1, "height": 1, "tileSize": 8, "rows": ["."] },
            "avatars": [ { "id": "ada", "cell": { "x": "zero", "y": 0 } } ]
        }"#;
        let error = parse_world_json(raw).expect_err("should fail");
        match error {
            ConfigError::ParseAt { path, .. } => assert_eq!(path, "avatars[0].cell.x"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_zone_is_skipped_and_the_rest_load() {
        let raw = r#"{
            "grid": { "width": 4, "height": 4, "tileSize": 8, "rows": ["....", "....", "....", "...."] },
            "zones": [
                { "id": "a", "name": "A", "code": "A", "bounds": { "x1": "zero", "y1": 0, "x2": 1, "y2": 1 } },
                { "id": "bad", "name": "B", "code": "B" },
                { "id": "ok", "name": "Ok", "code": "OK", "bounds": { "x1": 0, "y1": 0, "x2": 2, "y2": 2 } }
            ]
        }"#;
        let file = parse_world_json(raw).expect("one bad zone does not fail the file");
        assert_eq!(file.zones.len(), 3);
        let records = zone_records(file.zones);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "ok");
    }

    #[test]
    fn load_reads_from_disk_and_reports_missing_file() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("world.json");
        fs::write(&path, MINIMAL).expect("write world");
        assert_eq!(load_world_file(&path).expect("load").grid.height, 1);

        let missing = temp.path().join("missing.json");
        assert!(matches!(
            load_world_file(&missing),
            Err(ConfigError::Read { .. })
        ));
    }
}
