use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use office_engine::Parcel;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ExportError {
    #[error("encode parcels: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes the parcel list as pretty JSON, replacing any previous export.
pub(crate) fn export_parcels(path: &Path, parcels: &[Parcel]) -> Result<(), ExportError> {
    let mut json = serde_json::to_string_pretty(parcels).map_err(ExportError::Encode)?;
    json.push('\n');
    write_text_atomic(path, &json).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let staged = staging_path_for(path);
    fs::write(&staged, text.as_bytes())?;
    swap_into_place(&staged, path)
}

fn swap_into_place(staged: &Path, final_path: &Path) -> io::Result<()> {
    match fs::remove_file(final_path) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => {
            let _ = fs::remove_file(staged);
            return Err(error);
        }
    }

    if let Err(error) = fs::rename(staged, final_path) {
        let _ = fs::remove_file(staged);
        return Err(error);
    }
    Ok(())
}

fn staging_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("parcels.json");
    path.with_file_name(format!("{file_name}.tmp"))
}

#[cfg(test)]
mod tests {
    use office_engine::{ParcelCategory, ParcelGridGenerator, ParcelRegion};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use tempfile::TempDir;

    use super::*;

    fn sample_parcels() -> Vec<Parcel> {
        let generator = ParcelGridGenerator::new(Default::default(), true).expect("generator");
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        generator
            .generate(
                ParcelRegion {
                    x: 0,
                    y: 0,
                    width: 4,
                    height: 2,
                },
                2,
                &mut rng,
            )
            .expect("parcels")
    }

    #[test]
    fn export_writes_json_and_leaves_no_staging_file() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("out").join("parcels.json");
        let parcels = sample_parcels();

        export_parcels(&path, &parcels).expect("export");

        let raw = fs::read_to_string(&path).expect("read export");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        let entries = value.as_array().expect("array");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["number"], 1);
        assert!(ParcelCategory::ALL
            .iter()
            .any(|category| serde_json::to_value(category).expect("category") == entries[0]["type"]));
        assert!(!temp.path().join("out").join("parcels.json.tmp").exists());
    }

    #[test]
    fn export_replaces_existing_file() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("parcels.json");
        fs::write(&path, "stale").expect("seed file");

        export_parcels(&path, &[]).expect("export");
        assert_eq!(fs::read_to_string(&path).expect("read"), "[]\n");
    }
}
