use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use office_engine::{
    DebugFacade, GridModel, Parcel, ParcelError, ParcelGridGenerator, ParcelRegion, WorldError,
    Zone,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::config::{
    load_world_file, parse_world_json, zone_records, ConfigError, ParcelSettings,
};
use super::debug::OfficeDebug;
use super::export::{export_parcels, ExportError};
use super::loop_runner::LoopConfig;
use super::metrics::MetricsHandle;
use super::records::{grid_from_record, spawn_avatars, DistrictAttributes, OfficeWorld};
use super::script::ScriptPlayer;
use super::sinks::EventRouter;

const WORLD_FILE_ENV_VAR: &str = "OFFICE_WORLD_FILE";
const DEMO_WORLD: &str = include_str!("../../assets/demo_world.json");

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "office", version, about = "Headless virtual office simulation")]
pub(crate) struct Args {
    /// World description to load instead of the built-in demo office.
    #[arg(long, value_name = "PATH")]
    pub(crate) world: Option<PathBuf>,
    /// Stop after this many ticks even if the world is still busy.
    #[arg(long)]
    pub(crate) ticks: Option<u64>,
    #[arg(long)]
    pub(crate) tps: Option<u32>,
    /// Pace ticks against the wall clock.
    #[arg(long)]
    pub(crate) realtime: bool,
    /// Write the generated parcel layout to this file as JSON.
    #[arg(long, value_name = "PATH")]
    pub(crate) export_parcels: Option<PathBuf>,
    /// Overrides the parcel seed from the world file.
    #[arg(long)]
    pub(crate) seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WorldSource {
    File(PathBuf),
    BuiltIn,
}

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load world: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build world: {0}")]
    World(#[from] WorldError),
    #[error("failed to generate parcels: {0}")]
    Parcels(#[from] ParcelError),
    #[error("failed to export parcels: {0}")]
    Export(#[from] ExportError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) world: OfficeWorld,
    pub(crate) script: ScriptPlayer,
    pub(crate) router: EventRouter,
    pub(crate) debug: Box<dyn DebugFacade<DistrictAttributes>>,
    pub(crate) parcels: Vec<Parcel>,
    pub(crate) metrics: MetricsHandle,
}

pub(crate) fn build_app(args: &Args) -> Result<AppWiring, AppError> {
    let source = resolve_world_source(args.world.clone(), std::env::var_os(WORLD_FILE_ENV_VAR));
    let file = match &source {
        WorldSource::File(path) => {
            info!(path = %path.display(), "world_source_file");
            load_world_file(path)?
        }
        WorldSource::BuiltIn => {
            info!("world_source_builtin");
            parse_world_json(DEMO_WORLD)?
        }
    };

    let grid = grid_from_record(&file.grid)?;
    let mut world = OfficeWorld::new(file.simulation, grid)?;
    world.set_screen_size(file.screen.width, file.screen.height);

    let zone_entries = file.zones.len();
    let records = zone_records(file.zones);
    let zones_skipped = zone_entries - records.len();
    let zone_report = world.load_zones(records.into_iter().map(Zone::from));
    let placed = spawn_avatars(&mut world, &file.avatars);

    let parcels = match &file.parcels {
        Some(settings) => generate_parcels(settings, world.grid(), args.seed)?,
        None => Vec::new(),
    };
    if let Some(path) = &args.export_parcels {
        if parcels.is_empty() {
            warn!(path = %path.display(), "parcel_export_empty");
        }
        export_parcels(path, &parcels)?;
        info!(path = %path.display(), parcels = parcels.len(), "parcels_exported");
    }

    info!(
        width = world.grid().width(),
        height = world.grid().height(),
        zones = zone_report.loaded,
        zones_rejected = zone_report.rejected.len(),
        zones_skipped,
        avatars = placed,
        script_entries = file.script.len(),
        parcels = parcels.len(),
        "world_loaded"
    );

    let defaults = LoopConfig::default();
    let config = LoopConfig {
        target_tps: args.tps.unwrap_or(defaults.target_tps),
        max_ticks: args.ticks.unwrap_or(defaults.max_ticks),
        realtime: args.realtime,
        ..defaults
    };

    Ok(AppWiring {
        config,
        world,
        script: ScriptPlayer::new(file.script),
        router: EventRouter::with_logging(),
        debug: Box::new(OfficeDebug::new(parcels.len())),
        parcels,
        metrics: MetricsHandle::default(),
    })
}

/// Command line first, then the environment, then the built-in demo.
pub(crate) fn resolve_world_source(
    cli_path: Option<PathBuf>,
    env_value: Option<OsString>,
) -> WorldSource {
    if let Some(path) = cli_path {
        return WorldSource::File(path);
    }
    match env_value {
        Some(raw) if !raw.is_empty() => WorldSource::File(PathBuf::from(raw)),
        _ => WorldSource::BuiltIn,
    }
}

fn generate_parcels(
    settings: &ParcelSettings,
    grid: &GridModel,
    seed_override: Option<u64>,
) -> Result<Vec<Parcel>, ParcelError> {
    let generator = ParcelGridGenerator::new(settings.weights, settings.assign_buildings)?;
    let region = settings
        .region
        .unwrap_or_else(|| ParcelRegion::new(0, 0, grid.width(), grid.height()));
    let mut rng = match seed_override.or(settings.seed) {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    generator.generate(region, settings.cell_size, &mut rng)
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn args_for(world: PathBuf) -> Args {
        Args {
            world: Some(world),
            ..Args::default()
        }
    }

    const SMALL_WORLD: &str = r#"{
        "grid": { "width": 6, "height": 4, "tileSize": 16, "rows": ["......", "..##..", "......", "ff...."] },
        "zones": [
            { "id": "w", "name": "West", "code": "W", "bounds": { "x1": 0, "y1": 0, "x2": 3, "y2": 4 } },
            { "id": "bad", "name": "Bad", "code": "B", "bounds": { "x1": 3, "y1": 0, "x2": 1, "y2": 4 } },
            { "id": "broken", "name": "Broken" }
        ],
        "avatars": [ { "id": "ada", "cell": { "x": 0, "y": 0 }, "track": true } ],
        "parcels": { "cellSize": 4, "seed": 5 }
    }"#;

    #[test]
    fn world_source_prefers_cli_then_env() {
        assert_eq!(
            resolve_world_source(Some("a.json".into()), Some("b.json".into())),
            WorldSource::File("a.json".into())
        );
        assert_eq!(
            resolve_world_source(None, Some("b.json".into())),
            WorldSource::File("b.json".into())
        );
        assert_eq!(
            resolve_world_source(None, Some(OsString::new())),
            WorldSource::BuiltIn
        );
        assert_eq!(resolve_world_source(None, None), WorldSource::BuiltIn);
    }

    #[test]
    fn builtin_demo_world_builds() {
        let world = parse_world_json(DEMO_WORLD).expect("demo world parses");
        let grid = grid_from_record(&world.grid).expect("demo grid");
        assert!(grid.width() > 0);
        assert!(!world.zones.is_empty());
        assert_eq!(zone_records(world.zones.clone()).len(), world.zones.len());
        assert!(!world.script.is_empty());
    }

    #[test]
    fn build_app_loads_file_and_exports_parcels() {
        let temp = TempDir::new().expect("tempdir");
        let world_path = temp.path().join("world.json");
        fs::write(&world_path, SMALL_WORLD).expect("write world");
        let export_path = temp.path().join("parcels.json");

        let mut args = args_for(world_path);
        args.export_parcels = Some(export_path.clone());
        args.ticks = Some(42);
        let app = build_app(&args).expect("build app");

        assert_eq!(app.config.max_ticks, 42);
        assert_eq!(app.world.zones().len(), 1);
        assert_eq!(app.world.movement().len(), 1);
        assert_eq!(app.parcels.len(), 2);
        assert!(export_path.exists());
    }

    #[test]
    fn parcel_seed_override_is_deterministic() {
        let temp = TempDir::new().expect("tempdir");
        let world_path = temp.path().join("world.json");
        fs::write(&world_path, SMALL_WORLD).expect("write world");

        let mut args = args_for(world_path);
        args.seed = Some(99);
        let first = build_app(&args).expect("first").parcels;
        let second = build_app(&args).expect("second").parcels;
        assert_eq!(first, second);
    }

    #[test]
    fn missing_world_file_fails_startup() {
        let temp = TempDir::new().expect("tempdir");
        let result = build_app(&args_for(temp.path().join("nope.json")));
        assert!(matches!(result, Err(AppError::Config(ConfigError::Read { .. }))));
    }
}
