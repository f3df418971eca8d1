mod app;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

fn main() -> ExitCode {
    let args = app::Args::parse();
    app::init_tracing();
    info!("=== Office Sim Startup ===");

    match app::build_app(&args) {
        Ok(wiring) => app::run(wiring),
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}
