mod bootstrap;
mod config;
mod debug;
mod export;
mod loop_runner;
mod metrics;
mod records;
mod script;
mod sinks;

pub(crate) use bootstrap::{build_app, init_tracing, Args};
pub(crate) use loop_runner::run;
