//! Command-line entry point: flags, logging, configuration and the daemon lifecycle.

mod app;
mod env;
mod runtime;

pub use app::run;
pub use env::{CliArgs, LogFormat};
pub use runtime::{init_logging, load_config, LoadedConfig};
