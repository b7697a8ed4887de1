//! Settings are loaded from a TOML file (`settings/dev.toml` in debug builds)
//! whose path can be overridden with `--settings`.

mod cli;
pub use clap::{Parser, Subcommand, ValueEnum};
pub use cli::*;

mod settings;
pub use settings::*;
