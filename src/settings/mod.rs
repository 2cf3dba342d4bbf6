//! Settings come from a TOML file layered with `TURNSTILE__*` environment
//! variables. See `bin/settings_demo.rs` for manual verification.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
