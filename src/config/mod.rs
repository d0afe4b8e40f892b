//! Strategy configuration
//!
//! - `macros`: the `config_struct!` macro used to declare sections
//! - `schemas`: every section with its defaults
//! - `utils`: path resolution, loading and validation

pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::*;
pub use utils::{load_config_from_path, parse_config, resolve_config_path, CONFIG_ENV_VAR};
