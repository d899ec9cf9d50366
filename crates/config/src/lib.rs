//! Configuration loading and env substitution for the EduLift client.
//!
//! Config files: `edulift.toml`, `edulift.yaml`, or `edulift.json`
//! Searched in `./` then `~/.config/edulift/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        apply_env_overrides, clear_data_dir, config_dir, data_dir,
        discover_and_load, load_config, set_config_dir, set_data_dir,
    },
    schema::{ApiConfig, EduliftConfig, ExpiryMarkerConfig, SessionConfig},
};
