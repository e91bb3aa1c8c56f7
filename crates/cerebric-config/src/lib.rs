//! Thin configuration adapter: runtime TOML settings, YAML policy
//! documents, and env-var-overridable path resolution. Not part of the
//! core's algorithmic surface — a loading layer over it.

pub mod paths;
pub mod policy_file;
pub mod runtime;

pub use paths::{config_dir, data_dir, log_dir};
pub use policy_file::load_policy;
pub use runtime::RuntimeConfig;
