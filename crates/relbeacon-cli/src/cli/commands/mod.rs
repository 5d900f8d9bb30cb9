//! CLI command handlers, one per file.

mod config_path;
mod download;
mod resolve;
mod validate;
mod watch;

pub use config_path::run_config_path;
pub use download::run_download;
pub use resolve::run_resolve;
pub use validate::run_validate;
pub use watch::run_watch;
