pub mod config;
pub mod core;
pub mod types;
pub mod vanilla;

pub use config::LauncherConfig;
pub use vanilla::{
    ensure_server, install_client, install_runtime, install_server, prepare_launch,
    resolve_descriptor, ClientInstall, PreparedLaunch,
};
