pub mod arguments;
pub mod assets;
pub mod classpath;
pub mod natives;
pub mod process;
pub mod rules;
pub mod version_parser;

pub use arguments::{build_launch_command, build_server_command, LaunchCommand, LaunchTarget};
pub use assets::{fetch_asset_index, AssetIndex};
pub use classpath::build_classpath;
pub use natives::{extract_natives, native_tasks};
pub use process::{
    launcher_for, PosixLauncher, ProcessHandle, ProcessLauncher, ProcessState, ProcessSupervisor,
    WindowsLauncher,
};
pub use rules::{arch_suffix, is_allowed, is_modern_layout};
pub use version_parser::{fetch_descriptor, VersionDescriptor};
