//! Command line composition for client and server launches
use crate::error::{IoResultExt, LauncherError, Result};
use crate::game::installer::config::LauncherConfig;
use crate::game::launcher::version_parser::VersionDescriptor;
use crate::utils::process::quote_arg;
use dunce::canonicalize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Placeholder identity for offline launches
pub const OFFLINE_ACCESS_TOKEN: &str = "0";
pub const OFFLINE_USER_TYPE: &str = "mojang";

/// What the JVM is asked to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    MainClass(String),
    Jar(PathBuf),
}

/// A fully composed child command, minus the java executable.
///
/// Arguments are kept as a vector and passed to the child without a shell;
/// [`Display`](fmt::Display) renders a quoted command line for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub jvm_args: Vec<String>,
    pub target: LaunchTarget,
    pub game_args: Vec<String>,
    /// Directory the child is started in
    pub working_dir: PathBuf,
}

impl LaunchCommand {
    /// Full argument vector in launch order
    pub fn args(&self) -> Vec<String> {
        let mut args = self.jvm_args.clone();
        match &self.target {
            LaunchTarget::MainClass(main_class) => args.push(main_class.clone()),
            LaunchTarget::Jar(jar) => {
                args.push("-jar".to_string());
                args.push(jar.to_string_lossy().into_owned());
            }
        }
        args.extend(self.game_args.iter().cloned());
        args
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.args().iter().map(|a| quote_arg(a)).collect();
        f.write_str(&rendered.join(" "))
    }
}

fn absolute_dir(path: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(path).fs_context(path)?;
    canonicalize(path).fs_context(path)
}

fn heap_args(config: &LauncherConfig) -> Result<Vec<String>> {
    let mut args = vec![
        format!("-Xmx{}", config.max_heap),
        format!("-Xms{}", config.min_heap),
    ];
    args.extend(config.extra_jvm_args()?);
    Ok(args)
}

/// Compose an offline client launch.
///
/// Creates the per-version game directory, the assets directory and the
/// natives directory if needed.
pub fn build_launch_command(
    config: &LauncherConfig,
    username: &str,
    classpath: &str,
    descriptor: &VersionDescriptor,
    version_id: &str,
) -> Result<LaunchCommand> {
    if username.trim().is_empty() {
        return Err(LauncherError::parse("username", "must not be empty"));
    }
    let main_class = descriptor.main_class.trim();
    if main_class.is_empty() {
        return Err(LauncherError::NotFound(format!("mainClass for {}", version_id)));
    }

    let game_dir = absolute_dir(&config.version_dir(version_id))?;
    let assets_dir = absolute_dir(&config.assets_dir())?;
    let natives_dir = absolute_dir(&config.natives_dir(version_id))?;

    let mut jvm_args = heap_args(config)?;
    jvm_args.push(format!("-Djava.library.path={}", natives_dir.display()));
    jvm_args.push("-cp".to_string());
    jvm_args.push(classpath.to_string());

    let game_args = vec![
        "--username".to_string(),
        username.to_string(),
        "--version".to_string(),
        version_id.to_string(),
        "--gameDir".to_string(),
        game_dir.to_string_lossy().into_owned(),
        "--assetsDir".to_string(),
        assets_dir.to_string_lossy().into_owned(),
        "--assetIndex".to_string(),
        descriptor.asset_index_id().to_string(),
        "--uuid".to_string(),
        uuid::Uuid::nil().hyphenated().to_string(),
        "--accessToken".to_string(),
        OFFLINE_ACCESS_TOKEN.to_string(),
        "--userType".to_string(),
        OFFLINE_USER_TYPE.to_string(),
    ];

    let command = LaunchCommand {
        jvm_args,
        target: LaunchTarget::MainClass(main_class.to_string()),
        game_args,
        working_dir: game_dir,
    };
    log::debug!("Launch command: {}", command);
    Ok(command)
}

/// Compose a dedicated-server launch: `-Xmx -Xms -jar server.jar nogui`,
/// run from `versions/<id>/server`.
pub fn build_server_command(config: &LauncherConfig, version_id: &str) -> Result<LaunchCommand> {
    let jar = config.server_jar_path(version_id);
    if !jar.is_file() {
        return Err(LauncherError::NotFound(format!(
            "server jar {}",
            jar.display()
        )));
    }
    let server_dir = absolute_dir(&config.server_dir(version_id))?;
    let jar = canonicalize(&jar).fs_context(&jar)?;

    Ok(LaunchCommand {
        jvm_args: heap_args(config)?,
        target: LaunchTarget::Jar(jar),
        game_args: vec!["nogui".to_string()],
        working_dir: server_dir,
    })
}
