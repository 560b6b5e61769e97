/// App Registry seam.
///
/// The host platform decides what "installed" and "launch" mean. The built-in
/// implementation reads a JSON manifest and optionally spawns a command per app.

use std::path::Path;
use std::process::{Child, Command};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Failures of the app registry itself, as opposed to an unknown app.
#[derive(Debug, thiserror::Error)]
pub enum AppRegistryError {
    #[error("failed to read app manifest {path}: {source}")]
    ManifestIo {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid app manifest: {0}")]
    ManifestFormat(#[from] serde_json::Error),
    #[error("failed to start {package}: {source}")]
    Spawn {
        package: String,
        source: std::io::Error,
    },
    /// Platform-specific failure reported by a host integration.
    #[error("{0}")]
    Platform(String),
}

/// Result of a launch request for a well-formed package name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    Launched,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One entry of the installed-app inventory.
pub struct InstalledApp {
    /// Platform identifier used to launch the app (e.g., "com.example.notes")
    pub package_name: String,
    /// Human-readable label, serialized as `name`
    #[serde(rename = "name")]
    pub display_name: String,
    /// Disabled apps are listed but cannot be launched
    pub enabled: bool,
}

/// Access to the host's installed applications.
///
/// Shared by every connection, so implementations must be thread-safe.
pub trait AppRegistry: Send + Sync {
    /// Start the app identified by `package`.
    ///
    /// Unknown and disabled apps are `Ok(LaunchOutcome::NotFound)`; `Err` is
    /// reserved for failures of the registry or of the launch itself.
    fn launch(&self, package: &str) -> Result<LaunchOutcome, AppRegistryError>;

    /// Every installed app, enabled or not.
    fn list_installed(&self) -> Result<Vec<InstalledApp>, AppRegistryError>;
}

/// Inventory payload shared by the `get_app_info` tool and the app info resource.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AppInfo {
    installed_apps: Vec<InstalledApp>,
    total_count: usize,
}

/// JSON-encoded inventory, or a descriptive error text.
pub fn app_info_text(apps: &dyn AppRegistry) -> String {
    let installed_apps = match apps.list_installed() {
        Ok(list) => list,
        Err(e) => return format!("Error getting app info: {}", e),
    };
    let info = AppInfo {
        total_count: installed_apps.len(),
        installed_apps,
    };
    serde_json::to_string(&info).unwrap_or_else(|e| format!("Error getting app info: {}", e))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEntry {
    package_name: String,
    name: String,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    /// Program and arguments run on launch.
    #[serde(default)]
    command: Vec<String>,
}

fn enabled_by_default() -> bool {
    true
}

/// Registry backed by a static list of apps.
#[derive(Debug, Default)]
pub struct ManifestAppRegistry {
    entries: Vec<ManifestEntry>,
}

impl ManifestAppRegistry {
    /// Parse a manifest: a JSON array of `{packageName, name, enabled?, command?}`.
    pub fn from_json(json: &str) -> Result<Self, AppRegistryError> {
        Ok(Self {
            entries: serde_json::from_str(json)?,
        })
    }

    /// Read and parse the manifest at `path`.
    ///
    /// # Arguments
    /// * `path` - JSON manifest file, usually from `APPS_MANIFEST`
    pub fn from_file(path: &Path) -> Result<Self, AppRegistryError> {
        let json = std::fs::read_to_string(path).map_err(|source| AppRegistryError::ManifestIo {
            path: path.display().to_string(),
            source,
        })?;
        let registry = Self::from_json(&json)?;
        info!(path = %path.display(), apps = registry.entries.len(), "Loaded app manifest");
        Ok(registry)
    }
}

/// Wait for a launched app on a detached thread so it never lingers as a zombie.
fn reap(package: &str, mut child: Child) {
    let package = package.to_string();
    let pid = child.id();
    let spawned = std::thread::Builder::new()
        .name(format!("reap-{}", pid))
        .spawn(move || match child.wait() {
            Ok(status) => debug!(package = %package, pid, %status, "App exited"),
            Err(e) => warn!(package = %package, pid, error = %e, "Failed to wait for app"),
        });
    if let Err(e) = spawned {
        warn!(pid, error = %e, "Failed to start reaper thread; app will not be reaped");
    }
}

impl AppRegistry for ManifestAppRegistry {
    fn launch(&self, package: &str) -> Result<LaunchOutcome, AppRegistryError> {
        let Some(entry) = self
            .entries
            .iter()
            .find(|e| e.package_name == package && e.enabled)
        else {
            return Ok(LaunchOutcome::NotFound);
        };

        if let Some((program, args)) = entry.command.split_first() {
            let child = Command::new(program)
                .args(args)
                .spawn()
                .map_err(|source| AppRegistryError::Spawn {
                    package: package.to_string(),
                    source,
                })?;
            info!(package, pid = child.id(), "Launched app");
            reap(package, child);
        } else {
            warn!(package, "App has no launch command; reporting launched");
        }
        Ok(LaunchOutcome::Launched)
    }

    fn list_installed(&self) -> Result<Vec<InstalledApp>, AppRegistryError> {
        Ok(self
            .entries
            .iter()
            .map(|e| InstalledApp {
                package_name: e.package_name.clone(),
                display_name: e.name.clone(),
                enabled: e.enabled,
            })
            .collect())
    }
}
