/// Resource Provider
///
/// Maps a resource URI to a freshly computed JSON text. Unknown URIs are not
/// an error at this layer: they read as the literal text "Resource not found".

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::core::apps::{self, AppRegistry};
use crate::core::inference::InferenceHandle;
use crate::core::protocol::ResourceDescriptor;

/// Engine state, model name and memory footprint
pub const MODEL_STATUS_URI: &str = "coremind://model/status";
/// Installed app inventory
pub const APP_INFO_URI: &str = "coremind://app/info";

/// Text returned for a URI nobody serves
pub const RESOURCE_NOT_FOUND: &str = "Resource not found";

/// Descriptors for every resource [`ResourceProvider`] can read.
pub fn descriptors() -> Vec<ResourceDescriptor> {
    vec![
        ResourceDescriptor {
            uri: MODEL_STATUS_URI.to_string(),
            name: "AI Model Status".to_string(),
            description: "Current status of the AI model".to_string(),
            mime_type: "application/json".to_string(),
        },
        ResourceDescriptor {
            uri: APP_INFO_URI.to_string(),
            name: "App Information".to_string(),
            description: "CoreMind application information".to_string(),
            mime_type: "application/json".to_string(),
        },
    ]
}

#[derive(Debug, Serialize)]
struct ModelStatus<'a> {
    status: &'static str,
    model_name: &'a str,
    memory_usage: String,
    last_updated: u64,
}

/// Computes resource contents on each read; nothing is cached.
pub struct ResourceProvider {
    /// Source of the app inventory
    apps: Arc<dyn AppRegistry>,
    /// Source of the engine status snapshot
    inference: InferenceHandle,
    /// Display name reported alongside the engine state
    model_name: String,
}

impl ResourceProvider {
    /// Create a provider over the shared collaborators.
    ///
    /// # Arguments
    /// * `apps` - App registry behind `coremind://app/info`
    /// * `inference` - Engine handle behind `coremind://model/status`
    /// * `model_name` - Name reported as `model_name`
    pub fn new(apps: Arc<dyn AppRegistry>, inference: InferenceHandle, model_name: String) -> Self {
        Self {
            apps,
            inference,
            model_name,
        }
    }

    /// Read the resource at `uri` as JSON text.
    ///
    /// Never fails: an unknown URI reads as [`RESOURCE_NOT_FOUND`], and
    /// collaborator failures read as descriptive text.
    pub fn read(&self, uri: &str) -> String {
        match uri {
            MODEL_STATUS_URI => self.model_status(),
            APP_INFO_URI => apps::app_info_text(self.apps.as_ref()),
            _ => RESOURCE_NOT_FOUND.to_string(),
        }
    }

    fn model_status(&self) -> String {
        let engine = self.inference.status();
        let status = ModelStatus {
            status: engine.state.as_str(),
            model_name: &self.model_name,
            memory_usage: format_bytes(engine.memory_bytes.unwrap_or(0)),
            last_updated: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        };
        serde_json::to_string(&status).unwrap_or_else(|e| format!("Error: {}", e))
    }
}

/// Human-readable size, e.g. `1.2GB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{}B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.1}{}", value, unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::apps::ManifestAppRegistry;
    use crate::core::inference::PlaceholderEngine;
    use serde_json::Value;

    fn provider() -> ResourceProvider {
        let apps = ManifestAppRegistry::from_json(r#"[{"packageName":"a.b","name":"AB"}]"#).unwrap();
        let inference = InferenceHandle::spawn(PlaceholderEngine::new(vec![]), 2).unwrap();
        ResourceProvider::new(Arc::new(apps), inference, "Gemma 3-1B IT".into())
    }

    #[test]
    fn model_status_has_expected_keys() {
        let text = provider().read(MODEL_STATUS_URI);
        let value: Value = serde_json::from_str(&text).unwrap();
        for key in ["status", "model_name", "memory_usage", "last_updated"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["status"], "not_loaded");
        assert_eq!(value["model_name"], "Gemma 3-1B IT");
        assert_eq!(value["memory_usage"], "0B");
        assert!(value["last_updated"].as_u64().unwrap() > 0);
    }

    #[test]
    fn app_info_matches_tool_payload() {
        let provider = provider();
        let value: Value = serde_json::from_str(&provider.read(APP_INFO_URI)).unwrap();
        assert_eq!(value["totalCount"], 1);
        assert_eq!(value["installedApps"][0]["packageName"], "a.b");
    }

    #[test]
    fn unknown_uri_reads_as_not_found_text() {
        assert_eq!(provider().read("coremind://nope"), "Resource not found");
    }

    #[test]
    fn format_bytes_picks_unit() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(2048), "2.0KB");
        assert_eq!(format_bytes(1_288_490_189), "1.2GB");
    }
}
