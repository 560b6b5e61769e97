/// Message Dispatcher
///
/// Turns one inbound text frame into at most one outbound frame. Holds no
/// per-conversation state; correlation is only through the request `id`.
///
/// Two error channels are kept apart:
/// - protocol errors (bad JSON, unknown method, unknown tool) become JSON-RPC
///   `error` objects;
/// - tool and resource failures are successful results whose text describes
///   the failure. Handler panics are caught here and reported the same way.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error, warn};

use crate::core::panic_message;
use crate::core::protocol::{
    ErrorObject, Request, RequestId, ResourceReadResult, ResourcesList, Response, ResultPayload,
    ToolCallResult, ToolsList,
};
use crate::core::registry::CapabilityRegistry;
use crate::core::resources::ResourceProvider;
use crate::tools::ToolInvoker;

/// Routes parsed requests to the catalog, the tools and the resources.
///
/// One dispatcher is shared by every connection and both transports.
pub struct Dispatcher {
    /// Advertised tools and resources (for the list methods and tool lookup)
    registry: Arc<CapabilityRegistry>,
    /// Executes `tools/call`
    tools: ToolInvoker,
    /// Executes `resources/read`
    resources: ResourceProvider,
}

impl Dispatcher {
    /// Create a dispatcher over an immutable catalog.
    ///
    /// # Arguments
    /// * `registry` - Catalog returned by the list methods and checked by `tools/call`
    /// * `tools` - Invoker holding the tool collaborators
    /// * `resources` - Provider answering `resources/read`
    pub fn new(registry: Arc<CapabilityRegistry>, tools: ToolInvoker, resources: ResourceProvider) -> Self {
        Self {
            registry,
            tools,
            resources,
        }
    }

    /// Catalog this dispatcher advertises.
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Handle one text frame. Returns the serialized reply, or `None` for
    /// notifications.
    pub async fn handle_frame(&self, frame: &str) -> Option<String> {
        let response = match Request::parse(frame) {
            Ok(request) => {
                let notification = request.is_notification();
                let response = self.dispatch(request).await;
                if notification {
                    debug!("Notification handled; no reply");
                    return None;
                }
                response
            }
            Err(e) => {
                debug!(error = %e, "Rejecting unparseable frame");
                Response::error(RequestId::Null, ErrorObject::parse_error())
            }
        };

        match serde_json::to_string(&response) {
            Ok(json) => Some(json),
            Err(e) => {
                error!(error = %e, "Error serializing response");
                None
            }
        }
    }

    /// Route a parsed request to its handler.
    pub async fn dispatch(&self, request: Request) -> Response {
        let id = request.id.clone().unwrap_or(RequestId::Null);
        debug!(method = %request.method, ?id, "Dispatching");

        match request.method.as_str() {
            "tools/list" => Response::success(
                id,
                ResultPayload::Tools(ToolsList {
                    tools: self.registry.tools().to_vec(),
                }),
            ),
            "tools/call" => self.call_tool(id, &request).await,
            "resources/list" => Response::success(
                id,
                ResultPayload::Resources(ResourcesList {
                    resources: self.registry.resources().to_vec(),
                }),
            ),
            "resources/read" => self.read_resource(id, &request),
            other => Response::error(id, ErrorObject::method_not_found(other)),
        }
    }

    async fn call_tool(&self, id: RequestId, request: &Request) -> Response {
        // A missing name reads as "null"
        let name = request.param_str("name").unwrap_or("null");
        if self.registry.tool(name).is_none() {
            return Response::error(id, ErrorObject::unknown_tool(name));
        }
        let arguments = request.param_object("arguments");

        let invocation = AssertUnwindSafe(self.tools.invoke(name, &arguments))
            .catch_unwind()
            .await;
        let text = match invocation {
            Ok(Ok(text)) => text,
            Ok(Err(unknown)) => {
                return Response::error(id, ErrorObject::unknown_tool(&unknown.0));
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(tool = name, reason = %reason, "Tool handler panicked");
                format!("Error: {}", reason)
            }
        };

        Response::success(id, ResultPayload::ToolCall(ToolCallResult::text(text)))
    }

    fn read_resource(&self, id: RequestId, request: &Request) -> Response {
        let uri = request.param_str("uri").map(str::to_string);
        let target = uri.as_deref().unwrap_or_default();
        if self.registry.resource(target).is_none() {
            debug!(uri = target, "Read of unadvertised resource");
        }

        let text = std::panic::catch_unwind(AssertUnwindSafe(|| self.resources.read(target)))
            .unwrap_or_else(|panic| {
                let reason = panic_message(panic.as_ref());
                warn!(uri = target, reason = %reason, "Resource handler panicked");
                format!("Error: {}", reason)
            });

        Response::success(id, ResultPayload::ResourceRead(ResourceReadResult::json(uri, text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::apps::{AppRegistry, AppRegistryError, InstalledApp, LaunchOutcome};
    use crate::core::inference::{InferenceHandle, PlaceholderEngine};
    use crate::tools::ToolContext;
    use crate::tools::test_support;
    use serde_json::{Value, json};
    use std::time::Duration;

    struct PanickingApps;

    impl AppRegistry for PanickingApps {
        fn launch(&self, _package: &str) -> Result<LaunchOutcome, AppRegistryError> {
            panic!("package manager died");
        }

        fn list_installed(&self) -> Result<Vec<InstalledApp>, AppRegistryError> {
            panic!("package manager died");
        }
    }

    fn dispatcher_with(ctx: ToolContext) -> Dispatcher {
        let resources = ResourceProvider::new(ctx.apps.clone(), ctx.inference.clone(), "Gemma 3-1B IT".into());
        Dispatcher::new(
            Arc::new(CapabilityRegistry::builtin()),
            ToolInvoker::new(ctx),
            resources,
        )
    }

    fn dispatcher() -> Dispatcher {
        dispatcher_with(test_support::context())
    }

    async fn roundtrip(d: &Dispatcher, frame: Value) -> Value {
        let reply = d.handle_frame(&frame.to_string()).await.expect("reply");
        serde_json::from_str(&reply).unwrap()
    }

    #[tokio::test]
    async fn malformed_json_is_parse_error_with_null_id() {
        let reply = dispatcher().handle_frame("{this is not json").await.unwrap();
        let value: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}})
        );
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let value = roundtrip(&dispatcher(), json!({"jsonrpc":"2.0","id":3,"method":"prompts/list"})).await;
        assert_eq!(value["id"], 3);
        assert_eq!(value["error"]["code"], -32601);
        assert_eq!(value["error"]["message"], "Method not found: prompts/list");
        assert!(value.get("result").is_none());
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let value = roundtrip(
            &dispatcher(),
            json!({"jsonrpc":"2.0","id":"t","method":"tools/call","params":{"name":"rm_rf","arguments":{}}}),
        )
        .await;
        assert_eq!(value["id"], "t");
        assert_eq!(value["error"]["code"], -32602);
        assert_eq!(value["error"]["message"], "Unknown tool: rm_rf");
    }

    #[tokio::test]
    async fn tool_call_without_name_reports_null_tool() {
        let value = roundtrip(
            &dispatcher(),
            json!({"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"arguments":{}}}),
        )
        .await;
        assert_eq!(value["error"]["code"], -32602);
        assert_eq!(value["error"]["message"], "Unknown tool: null");
    }

    #[tokio::test]
    async fn resource_read_without_uri_omits_uri_member() {
        let value = roundtrip(&dispatcher(), json!({"jsonrpc":"2.0","id":7,"method":"resources/read"})).await;
        let content = value["result"]["contents"][0].as_object().unwrap();
        assert!(!content.contains_key("uri"));
        assert_eq!(content["text"], "Resource not found");
    }

    #[tokio::test]
    async fn tools_list_is_stable_across_calls() {
        let d = dispatcher();
        let first = roundtrip(&d, json!({"jsonrpc":"2.0","id":1,"method":"tools/list"})).await;
        let second = roundtrip(&d, json!({"jsonrpc":"2.0","id":1,"method":"tools/list"})).await;
        assert_eq!(first, second);
        let tools = first["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 4);
        assert_eq!(tools[0]["name"], "launch_app");
        assert_eq!(tools[0]["inputSchema"]["required"], json!(["package_name"]));
    }

    #[tokio::test]
    async fn resources_list_returns_catalog() {
        let value = roundtrip(&dispatcher(), json!({"jsonrpc":"2.0","id":5,"method":"resources/list"})).await;
        let resources = value["result"]["resources"].as_array().unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0]["mimeType"], "application/json");
    }

    #[tokio::test]
    async fn launch_without_package_is_success_shaped_error_text() {
        let value = roundtrip(
            &dispatcher(),
            json!({"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"launch_app","arguments":{}}}),
        )
        .await;
        assert_eq!(value["id"], 1);
        assert!(value.get("error").is_none());
        assert_eq!(
            value["result"]["content"],
            json!([{"type":"text","text":"Error: Package name is required"}])
        );
    }

    #[tokio::test]
    async fn tool_call_echoes_string_id() {
        let value = roundtrip(
            &dispatcher(),
            json!({"jsonrpc":"2.0","id":"req-9","method":"tools/call","params":{"name":"generate_response","arguments":{"prompt":"hello"}}}),
        )
        .await;
        assert_eq!(value["id"], "req-9");
        assert_eq!(
            value["result"]["content"][0]["text"],
            "Generated response for: hello (max_tokens: 100)"
        );
    }

    #[tokio::test]
    async fn model_status_resource_is_json_with_expected_keys() {
        let value = roundtrip(
            &dispatcher(),
            json!({"jsonrpc":"2.0","id":2,"method":"resources/read","params":{"uri":"coremind://model/status"}}),
        )
        .await;
        let content = &value["result"]["contents"][0];
        assert_eq!(content["uri"], "coremind://model/status");
        assert_eq!(content["mimeType"], "application/json");
        let status: Value = serde_json::from_str(content["text"].as_str().unwrap()).unwrap();
        for key in ["status", "model_name", "memory_usage", "last_updated"] {
            assert!(status.get(key).is_some(), "missing {}", key);
        }
    }

    #[tokio::test]
    async fn unknown_resource_is_success_with_not_found_text() {
        let value = roundtrip(
            &dispatcher(),
            json!({"jsonrpc":"2.0","id":4,"method":"resources/read","params":{"uri":"coremind://secrets"}}),
        )
        .await;
        assert!(value.get("error").is_none());
        assert_eq!(value["result"]["contents"][0]["text"], "Resource not found");
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let d = dispatcher();
        assert!(d.handle_frame(r#"{"jsonrpc":"2.0","method":"tools/list"}"#).await.is_none());
        assert!(d.handle_frame(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).await.is_none());
    }

    #[tokio::test]
    async fn handler_panics_become_error_text() {
        let ctx = ToolContext {
            apps: Arc::new(PanickingApps),
            inference: InferenceHandle::spawn(PlaceholderEngine::new(vec![]), 2).unwrap(),
            model_path: "m.task".into(),
            generate_timeout: Duration::from_secs(1),
        };
        let d = dispatcher_with(ctx);

        let value = roundtrip(
            &d,
            json!({"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"name":"launch_app","arguments":{"package_name":"x"}}}),
        )
        .await;
        assert_eq!(value["result"]["content"][0]["text"], "Error: package manager died");

        let value = roundtrip(
            &d,
            json!({"jsonrpc":"2.0","id":9,"method":"resources/read","params":{"uri":"coremind://app/info"}}),
        )
        .await;
        assert_eq!(value["result"]["contents"][0]["text"], "Error: package manager died");
    }
}
