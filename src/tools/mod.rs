/// Tools Module
///
/// Each tool lives in its own module exporting a `descriptor()` for discovery
/// and a `call` that turns arguments into result text. Failures are text too;
/// nothing here returns an error to the protocol layer except an unknown name.

pub mod app_info;
pub mod generate;
pub mod launch_app;
pub mod load_model;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::core::apps::AppRegistry;
use crate::core::inference::InferenceHandle;
use crate::core::protocol::ToolDescriptor;

/// Tool arguments as received in `tools/call`.
pub type Arguments = Map<String, Value>;

/// `tools/call` named a tool this invoker does not implement.
#[derive(Debug, thiserror::Error)]
#[error("Unknown tool: {0}")]
pub struct UnknownTool(pub String);

/// Descriptors of every tool, in advertised order.
pub fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        launch_app::descriptor(),
        app_info::descriptor(),
        load_model::descriptor(),
        generate::descriptor(),
    ]
}

/// Collaborators and settings the tools run against.
#[derive(Clone)]
pub struct ToolContext {
    /// App registry used by `launch_app` and `get_app_info`
    pub apps: Arc<dyn AppRegistry>,
    /// Engine handle used by `load_ai_model` and `generate_response`
    pub inference: InferenceHandle,
    /// Identifier passed to the engine by `load_ai_model`.
    pub model_path: String,
    /// Upper bound on one `generate_response` call
    pub generate_timeout: Duration,
}

/// Routes a tool name to its implementation.
pub struct ToolInvoker {
    ctx: ToolContext,
}

impl ToolInvoker {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    /// Run the tool called `name` and return its result text.
    ///
    /// Tool failures are part of the returned text; only an unrecognised
    /// name is an error.
    ///
    /// # Arguments
    /// * `name` - Tool name from `params.name`
    /// * `args` - The call's `arguments` object
    pub async fn invoke(&self, name: &str, args: &Arguments) -> Result<String, UnknownTool> {
        let text = match name {
            launch_app::NAME => launch_app::call(&self.ctx, args),
            app_info::NAME => app_info::call(&self.ctx),
            load_model::NAME => load_model::call(&self.ctx),
            generate::NAME => generate::call(&self.ctx, args).await,
            other => return Err(UnknownTool(other.to_string())),
        };
        Ok(text)
    }
}

/// Non-empty string argument.
fn required_str<'a>(args: &'a Arguments, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
