/// `load_ai_model` tool: queue a model load on the inference engine.
///
/// Completion is not awaited; progress shows up in the model status resource.

use super::ToolContext;
use crate::core::protocol::{InputSchema, ToolDescriptor};

pub const NAME: &str = "load_ai_model";

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: NAME.to_string(),
        description: "Load the AI model for inference".to_string(),
        input_schema: InputSchema::empty(),
    }
}

/// Queue a load of `ctx.model_path`.
pub fn call(ctx: &ToolContext) -> String {
    match ctx.inference.load(ctx.model_path.clone()) {
        Ok(()) => "AI model loading initiated".to_string(),
        Err(e) => format!("Error loading AI model: {}", e),
    }
}
