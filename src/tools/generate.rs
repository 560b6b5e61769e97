/// `generate_response` tool: run a prompt through the inference engine.

use super::{Arguments, ToolContext, required_str};
use crate::core::protocol::{InputSchema, ToolDescriptor};

pub const NAME: &str = "generate_response";

/// Token limit used when the call does not give `max_tokens`
pub const DEFAULT_MAX_TOKENS: u32 = 100;

/// Tool metadata: required `prompt`, optional `max_tokens`.
pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: NAME.to_string(),
        description: "Generate AI response from prompt".to_string(),
        input_schema: InputSchema::empty()
            .property("prompt", "string", "Input prompt for AI generation", true)
            .property("max_tokens", "integer", "Maximum tokens to generate", false),
    }
}

/// Generate a completion for `prompt`, bounded by the context's timeout.
///
/// # Arguments
/// * `ctx` - Tool collaborators; uses the engine handle and timeout
/// * `args` - Call arguments containing `prompt` and optionally `max_tokens`
pub async fn call(ctx: &ToolContext, args: &Arguments) -> String {
    let Some(prompt) = required_str(args, "prompt") else {
        return "Error: Prompt is required".to_string();
    };
    let max_tokens = args
        .get("max_tokens")
        .and_then(|v| v.as_u64())
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(DEFAULT_MAX_TOKENS);

    let generation = ctx.inference.generate(prompt.to_string(), max_tokens);
    match tokio::time::timeout(ctx.generate_timeout, generation).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => format!("Error generating response: {}", e),
        Err(_) => format!(
            "Error generating response: timed out after {:?}",
            ctx.generate_timeout
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inference::{EngineError, InferenceEngine, InferenceHandle};
    use crate::tools::test_support::{args, context};
    use serde_json::json;
    use std::time::Duration;

    struct SlowEngine;

    impl InferenceEngine for SlowEngine {
        fn load(&mut self, _model: &str) -> Result<(), EngineError> {
            Ok(())
        }

        fn generate(&mut self, _prompt: &str, _max_tokens: u32) -> Result<String, EngineError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok("late".into())
        }

        fn dispose(&mut self) {}
    }

    struct BrokenEngine;

    impl InferenceEngine for BrokenEngine {
        fn load(&mut self, _model: &str) -> Result<(), EngineError> {
            Ok(())
        }

        fn generate(&mut self, _prompt: &str, _max_tokens: u32) -> Result<String, EngineError> {
            Err(EngineError::Backend("out of memory".into()))
        }

        fn dispose(&mut self) {}
    }

    #[tokio::test]
    async fn generates_with_default_max_tokens() {
        let text = call(&context(), &args(json!({"prompt": "hi"}))).await;
        assert_eq!(text, "Generated response for: hi (max_tokens: 100)");
    }

    #[tokio::test]
    async fn passes_max_tokens_through() {
        let text = call(&context(), &args(json!({"prompt": "hi", "max_tokens": 12}))).await;
        assert_eq!(text, "Generated response for: hi (max_tokens: 12)");
    }

    #[tokio::test]
    async fn missing_prompt_is_reported() {
        assert_eq!(call(&context(), &args(json!({}))).await, "Error: Prompt is required");
        assert_eq!(
            call(&context(), &args(json!({"prompt": ""}))).await,
            "Error: Prompt is required"
        );
    }

    #[tokio::test]
    async fn engine_failure_becomes_text() {
        let mut ctx = context();
        ctx.inference = InferenceHandle::spawn(BrokenEngine, 2).unwrap();
        assert_eq!(
            call(&ctx, &args(json!({"prompt": "hi"}))).await,
            "Error generating response: out of memory"
        );
    }

    #[tokio::test]
    async fn slow_generation_times_out() {
        let mut ctx = context();
        ctx.inference = InferenceHandle::spawn(SlowEngine, 2).unwrap();
        ctx.generate_timeout = Duration::from_millis(50);
        let text = call(&ctx, &args(json!({"prompt": "hi"}))).await;
        assert_eq!(text, "Error generating response: timed out after 50ms");
    }
}
