/// `launch_app` tool: start an installed app by package identifier.

use super::{Arguments, ToolContext, required_str};
use crate::core::apps::LaunchOutcome;
use crate::core::protocol::{InputSchema, ToolDescriptor};

pub const NAME: &str = "launch_app";

/// Tool metadata: one required `package_name` string.
pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: NAME.to_string(),
        description: "Launch an Android application".to_string(),
        input_schema: InputSchema::empty().property(
            "package_name",
            "string",
            "Package name of the app to launch",
            true,
        ),
    }
}

/// Launch the app named by `package_name`.
///
/// # Arguments
/// * `ctx` - Tool collaborators; only the app registry is used
/// * `args` - Call arguments containing `package_name`
pub fn call(ctx: &ToolContext, args: &Arguments) -> String {
    let Some(package) = required_str(args, "package_name") else {
        return "Error: Package name is required".to_string();
    };

    match ctx.apps.launch(package) {
        Ok(LaunchOutcome::Launched) => format!("Successfully launched {}", package),
        Ok(LaunchOutcome::NotFound) => format!("App not found: {}", package),
        Err(e) => format!("Error launching app: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{args, context};
    use serde_json::json;

    #[tokio::test]
    async fn launches_known_app() {
        let text = call(&context(), &args(json!({"package_name": "com.example.notes"})));
        assert_eq!(text, "Successfully launched com.example.notes");
    }

    #[tokio::test]
    async fn unknown_or_disabled_app_is_not_found() {
        let ctx = context();
        assert_eq!(
            call(&ctx, &args(json!({"package_name": "com.example.ghost"}))),
            "App not found: com.example.ghost"
        );
        assert_eq!(
            call(&ctx, &args(json!({"package_name": "com.example.camera"}))),
            "App not found: com.example.camera"
        );
    }

    #[tokio::test]
    async fn missing_package_name_is_reported() {
        let ctx = context();
        assert_eq!(call(&ctx, &args(json!({}))), "Error: Package name is required");
        assert_eq!(
            call(&ctx, &args(json!({"package_name": ""}))),
            "Error: Package name is required"
        );
    }

    #[test]
    fn descriptor_requires_package_name() {
        let schema = serde_json::to_value(descriptor().input_schema).unwrap();
        assert_eq!(schema["required"], json!(["package_name"]));
    }
}
