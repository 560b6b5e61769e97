/// `get_app_info` tool: installed app inventory as JSON text.

use super::ToolContext;
use crate::core::apps;
use crate::core::protocol::{InputSchema, ToolDescriptor};

pub const NAME: &str = "get_app_info";

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: NAME.to_string(),
        description: "Get information about installed apps".to_string(),
        input_schema: InputSchema::empty(),
    }
}

pub fn call(ctx: &ToolContext) -> String {
    apps::app_info_text(ctx.apps.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::context;
    use serde_json::Value;

    #[tokio::test]
    async fn returns_inventory_json() {
        let value: Value = serde_json::from_str(&call(&context())).unwrap();
        assert_eq!(value["totalCount"], 2);
        assert_eq!(value["installedApps"][0]["name"], "Notes");
        assert_eq!(value["installedApps"][0]["enabled"], true);
    }
}
