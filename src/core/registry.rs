/// Capability Registry
///
/// Fixed catalog of advertised tools and resources. Built once at startup and
/// shared read-only between connections.

use crate::core::protocol::{ResourceDescriptor, ToolDescriptor};
use crate::core::resources;
use crate::tools;

/// Registry of advertised MCP tools and resources.
///
/// Listing order is registration order, identical for every caller.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    /// Tool definitions (for tools/list and tools/call lookup)
    tools: Vec<ToolDescriptor>,
    /// Resource definitions (for resources/list)
    resources: Vec<ResourceDescriptor>,
}

impl CapabilityRegistry {
    /// Create a registry from fixed descriptor lists.
    ///
    /// # Arguments
    /// * `tools` - Tool definitions in listing order
    /// * `resources` - Resource definitions in listing order
    pub fn new(tools: Vec<ToolDescriptor>, resources: Vec<ResourceDescriptor>) -> Self {
        Self { tools, resources }
    }

    /// Catalog of every tool and resource this server implements.
    pub fn builtin() -> Self {
        Self::new(tools::descriptors(), resources::descriptors())
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    /// Look up a tool by exact name.
    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn resource(&self, uri: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|r| r.uri == uri)
    }
}
