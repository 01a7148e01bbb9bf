use crate::error::{Result, VolcanoError};
use serde::Serialize;
use tracing::debug;

pub const CATEGORY_TEXT: &str = "Volcano/Text";
pub const CATEGORY_LLM: &str = "Volcano/LLM";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDescriptor {
    pub name: String,
    pub display_name: String,
    pub category: String,
    pub description: String,
}

impl NodeDescriptor {
    pub fn new(name: &str, display_name: &str, category: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            category: category.to_string(),
            description: description.to_string(),
        }
    }
}

/// Operations exposed to the node host, in registration order.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: Vec<NodeDescriptor>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_nodes() -> Self {
        let builtin = [
            NodeDescriptor::new(
                "AdvancedTextSplitter",
                "Advanced Text Splitter",
                CATEGORY_TEXT,
                "Split text by paragraph, sentence, separator or length",
            ),
            NodeDescriptor::new(
                "TextSegmentDisplay",
                "Text Segment Display",
                CATEGORY_TEXT,
                "Render one segment with optional statistics",
            ),
            NodeDescriptor::new(
                "VolcanoLLMLoader",
                "Volcano LLM Loader",
                CATEGORY_LLM,
                "Build a chat client and test the connection",
            ),
            NodeDescriptor::new(
                "VolcanoLLMPrompt",
                "Volcano LLM Prompt",
                CATEGORY_LLM,
                "Send a text prompt and return the response with usage info",
            ),
            NodeDescriptor::new(
                "VolcanoMultimodalPrompt",
                "Volcano Multimodal Prompt",
                CATEGORY_LLM,
                "Send text, image and video content in one request",
            ),
        ];

        debug!("Registered {} built-in nodes", builtin.len());
        Self {
            nodes: Vec::from(builtin),
        }
    }

    pub fn register(&mut self, node: NodeDescriptor) -> Result<()> {
        if self.get(&node.name).is_some() {
            return Err(VolcanoError::invalid_configuration(format!(
                "node '{}' is already registered",
                node.name
            )));
        }
        debug!("Registered node {}", node.name);
        self.nodes.push(node);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&NodeDescriptor> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
