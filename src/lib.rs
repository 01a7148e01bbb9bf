//! # Volcano Nodes
//!
//! Text splitting and multimodal chat-completion building blocks for the
//! Volcano Engine (Ark) LLM API, usable from a node host or the `volcano` CLI.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use volcano_nodes::{
//!     ApiMode, ChatClient, ChatClientConfig, ContentItem, GenerationParams, ImageRef,
//!     SplitConfig, TextSplitter,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Split text
//!     let splitter = TextSplitter::new()?;
//!     let result = splitter.split_text("First.\n\nSecond.", &SplitConfig::default());
//!     println!("{}", result.preview);
//!
//!     // Ask the model about an image
//!     let config = ChatClientConfig::new(ApiMode::OpenApi, "api-key").with_endpoint_id("ep-xxxx");
//!     let client = ChatClient::new(config)?;
//!     let items = vec![
//!         ContentItem::Text("What is in this picture?".to_string()),
//!         ContentItem::Image(ImageRef::Reference("https://example.com/cat.png".to_string())),
//!     ];
//!     let generation = client
//!         .generate_multimodal(&items, "", &GenerationParams::default(), None)
//!         .await?;
//!
//!     println!("{}", generation.text);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod services;
pub mod types;

// Re-export main types and services for easier usage
pub use error::{Result, VolcanoError};
pub use services::display::format_segment;
pub use services::{ChatClient, MessageAssembler, NodeDescriptor, NodeRegistry, TextSplitter};
pub use types::{
    ApiMode, ChatClientConfig, ChatMessage, ContentItem, ContentPart, Generation,
    GenerationParams, ImageRef, MessageContent, ResponseInfo, Role, SplitConfig, SplitMethod,
    SplitResult, StreamChunk, Usage, MAX_OUTPUT_SLOTS,
};

use tracing_subscriber::EnvFilter;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Installs the global tracing subscriber. Call once at process start;
/// `RUST_LOG` overrides the default level.
pub fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| VolcanoError::Anyhow(anyhow::anyhow!("Failed to initialize logging: {}", e)))
}
