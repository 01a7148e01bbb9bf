pub mod assembler;
pub mod client;
pub mod display;
pub mod registry;
pub mod splitter;

pub use assembler::MessageAssembler;
pub use client::ChatClient;
pub use registry::{NodeDescriptor, NodeRegistry};
pub use splitter::TextSplitter;
