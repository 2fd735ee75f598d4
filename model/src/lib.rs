//! Chat model abstraction for quality-insights.
//!
//! Narrators that prefer live prose over templates talk to a model through
//! [`ModelProvider`]. Tool definitions declared here are the schema the
//! lookup tools publish to the model.

pub mod config;
pub mod ollama;
pub mod provider;
pub mod types;

pub use config::{ModelDefaults, OllamaConfig};
pub use ollama::OllamaProvider;
pub use provider::{ModelError, ModelProvider, ModelResult};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, Choice, FinishReason, FunctionCall, FunctionDefinition,
    JsonSchema, MessageRole, ModelInfo, PropertySchema, SchemaType, ToolCall, ToolChoice,
    ToolDefinition, Usage,
};

pub mod prelude {
    pub use crate::config::*;
    pub use crate::ollama::*;
    pub use crate::provider::*;
    pub use crate::types::*;
}
