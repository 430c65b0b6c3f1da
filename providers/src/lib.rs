#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

//! C5 Embedder Abstraction + C10 Provider Abstraction (SPEC_FULL.md §4.5,
//! §4.9): one trait pair (`LlmProvider`, `EmbedProvider`) implemented per
//! provider family, registered by id in [`registry::ProviderRegistry`].

pub mod azure;
pub mod bedrock;
pub mod embed_local;
pub mod google;
pub mod openai_compatible;
pub mod registry;
pub mod retry;
pub mod traits;

pub use registry::ProviderRegistry;
pub use traits::{ChatMessage, ChatRequest, ChatRole, EmbedProvider, LlmProvider, TextStream};
