#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

//! C9 Query Pipeline, C11 Conversation Memory, C12 Deep Research
//! Controller, C13 Multi-Repository Coordinator, and C14 Configuration
//! Resolver (SPEC_FULL.md §4.8, §4.10-§4.14).

pub mod deep_research;
pub mod memory;
pub mod modes;
pub mod multi_repo;
pub mod query_pipeline;
pub mod resolver;

pub use multi_repo::fan_out;
pub use query_pipeline::{QueryPipeline, RunOutcome};
