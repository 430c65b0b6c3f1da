#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

//! C1 Repository Acquirer, C2 File Walker, C3 Chunker, C4 Token Counter,
//! and C8 Ingestion Pipeline (SPEC_FULL.md §4.1-§4.4, §4.7).

pub mod acquire;
pub mod chunker;
pub mod pipeline;
pub mod token_counter;
pub mod walker;

pub use pipeline::IngestionPipeline;
