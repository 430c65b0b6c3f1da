pub mod chunk;
pub mod conversation;
pub mod provider;
pub mod query;
pub mod repository;

pub use chunk::{Chunk, FileKind, FileRecord};
pub use conversation::{Conversation, DialogTurn};
pub use provider::ProviderBinding;
pub use query::QueryRequest;
pub use repository::{HostKind, RepositoryDescriptor, RepositoryIndex};
