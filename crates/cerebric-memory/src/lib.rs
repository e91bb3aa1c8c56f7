pub mod partition;
pub mod retriever;
pub mod store;

pub use partition::Partition;
pub use retriever::{KeywordRetriever, RetrievedItem, Retriever};
pub use store::MemoryStore;
