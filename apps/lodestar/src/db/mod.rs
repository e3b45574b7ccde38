//! Database layer - store traits, query compilation and data access

pub mod concurrency;
pub mod document;
pub mod engagement;
pub mod memory;
pub mod pipeline;
pub mod search;
pub mod traits;

pub use concurrency::ConcurrencyGuard;
pub use document::Document;
pub use engagement::{EngagementRepository, PartitionCounts, ResultPage};
pub use memory::MemoryDocumentStore;
pub use pipeline::{Pipeline, Stage, UpdateDocument};
pub use traits::DocumentStore;
