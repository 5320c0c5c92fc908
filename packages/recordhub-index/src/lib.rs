pub mod error;
pub mod indexer;

pub use error::IndexError;
pub use indexer::Indexer;
