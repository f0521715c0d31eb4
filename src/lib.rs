//! docidx - reader and search front end for generated documentation search indexes.

pub mod error;
pub mod index;
pub mod query;

// Re-export commonly used types
pub use error::{IndexError, Result};
pub use index::{CrateIndex, Item, ItemType, SearchIndex, load};
pub use query::{Query, SearchHit, SearchOptions};
