//! Generated documentation search index
//!
//! This module reads the `search-index.js` file a documentation generator
//! writes next to its HTML output, checks that every crate record is
//! internally consistent, and decodes it into an in-memory index with fast
//! name and path lookups.
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//!
//! let index = docidx::index::load(Path::new("target/doc/search-index.js"))?;
//!
//! // Look up an item by its full path
//! if let Some((krate, idx)) = index.find_by_path("robot_head_service::Args") {
//!     println!("{} is a {}", krate.full_path(idx), krate.items[idx].ty);
//! }
//!
//! // Every item called `main`, in every crate
//! for krate in &index.crates {
//!     for idx in krate.items_named("main") {
//!         println!("{}", krate.full_path(*idx));
//!     }
//! }
//! # Ok::<(), docidx::IndexError>(())
//! ```

mod loader;
pub mod signature;
mod types;
pub mod validate;

pub use loader::{extract_json, load, load_str, parse_records, read_index_file};
pub use signature::{FunctionSignature, TypeId, TypeNode};
pub use types::{CrateIndex, Item, ItemType, PathEntry, RawCrateData, RawPath, SearchIndex};
pub use validate::{Issue, Severity, has_errors, validate, validate_all};
