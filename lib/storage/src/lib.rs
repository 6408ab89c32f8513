//! # simgraph Storage
//!
//! Reusable embedding output: a vector matrix and its metadata table,
//! always written and read together.
//!
//! ```rust,no_run
//! use simgraph_storage::VectorStore;
//!
//! let store = VectorStore::new("output/courses");
//! let info = store.inspect().unwrap();
//! println!("{} vectors of dimension {}", info.rows, info.dimension);
//! ```

pub mod manifest;
pub mod metadata;
pub mod npy;
pub mod store;

pub use manifest::Manifest;
pub use npy::NpyHeader;
pub use store::{StoreInfo, VectorStore};
