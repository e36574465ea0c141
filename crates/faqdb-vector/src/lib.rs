#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! In-process vector index: exact inner-product search over unit vectors,
//! a shared store with snapshot swaps, and on-disk artifacts.

pub mod index;
pub mod persist;
pub mod store;

pub use index::{FlatIndex, IndexStats};
pub use persist::IndexPaths;
pub use store::{RebuildReport, VectorStore};
