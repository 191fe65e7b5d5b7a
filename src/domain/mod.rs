//! Domain types for the category mapping engine
//! Defines mappings, candidates, classification results and the store contract.

pub mod candidate;
pub mod error;
pub mod mapping;
pub mod result;
pub mod store;
pub mod text;

pub use candidate::*;
pub use error::*;
pub use mapping::*;
pub use result::*;
pub use store::*;
pub use text::normalize_text;
