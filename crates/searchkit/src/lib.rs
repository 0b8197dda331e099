//! # searchkit
//!
//! Fuzzy matching with highlight positions, and ranking of items across
//! several weighted text fields.
//!
//! ## Example
//!
//! ```
//! use searchkit::fuzzy_match;
//!
//! let m = fuzzy_match("docker", "com.docker.helper").unwrap();
//! assert_eq!(m.indices, vec![4, 5, 6, 7, 8, 9]);
//! ```
//!
//! Items implement [`Searchable`] to expose their fields:
//!
//! ```
//! use searchkit::{Searchable, WeightedField, rank};
//!
//! struct Tool { name: String }
//!
//! impl Searchable for Tool {
//!     fn search_fields(&self) -> Vec<WeightedField<'_>> {
//!         vec![WeightedField::new("name", &self.name, 1.0)]
//!     }
//! }
//!
//! let tools = vec![Tool { name: "ripgrep".into() }, Tool { name: "fd".into() }];
//! let ranked = rank(&tools, "rg");
//! assert_eq!(ranked[0].item.name, "ripgrep");
//! ```

pub mod matcher;
pub mod rank;

pub use matcher::{FuzzyMatch, fuzzy_match};
pub use rank::{FieldMatch, Ranked, Searchable, WeightedField, best_field, rank};
