//! Utility Module
//!
//! - [`interner`]: string interning for uniform names
//!
//! Interned strings ([`Symbol`]s) compare in O(1), which keeps the per-program
//! uniform tables cheap to query during activation.
//!
//! ```rust,ignore
//! use tinct::utils::interner;
//!
//! let a = interner::intern("normal_scaling");
//! let b = interner::intern("normal_scaling");
//! assert_eq!(a, b);
//! ```

pub mod interner;

pub use interner::Symbol;
