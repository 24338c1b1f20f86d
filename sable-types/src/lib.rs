//! Sable type terms
//!
//! The term algebra shared by the Sable front end: types, kinds,
//! substitutions and the unification primitive the trait resolver builds on.

pub mod error;
pub mod span;
pub mod types;
pub mod unification;

pub use error::UnificationError;
pub use span::{to_source_span, NodeId, Span};
pub use types::{AliasCache, Kind, Substitution, Type, TypeVarGenerator};
pub use unification::{unify, unify_all, UnificationResult, Unifier};
