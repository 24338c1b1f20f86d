//! Sable Typechecker
//!
//! Trait resolution and the symbol environment of the Sable front end.
//!
//! ## Architecture
//!
//! - **Scope chain**: an arena of lexical scopes over a shared, immutable prelude
//! - **Alias resolution**: cycle-safe structural unfolding of nominal aliases
//! - **Trait & instance registry**: traits, supertraits, kinds and overlap checking
//! - **Instance matcher**: one unification-based matcher with an explicit precision mode
//! - **Evidence**: dictionary names and method layouts for dictionary-passing dispatch
//!
//! ## Integration
//!
//! The analyzer driver runs the declaration passes over each module, then
//! queries the table while inferring expression types. The code generator
//! reads the evidence table, method layouts and the `TypeMap`.

pub mod aliases;
pub mod config;
pub mod declarations;
pub mod error;
pub mod evidence;
pub mod exports;
pub mod extensions;
pub mod hierarchy;
pub mod instances;
pub mod matcher;
pub mod passes;
pub mod prelude;
pub mod scope;
pub mod symbols;
pub mod traits;
pub mod type_map;

// Re-export public API
pub use config::ResolverConfig;
pub use declarations::{
    Declaration, ExtensionDecl, FunctionDecl, InstanceDecl, TraitDecl, TraitMethodDecl, TypeDecl,
    TypeDefinition, VariantDecl,
};
pub use error::{
    DeclarationError, ImplementationError, ResolutionError, TypecheckError,
};
pub use evidence::{dictionary_name, evidence_key, EvidenceTable, MethodIndexTable};
pub use exports::Reexport;
pub use hierarchy::SuperTraitGraph;
pub use instances::InstanceDef;
pub use matcher::{ImplementationMatch, MatchPrecision};
pub use passes::{analyze_module, DeclarationAnalyzer};
pub use prelude::{build_prelude, ensure_prelude, PRELUDE_MODULE};
pub use scope::{Scope, ScopeChain, ScopeId, ScopeKind, SymbolTable};
pub use symbols::{Origin, Symbol, SymbolKind};
pub use traits::{Constraint, TraitInfo};
pub use type_map::TypeMap;

pub use sable_types::{Kind, NodeId, Span, Substitution, Type, UnificationError};

#[cfg(test)]
mod tests;
