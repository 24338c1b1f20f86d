//! Error types for the Sable typechecker
//!
//! Three tiers: internal engine errors (pass-ordering bugs that abort the
//! compilation unit), resolution misses reported back to the caller, and
//! user-caused conflicts such as overlapping instances.

use miette::{Diagnostic, SourceSpan};
use sable_types::{to_source_span, Span, UnificationError};
use thiserror::Error;

/// Main typechecker error type
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum TypecheckError {
    #[error("Internal typechecker error: {message}")]
    #[diagnostic(
        code(sable::typecheck::internal),
        help("This is a bug in the compiler's pass ordering, not in the program being compiled")
    )]
    Internal { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Implementation(#[from] ImplementationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Declaration(#[from] DeclarationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Unification(#[from] UnificationError),
}

impl TypecheckError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Internal errors abort the whole compilation unit
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Attach a source location to the underlying user error
    pub fn at(self, location: Span) -> Self {
        match self {
            Self::Internal { .. } => self,
            Self::Resolution(error) => Self::Resolution(error.at(location)),
            Self::Implementation(error) => Self::Implementation(error.at(location)),
            Self::Declaration(error) => Self::Declaration(error.at(location)),
            Self::Unification(error) => Self::Unification(error.at(location)),
        }
    }
}

/// Lookup misses, reported as positioned diagnostics by the caller
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("Undefined symbol: {name}")]
    #[diagnostic(
        code(sable::typecheck::resolution::symbol_not_found),
        help("Check the spelling or define {name} before using it")
    )]
    SymbolNotFound {
        name: String,
        #[label("not found in this scope")]
        span: Option<SourceSpan>,
    },

    #[error("Unknown type: {name}")]
    #[diagnostic(code(sable::typecheck::resolution::type_not_found))]
    TypeNotFound {
        name: String,
        #[label("unknown type")]
        span: Option<SourceSpan>,
    },

    #[error("Unknown trait: {name}")]
    #[diagnostic(code(sable::typecheck::resolution::trait_not_found))]
    TraitNotFound {
        name: String,
        #[label("unknown trait")]
        span: Option<SourceSpan>,
    },

    #[error("No implementation of {trait_name} for {types}")]
    #[diagnostic(
        code(sable::typecheck::resolution::no_implementation),
        help("Add an instance: instance {trait_name}<{types}>")
    )]
    NoMatchingImplementation {
        trait_name: String,
        types: String,
        #[label("{trait_name} is not implemented for {types}")]
        span: Option<SourceSpan>,
    },

    #[error("Ambiguous implementation of {trait_name} for {types}: candidates {candidates}")]
    #[diagnostic(
        code(sable::typecheck::resolution::ambiguous_implementation),
        help("Add a type annotation so that a single instance applies")
    )]
    AmbiguousImplementation {
        trait_name: String,
        types: String,
        candidates: String,
        #[label("more than one instance applies")]
        span: Option<SourceSpan>,
    },

    #[error("Type alias {alias} expects {expected} type arguments, found {found}")]
    #[diagnostic(code(sable::typecheck::resolution::alias_arity))]
    AliasArityMismatch {
        alias: String,
        expected: usize,
        found: usize,
        #[label("expected {expected} type arguments")]
        span: Option<SourceSpan>,
    },

    #[error("Cannot update {name}: it belongs to the prelude")]
    #[diagnostic(
        code(sable::typecheck::resolution::immutable_symbol),
        help("Prelude bindings are shared by every compilation and never change; shadow {name} instead")
    )]
    ImmutableSymbol {
        name: String,
        #[label("prelude binding")]
        span: Option<SourceSpan>,
    },

    #[error("Cannot export {name}: it is not defined in this module")]
    #[diagnostic(code(sable::typecheck::resolution::unknown_export))]
    UnknownExport {
        name: String,
        #[label("unknown export")]
        span: Option<SourceSpan>,
    },

    #[error("Unknown module: {name}")]
    #[diagnostic(code(sable::typecheck::resolution::unknown_module))]
    UnknownModule {
        name: String,
        #[label("unknown module")]
        span: Option<SourceSpan>,
    },

    #[error("Scope handle {scope} no longer refers to a live scope")]
    #[diagnostic(code(sable::typecheck::resolution::stale_scope))]
    StaleScope { scope: String },
}

/// Trait implementation errors (overlap, arity, missing methods)
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ImplementationError {
    #[error("Overlapping implementations of {trait_name}: {new} overlaps existing {existing}")]
    #[diagnostic(
        code(sable::typecheck::implementation::overlapping),
        help("Instances of the same trait must not unify; make one of them more specific or add requirements to the general one")
    )]
    OverlappingImplementation {
        trait_name: String,
        existing: String,
        new: String,
        #[label("conflicting implementation")]
        span: Option<SourceSpan>,
    },

    #[error("Trait {trait_name} takes {expected} type arguments, instance provides {found}")]
    #[diagnostic(code(sable::typecheck::implementation::trait_arity))]
    TraitArityMismatch {
        trait_name: String,
        expected: usize,
        found: usize,
        #[label("wrong number of target types")]
        span: Option<SourceSpan>,
    },

    #[error("Instance {trait_name}<{types}> is missing methods: {}", .missing.join(", "))]
    #[diagnostic(
        code(sable::typecheck::implementation::missing_methods),
        help("Implement every method of {trait_name} that has no default body")
    )]
    MissingMethods {
        trait_name: String,
        types: String,
        missing: Vec<String>,
        #[label("incomplete instance")]
        span: Option<SourceSpan>,
    },

    #[error("Instance {trait_name}<{types}> defines methods not in the trait: {}", .unknown.join(", "))]
    #[diagnostic(code(sable::typecheck::implementation::unknown_methods))]
    UnknownMethods {
        trait_name: String,
        types: String,
        unknown: Vec<String>,
        #[label("not a method of {trait_name}")]
        span: Option<SourceSpan>,
    },

    #[error("Instance {trait_name}<{types}> requires an instance of supertrait {super_trait}")]
    #[diagnostic(
        code(sable::typecheck::implementation::missing_supertrait),
        help("Add an instance: instance {super_trait}<{types}>")
    )]
    MissingSuperTraitImplementation {
        trait_name: String,
        super_trait: String,
        types: String,
        #[label("supertrait not implemented")]
        span: Option<SourceSpan>,
    },
}

/// Declaration errors found while collecting names and headers
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum DeclarationError {
    #[error("{name} is already defined in this scope")]
    #[diagnostic(
        code(sable::typecheck::declaration::redefinition),
        help("Rename one of the definitions")
    )]
    Redefinition {
        name: String,
        #[label("redefined here")]
        span: Option<SourceSpan>,
        #[label("previous definition")]
        previous_span: Option<SourceSpan>,
    },

    #[error("Cyclic supertraits: {}", .cycle.join(" -> "))]
    #[diagnostic(code(sable::typecheck::declaration::cyclic_supertraits))]
    CyclicSuperTraits {
        cycle: Vec<String>,
        #[label("trait hierarchy contains a cycle")]
        span: Option<SourceSpan>,
    },

    #[error("Trait {trait_name} extends unknown trait {super_trait}")]
    #[diagnostic(code(sable::typecheck::declaration::unknown_supertrait))]
    UnknownSuperTrait {
        trait_name: String,
        super_trait: String,
        #[label("unknown supertrait")]
        span: Option<SourceSpan>,
    },
}

impl ResolutionError {
    pub fn symbol_not_found(name: impl Into<String>, span: Option<Span>) -> Self {
        Self::SymbolNotFound {
            name: name.into(),
            span: to_source_span(span),
        }
    }

    pub fn at(mut self, location: Span) -> Self {
        let label = Some(SourceSpan::from(location));
        match &mut self {
            Self::SymbolNotFound { span, .. }
            | Self::TypeNotFound { span, .. }
            | Self::TraitNotFound { span, .. }
            | Self::NoMatchingImplementation { span, .. }
            | Self::AmbiguousImplementation { span, .. }
            | Self::AliasArityMismatch { span, .. }
            | Self::ImmutableSymbol { span, .. }
            | Self::UnknownExport { span, .. }
            | Self::UnknownModule { span, .. } => *span = label,
            Self::StaleScope { .. } => {}
        }
        self
    }
}

impl ImplementationError {
    pub fn at(mut self, location: Span) -> Self {
        let label = Some(SourceSpan::from(location));
        match &mut self {
            Self::OverlappingImplementation { span, .. }
            | Self::TraitArityMismatch { span, .. }
            | Self::MissingMethods { span, .. }
            | Self::UnknownMethods { span, .. }
            | Self::MissingSuperTraitImplementation { span, .. } => *span = label,
        }
        self
    }
}

impl DeclarationError {
    pub fn at(mut self, location: Span) -> Self {
        let label = Some(SourceSpan::from(location));
        match &mut self {
            Self::Redefinition { span, .. }
            | Self::CyclicSuperTraits { span, .. }
            | Self::UnknownSuperTrait { span, .. } => *span = label,
        }
        self
    }
}

/// Render a list of types as `A, B`
pub(crate) fn format_types(types: &[sable_types::Type]) -> String {
    types
        .iter()
        .map(|ty| ty.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_types::Type;

    #[test]
    fn test_internal_errors_are_flagged() {
        let error = TypecheckError::internal("instance pass ran before header pass");
        assert!(error.is_internal());

        let error: TypecheckError = ResolutionError::symbol_not_found("x", None).into();
        assert!(!error.is_internal());
    }

    #[test]
    fn test_location_reaches_wrapped_error() {
        let error: TypecheckError = ResolutionError::symbol_not_found("x", None).into();
        let located = error.at(Span::new(4, 5));
        assert_eq!(
            located,
            TypecheckError::Resolution(ResolutionError::SymbolNotFound {
                name: "x".to_string(),
                span: Some(SourceSpan::from(Span::new(4, 5))),
            })
        );

        let internal = TypecheckError::internal("bug").at(Span::new(0, 1));
        assert!(internal.is_internal());
    }

    #[test]
    fn test_overlap_message_names_both_type_sets() {
        let error = ImplementationError::OverlappingImplementation {
            trait_name: "Show".to_string(),
            existing: format_types(&[Type::con("Int")]),
            new: format_types(&[Type::var("T")]),
            span: None,
        };
        assert_eq!(
            error.to_string(),
            "Overlapping implementations of Show: T overlaps existing Int"
        );
    }

    #[test]
    fn test_missing_methods_message() {
        let error = ImplementationError::MissingMethods {
            trait_name: "Eq".to_string(),
            types: "Int".to_string(),
            missing: vec!["eq".to_string(), "neq".to_string()],
            span: None,
        };
        assert_eq!(
            error.to_string(),
            "Instance Eq<Int> is missing methods: eq, neq"
        );
    }
}
