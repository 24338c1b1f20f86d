//! Unification errors
//!
//! Following the miette patterns used across the compiler for consistent error reporting.

use crate::span::Span;
use crate::types::Type;
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// Errors produced by `unify`
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum UnificationError {
    #[error("Type mismatch: expected {expected}, found {found}")]
    #[diagnostic(
        code(sable::types::unification::type_mismatch),
        help("The types {expected} and {found} cannot be unified")
    )]
    TypeMismatch {
        expected: Type,
        found: Type,
        #[label("expected type {expected}")]
        span: Option<SourceSpan>,
    },

    #[error("Occurs check violation: variable {var_name} occurs in {containing_type}")]
    #[diagnostic(
        code(sable::types::unification::occurs_check),
        help("This would create an infinite type. Consider using a recursive type definition.")
    )]
    OccursCheck {
        var_name: String,
        containing_type: Type,
        #[label("variable {var_name} would create infinite type")]
        span: Option<SourceSpan>,
    },

    #[error("Arity mismatch: {type_name} expects {expected_arity} elements, found {found_arity}")]
    #[diagnostic(
        code(sable::types::unification::arity_mismatch),
        help("Both sides must have the same number of elements")
    )]
    ArityMismatch {
        type_name: String,
        expected_arity: usize,
        found_arity: usize,
        #[label("expected {expected_arity} elements, found {found_arity}")]
        span: Option<SourceSpan>,
    },

    #[error("Function arity mismatch: expected {expected_params} parameters, found {found_params}")]
    #[diagnostic(
        code(sable::types::unification::function_arity),
        help("Function types must have the same number of parameters to unify")
    )]
    FunctionArityMismatch {
        expected_params: usize,
        found_params: usize,
        #[label("function type has {found_params} parameters")]
        span: Option<SourceSpan>,
    },

    #[error("Record mismatch: {expected} and {found} have different fields")]
    #[diagnostic(
        code(sable::types::unification::record_fields),
        help("Records unify only when they declare exactly the same field names")
    )]
    RecordFieldMismatch {
        expected: Type,
        found: Type,
        #[label("record fields differ")]
        span: Option<SourceSpan>,
    },

    #[error("Quantifier mismatch: cannot unify {expected} with {found}")]
    #[diagnostic(
        code(sable::types::unification::quantifier_mismatch),
        help("Polymorphic types unify only when they quantify the same number of variables")
    )]
    QuantifierMismatch {
        expected: Type,
        found: Type,
        #[label("quantified type")]
        span: Option<SourceSpan>,
    },

    #[error("Quantified variable escapes its scope through {var_name} := {bound_to}")]
    #[diagnostic(
        code(sable::types::unification::escaping_variable),
        help("A quantified variable cannot be bound outside its forall")
    )]
    EscapingVariable {
        var_name: String,
        bound_to: Type,
        #[label("escaping variable")]
        span: Option<SourceSpan>,
    },
}

impl UnificationError {
    /// Attach a source location to this error
    pub fn at(mut self, location: Span) -> Self {
        let label = Some(SourceSpan::from(location));
        match &mut self {
            Self::TypeMismatch { span, .. }
            | Self::OccursCheck { span, .. }
            | Self::ArityMismatch { span, .. }
            | Self::FunctionArityMismatch { span, .. }
            | Self::RecordFieldMismatch { span, .. }
            | Self::QuantifierMismatch { span, .. }
            | Self::EscapingVariable { span, .. } => *span = label,
        }
        self
    }
}
