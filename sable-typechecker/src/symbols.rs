//! Symbols stored in scopes

use sable_types::{Span, Type};
use std::fmt;

/// What a name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Variable,
    Type,
    Constructor,
    Trait,
    Module,
}

/// Where a symbol was defined
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Origin {
    pub module: Option<String>,
    pub span: Option<Span>,
}

impl Origin {
    /// Defined in `module`, no source location
    pub fn module(module: impl Into<String>) -> Self {
        Self {
            module: Some(module.into()),
            span: None,
        }
    }

    /// Built into the prelude
    pub fn prelude() -> Self {
        Self::module(crate::prelude::PRELUDE_MODULE)
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

/// A named entity visible through the scope chain
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    /// Nominal type, used for trait lookup
    pub ty: Type,
    pub kind: SymbolKind,
    /// Declared during the naming pass, type not yet known
    pub is_pending: bool,
    pub is_constant: bool,
    /// Structural expansion, set only for type aliases
    pub underlying_type: Option<Type>,
    pub origin_module: Option<String>,
    pub definition_site: Option<Span>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, ty: Type, kind: SymbolKind, origin: Origin) -> Self {
        Self {
            name: name.into(),
            ty,
            kind,
            is_pending: false,
            is_constant: false,
            underlying_type: None,
            origin_module: origin.module,
            definition_site: origin.span,
        }
    }

    pub fn constant(mut self) -> Self {
        self.is_constant = true;
        self
    }

    pub fn pending(mut self) -> Self {
        self.is_pending = true;
        self
    }

    pub fn with_underlying(mut self, underlying: Type) -> Self {
        self.underlying_type = Some(underlying);
        self
    }

    pub fn is_alias(&self) -> bool {
        self.kind == SymbolKind::Type && self.underlying_type.is_some()
    }

    pub fn origin(&self) -> Origin {
        Origin {
            module: self.origin_module.clone(),
            span: self.definition_site,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Variable => "variable",
            Self::Type => "type",
            Self::Constructor => "constructor",
            Self::Trait => "trait",
            Self::Module => "module",
        };
        write!(f, "{label}")
    }
}
