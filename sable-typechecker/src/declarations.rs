//! Top-level declarations as seen by the declaration passes
//!
//! These are the parts of parsed items the passes need: names, type
//! parameters, signatures and source spans.

use crate::traits::Constraint;
use sable_types::{Kind, Span, Type};

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Type(TypeDecl),
    Trait(TraitDecl),
    Instance(InstanceDecl),
    Extension(ExtensionDecl),
    Function(FunctionDecl),
}

impl Declaration {
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Type(decl) => decl.span,
            Self::Trait(decl) => decl.span,
            Self::Instance(decl) => decl.span,
            Self::Extension(decl) => decl.span,
            Self::Function(decl) => decl.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub params: Vec<String>,
    pub definition: TypeDefinition,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    /// `type Name<T> = Underlying`
    Alias(Type),
    /// An opaque nominal type
    Nominal,
    /// A sum type with its constructors
    Variants(Vec<VariantDecl>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantDecl {
    pub name: String,
    pub fields: Vec<Type>,
}

impl TypeDecl {
    pub fn alias(name: impl Into<String>, params: Vec<String>, underlying: Type) -> Self {
        Self {
            name: name.into(),
            params,
            definition: TypeDefinition::Alias(underlying),
            span: None,
        }
    }

    pub fn nominal(name: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            name: name.into(),
            params,
            definition: TypeDefinition::Nominal,
            span: None,
        }
    }

    pub fn variants(name: impl Into<String>, params: Vec<String>, variants: Vec<VariantDecl>) -> Self {
        Self {
            name: name.into(),
            params,
            definition: TypeDefinition::Variants(variants),
            span: None,
        }
    }

    /// The type as written at use sites, `Tree<T>`
    pub fn nominal_type(&self) -> Type {
        Type::generic(self.name.clone(), self.params.iter().map(Type::var).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitDecl {
    pub name: String,
    pub params: Vec<String>,
    /// Kinds written explicitly on parameters
    pub param_kinds: Vec<(String, Kind)>,
    pub super_traits: Vec<String>,
    pub methods: Vec<TraitMethodDecl>,
    pub span: Option<Span>,
}

impl TraitDecl {
    pub fn new(name: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            name: name.into(),
            params,
            param_kinds: Vec::new(),
            super_traits: Vec::new(),
            methods: Vec::new(),
            span: None,
        }
    }

    pub fn with_super_traits(mut self, super_traits: Vec<String>) -> Self {
        self.super_traits = super_traits;
        self
    }

    pub fn with_method(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.methods.push(TraitMethodDecl {
            name: name.into(),
            ty,
            has_default: false,
        });
        self
    }

    pub fn with_default_method(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.methods.push(TraitMethodDecl {
            name: name.into(),
            ty,
            has_default: true,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitMethodDecl {
    pub name: String,
    pub ty: Type,
    pub has_default: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDecl {
    pub trait_name: String,
    pub target_types: Vec<Type>,
    pub requirements: Vec<Constraint>,
    /// Names of the methods the instance body defines
    pub methods: Vec<String>,
    pub span: Option<Span>,
}

impl InstanceDecl {
    pub fn new(trait_name: impl Into<String>, target_types: Vec<Type>) -> Self {
        Self {
            trait_name: trait_name.into(),
            target_types,
            requirements: Vec::new(),
            methods: Vec::new(),
            span: None,
        }
    }

    pub fn requiring(mut self, requirement: Constraint) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn with_methods<S: Into<String>>(mut self, methods: impl IntoIterator<Item = S>) -> Self {
        self.methods.extend(methods.into_iter().map(Into::into));
        self
    }
}

/// A method declared directly on a type
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionDecl {
    pub type_name: String,
    pub method: String,
    pub ty: Type,
    pub span: Option<Span>,
}

/// A top-level function signature with its trait constraints
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub ty: Type,
    pub constraints: Vec<Constraint>,
    pub span: Option<Span>,
}
