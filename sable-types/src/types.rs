//! Type terms for the Sable type system
//!
//! `Type` is the term algebra every other component works on: nominal
//! constructors, applications, variables, functions, tuples, records and
//! quantified types. `Kind` classifies type constructors and `Substitution`
//! maps type variables to types.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Cached structural expansion of a nominal type
///
/// Ignored by equality and hashing: a nominal reference is the same type
/// whether or not it has been expanded yet.
#[derive(Debug, Clone, Default)]
pub struct AliasCache(Option<Box<Type>>);

impl AliasCache {
    pub fn new(underlying: Type) -> Self {
        Self(Some(Box::new(underlying)))
    }

    pub fn empty() -> Self {
        Self(None)
    }

    pub fn get(&self) -> Option<&Type> {
        self.0.as_deref()
    }
}

impl PartialEq for AliasCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for AliasCache {}

impl Hash for AliasCache {
    fn hash<H: Hasher>(&self, _state: &mut H) {}
}

/// A type term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Nominal type constructor: `Int`, `List`, `Point`
    Con { name: String, underlying: AliasCache },

    /// Constructor applied to arguments: `List<Int>`, `F<A>`
    ///
    /// Always kept flat: the constructor of an `App` is never itself an `App`.
    App {
        constructor: Box<Type>,
        args: Vec<Type>,
    },

    /// Type variable: `T`, `a`
    Var { name: String },

    /// Function type: `(Int, Bool) -> String`
    Function {
        params: Vec<Type>,
        return_type: Box<Type>,
    },

    /// Tuple type, the empty tuple is `Unit`
    Tuple { elements: Vec<Type> },

    /// Structural record, fields sorted by name
    Record { fields: Vec<(String, Type)> },

    /// Polymorphic quantifier: `forall T. T -> T`
    Forall { vars: Vec<String>, body: Box<Type> },
}

impl Type {
    /// Create a nominal type constructor
    pub fn con(name: impl Into<String>) -> Self {
        Self::Con {
            name: name.into(),
            underlying: AliasCache::empty(),
        }
    }

    /// Create a nominal type that already knows its structural expansion
    pub fn con_with_underlying(name: impl Into<String>, underlying: Type) -> Self {
        Self::Con {
            name: name.into(),
            underlying: AliasCache::new(underlying),
        }
    }

    /// Create a type variable
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var { name: name.into() }
    }

    /// Apply a constructor to arguments, flattening nested applications
    pub fn app(constructor: Type, args: Vec<Type>) -> Self {
        if args.is_empty() {
            return constructor;
        }

        match constructor {
            Self::App {
                constructor: inner,
                args: mut inner_args,
            } => {
                inner_args.extend(args);
                Self::App {
                    constructor: inner,
                    args: inner_args,
                }
            }
            constructor => Self::App {
                constructor: Box::new(constructor),
                args,
            },
        }
    }

    /// Shorthand for a named constructor applied to arguments (`List<Int>`)
    pub fn generic(name: impl Into<String>, args: Vec<Type>) -> Self {
        Self::app(Self::con(name), args)
    }

    pub fn function(params: Vec<Type>, return_type: Type) -> Self {
        Self::Function {
            params,
            return_type: Box::new(return_type),
        }
    }

    pub fn tuple(elements: Vec<Type>) -> Self {
        Self::Tuple { elements }
    }

    pub fn unit() -> Self {
        Self::Tuple {
            elements: Vec::new(),
        }
    }

    /// Create a record type; fields are stored sorted by name
    pub fn record<N: Into<String>>(fields: impl IntoIterator<Item = (N, Type)>) -> Self {
        let mut fields: Vec<(String, Type)> = fields
            .into_iter()
            .map(|(name, ty)| (name.into(), ty))
            .collect();
        fields.sort_by(|(a, _), (b, _)| a.cmp(b));
        Self::Record { fields }
    }

    /// Quantify over `vars`; quantifying over nothing returns the body
    pub fn forall(vars: Vec<String>, body: Type) -> Self {
        if vars.is_empty() {
            return body;
        }
        Self::Forall {
            vars,
            body: Box::new(body),
        }
    }

    /// Name of a nominal constructor
    pub fn con_name(&self) -> Option<&str> {
        match self {
            Self::Con { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Name of a type variable
    pub fn var_name(&self) -> Option<&str> {
        match self {
            Self::Var { name } => Some(name),
            _ => None,
        }
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Self::Var { .. })
    }

    /// The cached structural expansion of a nominal type, if known
    pub fn cached_underlying(&self) -> Option<&Type> {
        match self {
            Self::Con { underlying, .. } => underlying.get(),
            _ => None,
        }
    }

    /// The head of a (possibly applied) type: `List` for `List<Int>`
    pub fn head(&self) -> &Type {
        match self {
            Self::App { constructor, .. } => constructor.head(),
            _ => self,
        }
    }

    /// Name of the base constructor, unwrapping applications
    pub fn head_name(&self) -> Option<&str> {
        self.head().con_name()
    }

    /// Arguments of an application, empty for anything else
    pub fn type_args(&self) -> &[Type] {
        match self {
            Self::App { args, .. } => args,
            _ => &[],
        }
    }

    /// Free type variables in a stable order
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_free_vars(&mut Vec::new(), &mut out);
        out
    }

    fn collect_free_vars<'a>(&'a self, bound: &mut Vec<&'a str>, out: &mut BTreeSet<String>) {
        match self {
            Self::Var { name } => {
                if !bound.contains(&name.as_str()) {
                    out.insert(name.clone());
                }
            }
            Self::Con { .. } => {}
            Self::App { constructor, args } => {
                constructor.collect_free_vars(bound, out);
                for arg in args {
                    arg.collect_free_vars(bound, out);
                }
            }
            Self::Function {
                params,
                return_type,
            } => {
                for param in params {
                    param.collect_free_vars(bound, out);
                }
                return_type.collect_free_vars(bound, out);
            }
            Self::Tuple { elements } => {
                for element in elements {
                    element.collect_free_vars(bound, out);
                }
            }
            Self::Record { fields } => {
                for (_, ty) in fields {
                    ty.collect_free_vars(bound, out);
                }
            }
            Self::Forall { vars, body } => {
                let depth = bound.len();
                bound.extend(vars.iter().map(String::as_str));
                body.collect_free_vars(bound, out);
                bound.truncate(depth);
            }
        }
    }

    /// Check if this type mentions the given free variable (occurs check)
    pub fn contains_var(&self, target: &str) -> bool {
        match self {
            Self::Var { name } => name == target,
            Self::Con { .. } => false,
            Self::App { constructor, args } => {
                constructor.contains_var(target) || args.iter().any(|arg| arg.contains_var(target))
            }
            Self::Function {
                params,
                return_type,
            } => {
                params.iter().any(|param| param.contains_var(target))
                    || return_type.contains_var(target)
            }
            Self::Tuple { elements } => elements.iter().any(|e| e.contains_var(target)),
            Self::Record { fields } => fields.iter().any(|(_, ty)| ty.contains_var(target)),
            Self::Forall { vars, body } => {
                !vars.iter().any(|v| v == target) && body.contains_var(target)
            }
        }
    }

    /// A ground type has no free type variables
    pub fn is_ground(&self) -> bool {
        self.free_vars().is_empty()
    }

    /// Rename every free variable `T` to `T{suffix}`
    pub fn rename_free_vars(&self, suffix: &str) -> Type {
        let mut renaming = Substitution::new();
        for name in self.free_vars() {
            let renamed = format!("{name}{suffix}");
            renaming.insert(name, Type::var(renamed));
        }
        renaming.apply(self)
    }

    /// Rebuild this type with `f` applied to each direct child
    pub fn map_children(&self, mut f: impl FnMut(&Type) -> Type) -> Type {
        match self {
            Self::Con { .. } | Self::Var { .. } => self.clone(),
            Self::App { constructor, args } => {
                Type::app(f(constructor), args.iter().map(&mut f).collect())
            }
            Self::Function {
                params,
                return_type,
            } => Type::function(params.iter().map(&mut f).collect(), f(return_type)),
            Self::Tuple { elements } => Type::tuple(elements.iter().map(&mut f).collect()),
            Self::Record { fields } => Self::Record {
                fields: fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), f(ty)))
                    .collect(),
            },
            Self::Forall { vars, body } => Type::forall(vars.clone(), f(body)),
        }
    }

    /// Pre-order walk over this type and all nested types
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Type)) {
        visit(self);
        match self {
            Self::Con { .. } | Self::Var { .. } => {}
            Self::App { constructor, args } => {
                constructor.walk(visit);
                for arg in args {
                    arg.walk(visit);
                }
            }
            Self::Function {
                params,
                return_type,
            } => {
                for param in params {
                    param.walk(visit);
                }
                return_type.walk(visit);
            }
            Self::Tuple { elements } => {
                for element in elements {
                    element.walk(visit);
                }
            }
            Self::Record { fields } => {
                for (_, ty) in fields {
                    ty.walk(visit);
                }
            }
            Self::Forall { body, .. } => body.walk(visit),
        }
    }

    /// Check if any nested type satisfies `predicate`
    pub fn any(&self, mut predicate: impl FnMut(&Type) -> bool) -> bool {
        let mut found = false;
        self.walk(&mut |ty| {
            if !found && predicate(ty) {
                found = true;
            }
        });
        found
    }

    /// Check if this type mentions the nominal constructor `name`
    pub fn mentions_con(&self, name: &str) -> bool {
        self.any(|ty| ty.con_name() == Some(name))
    }
}

/// The kind of a type: `*` for ordinary types, arrows for constructors
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Kind {
    #[default]
    Star,
    Arrow { param: Box<Kind>, result: Box<Kind> },
}

impl Kind {
    pub fn arrow(param: Kind, result: Kind) -> Self {
        Self::Arrow {
            param: Box::new(param),
            result: Box::new(result),
        }
    }

    /// Kind of a constructor taking `arity` ordinary types: `* -> ... -> *`
    pub fn with_arity(arity: usize) -> Self {
        (0..arity).fold(Kind::Star, |result, _| Kind::arrow(Kind::Star, result))
    }

    /// Number of arguments before reaching `*`
    pub fn arity(&self) -> usize {
        match self {
            Self::Star => 0,
            Self::Arrow { result, .. } => 1 + result.arity(),
        }
    }

    pub fn is_star(&self) -> bool {
        matches!(self, Self::Star)
    }
}

/// Substitution mapping type variables to types
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution {
    mappings: HashMap<String, Type>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(name: impl Into<String>, ty: Type) -> Self {
        let mut substitution = Self::new();
        substitution.insert(name, ty);
        substitution
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: Type) {
        self.mappings.insert(name.into(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.mappings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.mappings.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Type> {
        self.mappings.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Mappings sorted by variable name
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Type)> {
        let mut entries: Vec<_> = self.mappings.iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries.into_iter()
    }

    /// Apply this substitution to a type, recursively resolving variables
    ///
    /// A variable already being resolved further up the chain is left as
    /// is, so cyclic mappings such as `{T ↦ U, U ↦ T}` terminate.
    pub fn apply(&self, ty: &Type) -> Type {
        if self.is_empty() {
            return ty.clone();
        }
        self.apply_guarded(ty, &mut Vec::new())
    }

    fn apply_guarded(&self, ty: &Type, resolving: &mut Vec<String>) -> Type {
        match ty {
            Type::Var { name } => match self.get(name) {
                Some(Type::Var { name: target }) if target == name => ty.clone(),
                Some(_) if resolving.contains(name) => ty.clone(),
                Some(substituted) => {
                    resolving.push(name.clone());
                    let resolved = self.apply_guarded(substituted, resolving);
                    resolving.pop();
                    resolved
                }
                None => ty.clone(),
            },
            Type::Forall { vars, body } => {
                if vars.iter().any(|var| self.contains(var)) {
                    let mut inner = self.clone();
                    for var in vars {
                        inner.remove(var);
                    }
                    Type::forall(vars.clone(), inner.apply_guarded(body, resolving))
                } else {
                    Type::forall(vars.clone(), self.apply_guarded(body, resolving))
                }
            }
            other => other.map_children(|child| self.apply_guarded(child, resolving)),
        }
    }

    /// Compose this substitution with another (self applied first)
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut result = Substitution::new();

        for (name, ty) in &self.mappings {
            result.insert(name.clone(), other.apply(ty));
        }

        for (name, ty) in &other.mappings {
            if !result.contains(name) {
                result.insert(name.clone(), ty.clone());
            }
        }

        result
    }

    /// Keep only the mappings for `names`
    pub fn restrict<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Substitution {
        let mut result = Substitution::new();
        for name in names {
            if let Some(ty) = self.get(name) {
                result.insert(name, ty.clone());
            }
        }
        result
    }

    /// Rename the mapped variables through `rename`, dropping unmapped keys
    pub fn rename_keys(&self, mut rename: impl FnMut(&str) -> Option<String>) -> Substitution {
        let mut result = Substitution::new();
        for (name, ty) in &self.mappings {
            if let Some(renamed) = rename(name) {
                result.insert(renamed, ty.clone());
            }
        }
        result
    }
}

impl<N: Into<String>> FromIterator<(N, Type)> for Substitution {
    fn from_iter<I: IntoIterator<Item = (N, Type)>>(iter: I) -> Self {
        let mut substitution = Substitution::new();
        for (name, ty) in iter {
            substitution.insert(name, ty);
        }
        substitution
    }
}

/// Type variable generator for creating fresh variables
#[derive(Debug, Clone)]
pub struct TypeVarGenerator {
    prefix: String,
    next_id: u32,
}

impl TypeVarGenerator {
    pub fn new() -> Self {
        Self::with_prefix("t")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next_id: 0,
        }
    }

    pub fn fresh_name(&mut self) -> String {
        let name = format!("{}{}", self.prefix, self.next_id);
        self.next_id += 1;
        name
    }

    /// Generate a fresh type variable
    pub fn fresh(&mut self) -> Type {
        Type::var(self.fresh_name())
    }
}

impl Default for TypeVarGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Type]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Con { name, .. } => write!(f, "{name}"),
            Self::Var { name } => write!(f, "{name}"),
            Self::App { constructor, args } => {
                write!(f, "{constructor}<")?;
                write_list(f, args)?;
                write!(f, ">")
            }
            Self::Function {
                params,
                return_type,
            } => {
                match params.as_slice() {
                    [single @ (Type::Con { .. } | Type::Var { .. } | Type::App { .. } | Type::Record { .. })] => {
                        write!(f, "{single}")?
                    }
                    _ => {
                        write!(f, "(")?;
                        write_list(f, params)?;
                        write!(f, ")")?;
                    }
                }
                write!(f, " -> {return_type}")
            }
            Self::Tuple { elements } => {
                write!(f, "(")?;
                write_list(f, elements)?;
                write!(f, ")")
            }
            Self::Record { fields } => {
                if fields.is_empty() {
                    return write!(f, "{{}}");
                }
                write!(f, "{{ ")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, " }}")
            }
            Self::Forall { vars, body } => write!(f, "forall {}. {body}", vars.join(" ")),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Star => write!(f, "*"),
            Self::Arrow { param, result } if param.is_star() => write!(f, "* -> {result}"),
            Self::Arrow { param, result } => write!(f, "({param}) -> {result}"),
        }
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, ty)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name} ↦ {ty}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn int() -> Type {
        Type::con("Int")
    }

    #[test]
    fn test_app_flattens_nested_applications() {
        let partial = Type::generic("Result", vec![Type::var("E")]);
        let full = Type::app(partial, vec![int()]);

        assert_eq!(full, Type::generic("Result", vec![Type::var("E"), int()]));
        assert_eq!(full.head_name(), Some("Result"));
        assert_eq!(Type::app(int(), vec![]), int());
    }

    #[test]
    fn test_alias_cache_ignored_by_equality() {
        let plain = Type::con("Point");
        let cached = Type::con_with_underlying(
            "Point",
            Type::record([("x", int()), ("y", int())]),
        );

        assert_eq!(plain, cached);
        assert!(cached.cached_underlying().is_some());
        assert!(plain.cached_underlying().is_none());
    }

    #[test]
    fn test_free_vars_respect_quantifiers() {
        let ty = Type::forall(
            vec!["T".to_string()],
            Type::function(vec![Type::var("T")], Type::var("U")),
        );

        let free: Vec<String> = ty.free_vars().into_iter().collect();
        assert_eq!(free, vec!["U".to_string()]);
        assert!(!ty.contains_var("T"));
        assert!(ty.contains_var("U"));
    }

    #[test]
    fn test_rename_free_vars() {
        let ty = Type::generic("Map", vec![Type::var("K"), Type::var("V")]);
        let renamed = ty.rename_free_vars("$1");

        assert_eq!(
            renamed,
            Type::generic("Map", vec![Type::var("K$1"), Type::var("V$1")])
        );
    }

    #[test]
    fn test_record_fields_sorted() {
        let record = Type::record([("y", int()), ("x", Type::con("Bool"))]);
        assert_eq!(record.to_string(), "{ x: Bool, y: Int }");
    }

    #[test]
    fn test_display_forms() {
        let list_int = Type::generic("List", vec![int()]);
        assert_eq!(list_int.to_string(), "List<Int>");
        assert_eq!(
            Type::function(vec![list_int.clone()], int()).to_string(),
            "List<Int> -> Int"
        );
        assert_eq!(
            Type::function(vec![int(), Type::con("Bool")], int()).to_string(),
            "(Int, Bool) -> Int"
        );
        assert_eq!(
            Type::function(vec![Type::function(vec![int()], int())], int()).to_string(),
            "(Int -> Int) -> Int"
        );
        assert_eq!(Type::unit().to_string(), "()");
        assert_eq!(
            Type::app(Type::var("F"), vec![Type::var("A")]).to_string(),
            "F<A>"
        );
    }

    #[test]
    fn test_kind_arity_and_display() {
        let list_kind = Kind::with_arity(1);
        assert_eq!(list_kind.arity(), 1);
        assert_eq!(list_kind.to_string(), "* -> *");
        assert_eq!(Kind::with_arity(2).to_string(), "* -> * -> *");
        assert_eq!(
            Kind::arrow(Kind::with_arity(1), Kind::Star).to_string(),
            "(* -> *) -> *"
        );
    }

    #[test]
    fn test_substitution_apply_resolves_chains() {
        let substitution: Substitution = [
            ("A", Type::var("B")),
            ("B", Type::generic("List", vec![int()])),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            substitution.apply(&Type::var("A")),
            Type::generic("List", vec![int()])
        );
    }

    #[test]
    fn test_substitution_apply_terminates_on_cycles() {
        let substitution: Substitution = [("T", Type::var("U")), ("U", Type::var("T"))]
            .into_iter()
            .collect();

        assert_eq!(substitution.apply(&Type::var("T")), Type::var("T"));
        assert_eq!(
            substitution.apply(&Type::generic("List", vec![Type::var("U")])),
            Type::generic("List", vec![Type::var("U")])
        );
    }

    #[test]
    fn test_substitution_skips_bound_vars() {
        let substitution = Substitution::singleton("T", int());
        let quantified = Type::forall(vec!["T".to_string()], Type::var("T"));

        assert_eq!(substitution.apply(&quantified), quantified);
    }

    #[test]
    fn test_substitution_apply_flattens_hkt_constructor() {
        let substitution =
            Substitution::singleton("F", Type::generic("Result", vec![Type::con("String")]));
        let applied = substitution.apply(&Type::app(Type::var("F"), vec![int()]));

        assert_eq!(
            applied,
            Type::generic("Result", vec![Type::con("String"), int()])
        );
    }

    #[test]
    fn test_substitution_compose() {
        let first = Substitution::singleton("A", Type::var("B"));
        let second = Substitution::singleton("B", int());
        let composed = first.compose(&second);

        assert_eq!(composed.get("A"), Some(&int()));
        assert_eq!(composed.get("B"), Some(&int()));
        assert_eq!(composed.to_string(), "{A ↦ Int, B ↦ Int}");
    }

    #[test]
    fn test_fresh_type_vars() {
        let mut generator = TypeVarGenerator::new();
        assert_eq!(generator.fresh(), Type::var("t0"));
        assert_eq!(generator.fresh(), Type::var("t1"));
    }
}
