//! The prelude scope
//!
//! Built once per process on first use and never mutated afterwards. Every
//! table created with `include_prelude` chains its global scope to this
//! scope, so concurrent compilations share it without locking.

use crate::config::ResolverConfig;
use crate::error::TypecheckError;
use crate::evidence::dictionary_name;
use crate::scope::{Scope, SymbolTable};
use crate::symbols::Origin;
use crate::traits::Constraint;
use lazy_static::lazy_static;
use sable_types::{Kind, Type};

/// Module name recorded as the origin of every prelude symbol
pub const PRELUDE_MODULE: &str = "Prelude";

lazy_static! {
    /// The shared prelude scope, built on first use
    static ref PRELUDE: Scope = match build_prelude() {
        Ok(scope) => scope,
        Err(error) => panic!("the prelude failed to build: {error}"),
    };
}

/// Build the prelude if this is the first use, and return it
pub fn ensure_prelude() -> &'static Scope {
    &PRELUDE
}

fn var(name: &str) -> Type {
    Type::var(name)
}

fn con(name: &str) -> Type {
    Type::con(name)
}

fn binary(operand: Type, result: Type) -> Type {
    Type::function(vec![operand.clone(), operand], result)
}

/// Build the prelude scope in an isolated table
pub fn build_prelude() -> Result<Scope, TypecheckError> {
    let mut table = SymbolTable::with_config(ResolverConfig::isolated());

    define_types(&mut table);
    define_traits(&mut table)?;
    define_instances(&mut table)?;

    tracing::debug!(
        symbols = table.current_scope().len(),
        instances = table.all_implementations().len(),
        "prelude built"
    );
    Ok(table.into_global_scope().into_prelude())
}

fn define_types(table: &mut SymbolTable) {
    for name in ["Int", "Float", "Bool", "Char"] {
        table.define_type(name, con(name), Origin::prelude());
        table.register_kind(name, Kind::Star);
    }
    table.define_type_alias("Unit", vec![], Type::unit(), Origin::prelude());

    for (name, params) in [
        ("List", &["T"][..]),
        ("Option", &["T"][..]),
        ("Result", &["E", "T"][..]),
        ("Map", &["K", "V"][..]),
    ] {
        let nominal = Type::generic(name, params.iter().map(|p| var(p)).collect());
        table.define_type(name, nominal, Origin::prelude());
        table.register_kind(name, Kind::with_arity(params.len()));
    }

    table.define_type_alias(
        "String",
        vec![],
        Type::generic("List", vec![con("Char")]),
        Origin::prelude(),
    );

    let option = |arg: Type| Type::generic("Option", vec![arg]);
    let result = Type::generic("Result", vec![var("E"), var("T")]);
    let t = || vec!["T".to_string()];
    let e_t = || vec!["E".to_string(), "T".to_string()];

    table.register_variants("Option", vec!["Some".to_string(), "None".to_string()]);
    table.define_constructor(
        "Some",
        Type::forall(t(), Type::function(vec![var("T")], option(var("T")))),
        Origin::prelude(),
    );
    table.define_constructor("None", Type::forall(t(), option(var("T"))), Origin::prelude());

    table.register_variants("Result", vec!["Ok".to_string(), "Err".to_string()]);
    table.define_constructor(
        "Ok",
        Type::forall(e_t(), Type::function(vec![var("T")], result.clone())),
        Origin::prelude(),
    );
    table.define_constructor(
        "Err",
        Type::forall(e_t(), Type::function(vec![var("E")], result)),
        Origin::prelude(),
    );
}

fn define_traits(table: &mut SymbolTable) -> Result<(), TypecheckError> {
    let a = || vec!["A".to_string()];

    table.define_trait("Eq", a(), vec![], Origin::prelude());
    table.register_trait_method("eq", "Eq", binary(var("A"), con("Bool")), Origin::prelude())?;
    table.register_trait_method("neq", "Eq", binary(var("A"), con("Bool")), Origin::prelude())?;
    table.register_trait_default_method("Eq", "neq")?;
    table.register_operator_trait("==", "Eq");

    table.define_trait("Ord", a(), vec!["Eq".to_string()], Origin::prelude());
    table.register_trait_method("compare", "Ord", binary(var("A"), con("Int")), Origin::prelude())?;
    table.register_trait_method("lt", "Ord", binary(var("A"), con("Bool")), Origin::prelude())?;
    table.register_trait_default_method("Ord", "lt")?;
    table.register_operator_trait("<", "Ord");

    table.define_trait("Show", a(), vec![], Origin::prelude());
    table.register_trait_method(
        "show",
        "Show",
        Type::function(vec![var("A")], con("String")),
        Origin::prelude(),
    )?;

    for (name, method, operator) in [
        ("Add", "add", "+"),
        ("Sub", "sub", "-"),
        ("Mul", "mul", "*"),
        ("Div", "div", "/"),
    ] {
        table.define_trait(name, a(), vec![], Origin::prelude());
        table.register_trait_method(method, name, binary(var("A"), var("A")), Origin::prelude())?;
        table.register_operator_trait(operator, name);
    }

    table.define_trait("Functor", vec!["F".to_string()], vec![], Origin::prelude());
    table.register_trait_method(
        "map",
        "Functor",
        Type::function(
            vec![
                Type::function(vec![var("A")], var("B")),
                Type::app(var("F"), vec![var("A")]),
            ],
            Type::app(var("F"), vec![var("B")]),
        ),
        Origin::prelude(),
    )?;

    for name in ["Eq", "Ord", "Show", "Add", "Sub", "Mul", "Div", "Functor"] {
        table.infer_trait_param_kinds(name)?;
        table.check_super_traits(name)?;
    }
    Ok(())
}

fn instance(
    table: &mut SymbolTable,
    trait_name: &str,
    target: Type,
    requirements: Vec<Constraint>,
) -> Result<(), TypecheckError> {
    let targets = vec![target];
    let dictionary = dictionary_name(trait_name, &targets);
    table.register_implementation(trait_name, targets, requirements, dictionary)
}

fn define_instances(table: &mut SymbolTable) -> Result<(), TypecheckError> {
    for name in ["Int", "Float", "Bool", "Char"] {
        instance(table, "Eq", con(name), vec![])?;
        instance(table, "Show", con(name), vec![])?;
    }
    for name in ["Int", "Float", "Char"] {
        instance(table, "Ord", con(name), vec![])?;
    }
    for trait_name in ["Add", "Sub", "Mul", "Div"] {
        instance(table, trait_name, con("Int"), vec![])?;
        instance(table, trait_name, con("Float"), vec![])?;
    }

    let list_of = |arg: Type| Type::generic("List", vec![arg]);
    let option_of = |arg: Type| Type::generic("Option", vec![arg]);

    for trait_name in ["Eq", "Show"] {
        let requirement = vec![Constraint::new(trait_name, vec![var("A")])];
        instance(table, trait_name, list_of(var("A")), requirement.clone())?;
        instance(table, trait_name, option_of(var("A")), requirement)?;
    }
    instance(table, "Ord", list_of(var("A")), vec![Constraint::new("Ord", vec![var("A")])])?;

    // strings render as text rather than as a list of characters
    instance(table, "Show", list_of(con("Char")), vec![])?;

    instance(table, "Functor", con("List"), vec![])?;
    instance(table, "Functor", con("Option"), vec![])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionError;
    use crate::scope::ScopeId;
    use crate::symbols::SymbolKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_prelude_is_built_once() {
        let first = ensure_prelude();
        let second = ensure_prelude();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_tables_see_the_prelude() {
        let table = SymbolTable::new();

        let int = table.find("Int").unwrap();
        assert_eq!(int.kind, SymbolKind::Type);
        assert_eq!(int.origin_module.as_deref(), Some(PRELUDE_MODULE));

        let (owner, _) = table.find_with_scope("eq").unwrap();
        assert_eq!(owner, ScopeId::PRELUDE);
        assert_eq!(table.get_trait_for_operator("+"), Some("Add"));
        assert_eq!(table.get_kind("Result"), Some(&Kind::with_arity(2)));
    }

    #[test]
    fn test_isolated_tables_do_not() {
        let table = SymbolTable::with_config(ResolverConfig::isolated());
        assert!(table.find("Int").is_none());
        assert!(table.get_trait("Eq").is_none());
    }

    #[test]
    fn test_prelude_is_immutable() {
        let mut table = SymbolTable::new();
        assert!(matches!(
            table.update("Int", Type::con("Float")),
            Err(ResolutionError::ImmutableSymbol { .. })
        ));

        let error = table
            .register_trait_method("debug", "Show", Type::con("String"), Origin::default())
            .unwrap_err();
        assert!(error.is_internal());
    }

    #[test]
    fn test_user_instances_extend_prelude_traits() {
        let mut table = SymbolTable::new();
        table.define_type("Point", Type::con("Point"), Origin::module("geo"));
        table
            .register_implementation("Show", vec![Type::con("Point")], vec![], "$impl_Show_Point")
            .unwrap();

        assert!(table.is_implementation_exists("Show", &[Type::con("Point")]));
        assert!(SymbolTable::new()
            .find_matching_implementation("Show", &[Type::con("Point")])
            .is_err());
    }

    #[test]
    fn test_string_prefers_its_own_show() {
        let table = SymbolTable::new();

        let matched = table
            .find_matching_implementation("Show", &[Type::con("String")])
            .unwrap();
        assert_eq!(matched.evidence_name(), "$impl_Show_List_Char");

        let matched = table
            .find_matching_implementation("Show", &[Type::generic("List", vec![Type::con("Int")])])
            .unwrap();
        assert_eq!(matched.evidence_name(), "$impl_Show_List_A");
        assert_eq!(
            table.requirements_for(&matched),
            vec![Constraint::new("Show", vec![Type::con("Int")])]
        );
    }

    #[test]
    fn test_functor_is_higher_kinded() {
        let table = SymbolTable::new();
        assert!(table.is_hkt_trait("Functor"));
        assert!(!table.is_hkt_trait("Eq"));
        assert_eq!(
            table.get_trait("Functor").unwrap().param_kind("F"),
            Kind::with_arity(1)
        );
        assert_eq!(table.all_super_traits("Ord"), vec!["Eq"]);
    }
}
