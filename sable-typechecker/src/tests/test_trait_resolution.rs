//! Tests for instance registration, matching and evidence

use crate::config::ResolverConfig;
use crate::declarations::{Declaration, InstanceDecl, TraitDecl, TypeDecl};
use crate::error::{ImplementationError, ResolutionError, TypecheckError};
use crate::passes::analyze_module;
use crate::scope::SymbolTable;
use crate::symbols::Origin;
use crate::traits::Constraint;
use pretty_assertions::assert_eq;
use sable_types::{unify, Kind, Substitution, Type};

fn int() -> Type {
    Type::con("Int")
}

fn bool() -> Type {
    Type::con("Bool")
}

fn list(arg: Type) -> Type {
    Type::generic("List", vec![arg])
}

fn isolated() -> SymbolTable {
    SymbolTable::with_config(ResolverConfig::isolated())
}

fn single_param_trait(table: &mut SymbolTable, name: &str) {
    table.define_trait(name, vec!["A".to_string()], vec![], Origin::module("test"));
}

#[test]
fn test_duplicate_instance_is_rejected_and_other_types_are_not() {
    let mut table = isolated();
    single_param_trait(&mut table, "Show");

    table
        .register_implementation("Show", vec![int()], vec![], "$impl_Show_Int")
        .unwrap();

    let error = table
        .register_implementation("Show", vec![int()], vec![], "$impl_Show_Int_2")
        .unwrap_err();
    assert_eq!(
        error,
        TypecheckError::Implementation(ImplementationError::OverlappingImplementation {
            trait_name: "Show".to_string(),
            existing: "Int".to_string(),
            new: "Int".to_string(),
            span: None,
        })
    );

    table
        .register_implementation("Show", vec![bool()], vec![], "$impl_Show_Bool")
        .unwrap();
    assert_eq!(table.get_all_implementations("Show").len(), 2);
}

#[test]
fn test_query_arity_must_equal_trait_arity() {
    let mut table = isolated();

    for arity in 1..=3usize {
        let name = format!("Rel{arity}");
        let params: Vec<String> = (0..arity).map(|i| format!("P{i}")).collect();
        let targets: Vec<Type> = params.iter().map(Type::var).collect();
        table.define_trait(name.clone(), params, vec![], Origin::module("test"));
        table
            .register_implementation(&name, targets, vec![], format!("$impl_{name}"))
            .unwrap();

        let exact = vec![int(); arity];
        assert!(table.is_implementation_exists(&name, &exact));
        assert!(table.find_matching_implementation(&name, &exact).is_ok());

        for wrong in [arity - 1, arity + 1] {
            let args = vec![int(); wrong];
            assert!(!table.is_implementation_exists(&name, &args));
            assert!(matches!(
                table.find_matching_implementation(&name, &args),
                Err(ResolutionError::NoMatchingImplementation { .. })
            ));
        }
    }
}

#[test]
fn test_generic_instance_specializes_method_types() {
    let mut table = isolated();
    table.define_trait("Container", vec!["C".to_string()], vec![], Origin::module("test"));
    table
        .register_trait_method(
            "size",
            "Container",
            Type::function(vec![Type::var("C")], int()),
            Origin::module("test"),
        )
        .unwrap();
    table
        .register_implementation(
            "Container",
            vec![list(Type::var("T"))],
            vec![],
            "$impl_Container_List_T",
        )
        .unwrap();

    let matched = table
        .find_matching_implementation("Container", &[list(int())])
        .unwrap();
    assert_eq!(matched.substitution, Substitution::singleton("T", int()));

    // `get: List<T> -> T` as written in the instance body
    let get = Type::function(vec![list(Type::var("T"))], Type::var("T"));
    assert_eq!(
        matched.specialize(&get),
        Type::function(vec![list(int())], int())
    );
    assert_eq!(
        table
            .specialize_trait_method("Container", "size", &matched)
            .unwrap(),
        Type::function(vec![list(int())], int())
    );
}

#[test]
fn test_higher_kinded_traits_are_detected() {
    let mut table = isolated();
    let f_of = |arg: Type| Type::app(Type::var("F"), vec![arg]);
    let declarations = vec![
        Declaration::Trait(TraitDecl::new("Functor", vec!["F".to_string()]).with_method(
            "map",
            Type::function(
                vec![
                    Type::function(vec![Type::var("A")], Type::var("B")),
                    f_of(Type::var("A")),
                ],
                f_of(Type::var("B")),
            ),
        )),
        Declaration::Trait(TraitDecl::new("Eq", vec!["A".to_string()]).with_method(
            "eq",
            Type::function(vec![Type::var("A"), Type::var("A")], bool()),
        )),
    ];
    analyze_module(&mut table, "test", &declarations).unwrap();

    assert!(table.is_hkt_trait("Functor"));
    assert!(!table.is_hkt_trait("Eq"));
    assert_eq!(
        table.get_trait("Functor").unwrap().param_kind("F"),
        Kind::with_arity(1)
    );
    assert_eq!(table.get_trait("Eq").unwrap().param_kind("A"), Kind::Star);
}

#[test]
fn test_eq_on_int_end_to_end() {
    let mut table = isolated();
    let eq_type = Type::function(vec![Type::var("A"), Type::var("A")], bool());
    let declarations = vec![
        Declaration::Type(TypeDecl::nominal("Int", vec![])),
        Declaration::Type(TypeDecl::nominal("Bool", vec![])),
        Declaration::Trait(TraitDecl::new("Eq", vec!["A".to_string()]).with_method("eq", eq_type.clone())),
        Declaration::Instance(InstanceDecl::new("Eq", vec![int()]).with_methods(["eq"])),
    ];
    analyze_module(&mut table, "test", &declarations).unwrap();

    let matched = table.find_matching_implementation("Eq", &[int()]).unwrap();
    assert_eq!(matched.evidence_name(), "$impl_Eq_Int");
    assert!(table.find_matching_implementation("Eq", &[int(), bool()]).is_err());

    // unequal operand types are rejected by the call site's own unification
    let signature = table.get_trait_method_type("Eq", "eq").unwrap();
    assert_eq!(signature, &eq_type);
    assert!(unify(signature, &Type::function(vec![int(), bool()], bool())).is_err());
    assert!(unify(signature, &Type::function(vec![int(), int()], bool())).is_ok());
}

#[test]
fn test_requirements_resolve_to_a_chain_of_dictionaries() {
    let mut table = SymbolTable::new();
    let query = [list(list(int()))];

    let outer = table.resolve_evidence("Ord", &query).unwrap();
    let requirements = table.requirements_for(&outer);
    assert_eq!(requirements, vec![Constraint::new("Ord", vec![list(int())])]);

    let middle = table
        .resolve_evidence("Ord", &requirements[0].args)
        .unwrap();
    let innermost = table.requirements_for(&middle);
    assert_eq!(innermost, vec![Constraint::new("Ord", vec![int()])]);
    table.resolve_evidence("Ord", &innermost[0].args).unwrap();

    let recorded: Vec<(&str, &str)> = table.evidence_table().iter().collect();
    assert_eq!(
        recorded,
        vec![
            ("Ord<List<List<Int>>>", "$impl_Ord_List_A"),
            ("Ord<List<Int>>", "$impl_Ord_List_A"),
            ("Ord<Int>", "$impl_Ord_Int"),
        ]
    );
    assert_eq!(table.get_trait_method_index("Ord", "lt"), Some(1));
}

#[test]
fn test_operator_dispatch_goes_through_its_trait() {
    let table = SymbolTable::new();
    let trait_name = table.get_trait_for_operator("+").unwrap();
    assert_eq!(trait_name, "Add");

    let matched = table
        .find_matching_implementation(trait_name, &[Type::con("Float")])
        .unwrap();
    assert_eq!(
        table
            .specialize_trait_method(trait_name, "add", &matched)
            .unwrap(),
        Type::function(vec![Type::con("Float"), Type::con("Float")], Type::con("Float"))
    );
    assert!(!table.is_implementation_exists(trait_name, &[bool()]));
}
