//! Instance matching
//!
//! One matcher answers every instance query. The precision mode decides how
//! a candidate instance is compared with the call-site types:
//!
//! - `Exact` unifies every target type with its argument and yields the
//!   substitution that specializes the instance.
//! - `Existence` does the same but also accepts a partially applied
//!   constructor target such as `Functor<List>` for `List<Int>`.
//! - `Pattern` compares structurally and treats arguments accepted by the
//!   caller's predicate as wildcards.
//!
//! Every attempt renames the instance's variables with a fresh suffix
//! first, so instance variables never capture call-site variables. In all
//! modes the query must have exactly as many types as the trait has
//! parameters.

use crate::aliases::substitute_params;
use crate::error::{format_types, ResolutionError};
use crate::instances::InstanceDef;
use crate::scope::SymbolTable;
use crate::traits::Constraint;
use sable_types::{unify_all, Substitution, Type};
use std::collections::HashMap;

/// How closely a candidate instance must match the query types
#[derive(Clone, Copy)]
pub enum MatchPrecision<'p> {
    Exact,
    Existence,
    /// Arguments for which the predicate holds match anything
    Pattern(&'p dyn Fn(&Type) -> bool),
}

impl std::fmt::Debug for MatchPrecision<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "Exact"),
            Self::Existence => write!(f, "Existence"),
            Self::Pattern(_) => write!(f, "Pattern"),
        }
    }
}

/// A matched instance and the bindings of its type variables
#[derive(Debug, Clone, PartialEq)]
pub struct ImplementationMatch {
    pub instance: InstanceDef,
    /// Keyed by the instance's own variable names
    pub substitution: Substitution,
}

impl ImplementationMatch {
    /// Instantiate a type written in terms of the instance's variables
    pub fn specialize(&self, ty: &Type) -> Type {
        self.substitution.apply(ty)
    }

    /// The instance's target types at this call site
    pub fn target_types(&self) -> Vec<Type> {
        self.instance
            .target_types
            .iter()
            .map(|target| self.specialize(target))
            .collect()
    }

    pub fn evidence_name(&self) -> &str {
        &self.instance.constructor_name
    }
}

impl SymbolTable {
    /// Every visible instance of `trait_name` matching `args` under `precision`
    pub fn match_implementations(
        &self,
        trait_name: &str,
        args: &[Type],
        precision: MatchPrecision<'_>,
    ) -> Result<Vec<ImplementationMatch>, ResolutionError> {
        let info = self
            .get_trait(trait_name)
            .ok_or_else(|| ResolutionError::TraitNotFound {
                name: trait_name.to_string(),
                span: None,
            })?;

        if args.len() != info.arity() {
            tracing::trace!(%trait_name, expected = info.arity(), found = args.len(), "arity guard");
            return Ok(Vec::new());
        }

        let matches = self
            .get_all_implementations(trait_name)
            .into_iter()
            .filter_map(|instance| {
                let substitution = match precision {
                    MatchPrecision::Exact => self.unify_instance(instance, args, |_| true),
                    MatchPrecision::Existence => self
                        .unify_instance(instance, args, |_| true)
                        .or_else(|| {
                            self.matches_by_constructor(instance, args)
                                .then(Substitution::new)
                        }),
                    // repeated instance variables must agree across concrete positions
                    MatchPrecision::Pattern(is_unresolved) => self
                        .matches_structurally(instance, args, is_unresolved)
                        .then_some(())
                        .and_then(|()| {
                            self.unify_instance(instance, args, |arg| !is_unresolved(arg))
                        }),
                }?;

                tracing::trace!(%instance, %substitution, ?precision, "instance matched");
                Some(ImplementationMatch {
                    instance: instance.clone(),
                    substitution,
                })
            })
            .collect();

        Ok(matches)
    }

    /// The instance that applies to `args`, with its specializing substitution
    pub fn find_matching_implementation(
        &self,
        trait_name: &str,
        args: &[Type],
    ) -> Result<ImplementationMatch, ResolutionError> {
        let matches = self.match_implementations(trait_name, args, MatchPrecision::Exact)?;
        select_most_specific(trait_name, args, matches)
    }

    /// Whether any instance applies, without computing the substitution
    pub fn is_implementation_exists(&self, trait_name: &str, args: &[Type]) -> bool {
        self.match_implementations(trait_name, args, MatchPrecision::Existence)
            .is_ok_and(|matches| !matches.is_empty())
    }

    /// Instances matching the known positions of `args`
    pub fn find_matching_instances(
        &self,
        trait_name: &str,
        args: &[Type],
        is_unresolved: impl Fn(&Type) -> bool,
    ) -> Vec<ImplementationMatch> {
        self.match_implementations(trait_name, args, MatchPrecision::Pattern(&is_unresolved))
            .unwrap_or_default()
    }

    /// The single most specific instance matching the known positions of `args`
    pub fn find_instance(
        &self,
        trait_name: &str,
        args: &[Type],
        is_unresolved: impl Fn(&Type) -> bool,
    ) -> Option<ImplementationMatch> {
        let matches = self.find_matching_instances(trait_name, args, is_unresolved);
        select_most_specific(trait_name, args, matches).ok()
    }

    /// Requirements of the matched instance, instantiated at the call site
    pub fn requirements_for(&self, matched: &ImplementationMatch) -> Vec<Constraint> {
        matched
            .instance
            .requirements
            .iter()
            .map(|requirement| requirement.apply(&matched.substitution))
            .collect()
    }

    /// A trait method's signature at the matched instance's types
    pub fn specialize_trait_method(
        &self,
        trait_name: &str,
        method: &str,
        matched: &ImplementationMatch,
    ) -> Result<Type, ResolutionError> {
        let info = self
            .get_trait(trait_name)
            .ok_or_else(|| ResolutionError::TraitNotFound {
                name: trait_name.to_string(),
                span: None,
            })?;
        let signature = info
            .methods
            .get(method)
            .ok_or_else(|| ResolutionError::symbol_not_found(format!("{trait_name}.{method}"), None))?;

        let targets = matched.target_types();

        // method-level variables must not capture variables of the targets
        let target_vars: Vec<String> = targets.iter().flat_map(Type::free_vars).collect();
        let clashing: Substitution = signature
            .free_vars()
            .into_iter()
            .filter(|var| !info.type_params.contains(var) && target_vars.contains(var))
            .map(|var| {
                let renamed = Type::var(format!("{var}'"));
                (var, renamed)
            })
            .collect();
        let signature = clashing.apply(signature);

        let bindings: HashMap<&str, &Type> = info
            .type_params
            .iter()
            .map(String::as_str)
            .zip(targets.iter())
            .collect();
        Ok(substitute_params(&signature, &bindings))
    }

    /// Unify the selected positions of the renamed instance with the query,
    /// retrying with alias-expanded forms of either side
    fn unify_instance(
        &self,
        instance: &InstanceDef,
        args: &[Type],
        include: impl Fn(&Type) -> bool,
    ) -> Option<Substitution> {
        let suffix = self.next_attempt_suffix();
        let renamed = instance.rename_free_vars(&suffix);

        let positions: Vec<usize> = (0..args.len()).filter(|&i| include(&args[i])).collect();
        let targets: Vec<Type> = positions
            .iter()
            .map(|&i| renamed.target_types[i].clone())
            .collect();
        let query: Vec<Type> = positions.iter().map(|&i| args[i].clone()).collect();

        let attempt = |targets: &[Type], query: &[Type]| unify_all(targets.iter().zip(query.iter())).ok();

        let substitution = attempt(&targets, &query).or_else(|| {
            if !self.config().alias_retry {
                return None;
            }
            let expanded_targets: Vec<Type> =
                targets.iter().map(|ty| self.resolve_type_alias(ty)).collect();
            let expanded_query: Vec<Type> =
                query.iter().map(|ty| self.resolve_type_alias(ty)).collect();

            tracing::trace!(%instance, "retrying with expanded aliases");
            attempt(&expanded_targets, &query)
                .or_else(|| attempt(&targets, &expanded_query))
                .or_else(|| attempt(&expanded_targets, &expanded_query))
        })?;

        Some(restore_instance_vars(instance, &suffix, &substitution))
    }

    /// Accept `Functor<List>` for `List<Int>` by comparing base constructors
    fn matches_by_constructor(&self, instance: &InstanceDef, args: &[Type]) -> bool {
        if !self.config().constructor_fallback {
            return false;
        }

        instance
            .target_types
            .iter()
            .zip(args)
            .all(|(target, arg)| match target {
                Type::Var { .. } => true,
                Type::Con { name, .. } => {
                    arg.head_name() == Some(name.as_str())
                        || self.resolve_type_alias(arg).head_name() == Some(name.as_str())
                }
                _ => self.alias_equivalent(target, arg),
            })
    }

    fn matches_structurally(
        &self,
        instance: &InstanceDef,
        args: &[Type],
        is_unresolved: &dyn Fn(&Type) -> bool,
    ) -> bool {
        instance
            .target_types
            .iter()
            .zip(args)
            .all(|(target, arg)| self.structural_match(target, arg, is_unresolved))
    }

    fn structural_match(
        &self,
        target: &Type,
        arg: &Type,
        is_unresolved: &dyn Fn(&Type) -> bool,
    ) -> bool {
        if is_unresolved(arg) {
            return true;
        }

        let all = |left: &[Type], right: &[Type]| {
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right)
                    .all(|(l, r)| self.structural_match(l, r, is_unresolved))
        };

        let matched = match (target, arg) {
            (Type::Var { .. }, _) => true,
            (Type::Con { name: left, .. }, Type::Con { name: right, .. }) => left == right,
            (
                Type::App {
                    constructor: target_head,
                    args: target_args,
                },
                Type::App {
                    constructor: arg_head,
                    args: arg_args,
                },
            ) => {
                self.structural_match(target_head, arg_head, is_unresolved)
                    && all(target_args, arg_args)
            }
            (Type::Con { name, .. }, Type::App { .. }) => {
                self.config().constructor_fallback && arg.head_name() == Some(name.as_str())
            }
            (
                Type::Function {
                    params: target_params,
                    return_type: target_return,
                },
                Type::Function {
                    params: arg_params,
                    return_type: arg_return,
                },
            ) => {
                all(target_params, arg_params)
                    && self.structural_match(target_return, arg_return, is_unresolved)
            }
            (Type::Tuple { elements: left }, Type::Tuple { elements: right }) => all(left, right),
            (Type::Record { fields: left }, Type::Record { fields: right }) => {
                left.len() == right.len()
                    && left.iter().zip(right).all(|((ln, lt), (rn, rt))| {
                        ln == rn && self.structural_match(lt, rt, is_unresolved)
                    })
            }
            _ => false,
        };

        if matched || !self.config().alias_retry {
            return matched;
        }

        // expansion is a fixpoint, so this recurses at most once per level
        let expanded_target = self.resolve_type_alias(target);
        let expanded_arg = self.resolve_type_alias(arg);
        if &expanded_target == target && &expanded_arg == arg {
            return false;
        }
        self.structural_match(&expanded_target, &expanded_arg, is_unresolved)
    }
}

/// Map the renamed instance variables back to the instance's own names
fn restore_instance_vars(
    instance: &InstanceDef,
    suffix: &str,
    substitution: &Substitution,
) -> Substitution {
    instance
        .type_vars()
        .into_iter()
        .filter_map(|var| {
            let renamed = Type::var(format!("{var}{suffix}"));
            let bound = substitution.apply(&renamed);
            (bound != renamed).then_some((var, bound))
        })
        .collect()
}

/// Pick the match every other match generalizes, if there is exactly one
fn select_most_specific(
    trait_name: &str,
    args: &[Type],
    mut matches: Vec<ImplementationMatch>,
) -> Result<ImplementationMatch, ResolutionError> {
    if matches.len() == 1 {
        return Ok(matches.remove(0));
    }

    if matches.is_empty() {
        return Err(ResolutionError::NoMatchingImplementation {
            trait_name: trait_name.to_string(),
            types: format_types(args),
            span: None,
        });
    }

    let most_specific: Vec<usize> = (0..matches.len())
        .filter(|&i| {
            matches.iter().enumerate().all(|(j, other)| {
                i == j || other.instance.generalizes(&matches[i].instance)
            })
        })
        .collect();

    match most_specific.as_slice() {
        [winner] => Ok(matches.swap_remove(*winner)),
        _ => Err(ResolutionError::AmbiguousImplementation {
            trait_name: trait_name.to_string(),
            types: format_types(args),
            candidates: matches
                .iter()
                .map(|m| m.instance.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            span: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::symbols::Origin;
    use pretty_assertions::assert_eq;

    fn int() -> Type {
        Type::con("Int")
    }

    fn list(arg: Type) -> Type {
        Type::generic("List", vec![arg])
    }

    fn table() -> SymbolTable {
        let mut table = SymbolTable::with_config(ResolverConfig::isolated());
        table.define_trait("Show", vec!["A".to_string()], vec![], Origin::default());
        table
            .register_trait_method(
                "show",
                "Show",
                Type::function(vec![Type::var("A")], Type::con("String")),
                Origin::default(),
            )
            .unwrap();
        table
    }

    #[test]
    fn test_exact_match_binds_instance_variables() {
        let mut table = table();
        table
            .register_implementation(
                "Show",
                vec![list(Type::var("T"))],
                vec![Constraint::new("Show", vec![Type::var("T")])],
                "$impl_Show_List",
            )
            .unwrap();

        let matched = table
            .find_matching_implementation("Show", &[list(int())])
            .unwrap();
        assert_eq!(matched.substitution, Substitution::singleton("T", int()));
        assert_eq!(matched.evidence_name(), "$impl_Show_List");
        assert_eq!(
            table.requirements_for(&matched),
            vec![Constraint::new("Show", vec![int()])]
        );
        assert_eq!(
            table
                .specialize_trait_method("Show", "show", &matched)
                .unwrap(),
            Type::function(vec![list(int())], Type::con("String"))
        );
    }

    #[test]
    fn test_no_match_reports_types() {
        let mut table = table();
        table
            .register_implementation("Show", vec![int()], vec![], "$impl_Show_Int")
            .unwrap();

        let error = table
            .find_matching_implementation("Show", &[Type::con("Bool")])
            .unwrap_err();
        assert_eq!(error.to_string(), "No implementation of Show for Bool");
    }

    #[test]
    fn test_unknown_trait() {
        let table = table();
        assert!(matches!(
            table.find_matching_implementation("Hash", &[int()]),
            Err(ResolutionError::TraitNotFound { .. })
        ));
        assert!(!table.is_implementation_exists("Hash", &[int()]));
    }

    #[test]
    fn test_arity_guard_in_every_mode() {
        let mut table = table();
        table
            .register_implementation("Show", vec![Type::var("T")], vec![], "$impl_Show_T")
            .unwrap();

        let pair = [int(), int()];
        assert!(table.find_matching_implementation("Show", &pair).is_err());
        assert!(!table.is_implementation_exists("Show", &pair));
        assert!(table.find_matching_instances("Show", &pair, |_| true).is_empty());
        assert!(!table.is_implementation_exists("Show", &[]));
    }

    #[test]
    fn test_instance_variables_do_not_capture_call_site_variables() {
        let mut table = SymbolTable::with_config(ResolverConfig::isolated());
        table.define_trait(
            "Convert",
            vec!["A".to_string(), "B".to_string()],
            vec![],
            Origin::default(),
        );
        table
            .register_implementation(
                "Convert",
                vec![Type::var("T"), list(Type::var("T"))],
                vec![],
                "$impl_Convert",
            )
            .unwrap();

        // without renaming, the call-site T would be forced equal to List<T>
        let matched = table
            .find_matching_implementation("Convert", &[list(Type::var("T")), Type::var("U")])
            .unwrap();
        assert_eq!(
            matched.substitution,
            Substitution::singleton("T", list(Type::var("T")))
        );
    }

    #[test]
    fn test_most_specific_instance_wins() {
        let mut table = table();
        table
            .register_implementation(
                "Show",
                vec![list(Type::var("T"))],
                vec![Constraint::new("Show", vec![Type::var("T")])],
                "$impl_Show_List",
            )
            .unwrap();
        table
            .register_implementation(
                "Show",
                vec![list(Type::con("Char"))],
                vec![],
                "$impl_Show_String",
            )
            .unwrap();

        let matched = table
            .find_matching_implementation("Show", &[list(Type::con("Char"))])
            .unwrap();
        assert_eq!(matched.evidence_name(), "$impl_Show_String");

        let matched = table
            .find_matching_implementation("Show", &[list(int())])
            .unwrap();
        assert_eq!(matched.evidence_name(), "$impl_Show_List");
    }

    #[test]
    fn test_alias_retry() {
        let mut table = table();
        table.define_type_alias("Id", vec![], int(), Origin::default());
        table
            .register_implementation("Show", vec![int()], vec![], "$impl_Show_Int")
            .unwrap();

        assert!(table
            .find_matching_implementation("Show", &[Type::con("Id")])
            .is_ok());

        let mut strict = SymbolTable::with_config(ResolverConfig {
            alias_retry: false,
            ..ResolverConfig::isolated()
        });
        strict.define_trait("Show", vec!["A".to_string()], vec![], Origin::default());
        strict.define_type_alias("Id", vec![], int(), Origin::default());
        strict
            .register_implementation("Show", vec![int()], vec![], "$impl_Show_Int")
            .unwrap();
        assert!(strict
            .find_matching_implementation("Show", &[Type::con("Id")])
            .is_err());
    }

    #[test]
    fn test_existence_accepts_partially_applied_constructor() {
        let mut table = SymbolTable::with_config(ResolverConfig::isolated());
        table.define_trait("Functor", vec!["F".to_string()], vec![], Origin::default());
        table
            .register_implementation(
                "Functor",
                vec![Type::con("List")],
                vec![],
                "$impl_Functor_List",
            )
            .unwrap();

        assert!(table.is_implementation_exists("Functor", &[list(int())]));
        assert!(table.is_implementation_exists("Functor", &[Type::con("List")]));
        assert!(!table.is_implementation_exists("Functor", &[Type::generic("Option", vec![int()])]));
        assert!(table
            .find_matching_implementation("Functor", &[list(int())])
            .is_err());
    }

    #[test]
    fn test_pattern_match_skips_unresolved_positions() {
        let mut table = SymbolTable::with_config(ResolverConfig::isolated());
        table.define_trait(
            "Convert",
            vec!["A".to_string(), "B".to_string()],
            vec![],
            Origin::default(),
        );
        table
            .register_implementation(
                "Convert",
                vec![int(), Type::con("String")],
                vec![],
                "$impl_Convert_Int_String",
            )
            .unwrap();
        table
            .register_implementation(
                "Convert",
                vec![Type::con("Bool"), Type::con("String")],
                vec![],
                "$impl_Convert_Bool_String",
            )
            .unwrap();

        let unresolved = |ty: &Type| ty.var_name().is_some_and(|name| name.starts_with('?'));
        let query = [int(), Type::var("?0")];

        let matches = table.find_matching_instances("Convert", &query, unresolved);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].evidence_name(), "$impl_Convert_Int_String");

        let found = table
            .find_instance("Convert", &[Type::var("?1"), Type::con("String")], unresolved);
        assert!(found.is_none(), "two instances fit, neither is more specific");
    }

    #[test]
    fn test_pattern_match_keeps_repeated_variables_consistent() {
        let mut table = SymbolTable::with_config(ResolverConfig::isolated());
        table.define_trait(
            "Convert",
            vec!["A".to_string(), "B".to_string()],
            vec![],
            Origin::default(),
        );
        table
            .register_implementation(
                "Convert",
                vec![Type::var("T"), Type::var("T")],
                vec![],
                "$impl_Convert_T_T",
            )
            .unwrap();

        let never = |_: &Type| false;
        assert!(table
            .find_matching_instances("Convert", &[int(), Type::con("Bool")], never)
            .is_empty());
        assert!(!table.is_implementation_exists("Convert", &[int(), Type::con("Bool")]));

        let matches = table.find_matching_instances("Convert", &[int(), int()], never);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].substitution, Substitution::singleton("T", int()));

        // the unresolved position does not take part in the check
        let unresolved = |ty: &Type| ty.var_name().is_some_and(|name| name.starts_with('?'));
        let matches =
            table.find_matching_instances("Convert", &[Type::con("Bool"), Type::var("?0")], unresolved);
        assert_eq!(matches.len(), 1);
        assert_eq!(
            matches[0].substitution,
            Substitution::singleton("T", Type::con("Bool"))
        );
    }

    #[test]
    fn test_pattern_match_is_structural() {
        let mut table = table();
        table
            .register_implementation(
                "Show",
                vec![Type::tuple(vec![int(), list(Type::var("T"))])],
                vec![],
                "$impl_Show_Pair",
            )
            .unwrap();

        let never = |_: &Type| false;
        assert_eq!(
            table
                .find_matching_instances(
                    "Show",
                    &[Type::tuple(vec![int(), list(Type::con("Bool"))])],
                    never
                )
                .len(),
            1
        );
        assert!(table
            .find_matching_instances(
                "Show",
                &[Type::tuple(vec![Type::con("Bool"), list(int())])],
                never
            )
            .is_empty());
    }
}
