//! Instance registry and overlap checking

use crate::error::{format_types, ImplementationError, TypecheckError};
use crate::scope::SymbolTable;
use crate::traits::Constraint;
use sable_types::{unify_all, Substitution, Type};
use std::fmt;

/// A registered trait implementation
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDef {
    pub trait_name: String,
    /// One type per trait parameter
    pub target_types: Vec<Type>,
    /// Name of the compiled dictionary for this instance
    pub constructor_name: String,
    /// Instances this one depends on, such as `Show<T>` for `Show<List<T>>`
    pub requirements: Vec<Constraint>,
}

impl InstanceDef {
    pub fn new(
        trait_name: impl Into<String>,
        target_types: Vec<Type>,
        constructor_name: impl Into<String>,
        requirements: Vec<Constraint>,
    ) -> Self {
        Self {
            trait_name: trait_name.into(),
            target_types,
            constructor_name: constructor_name.into(),
            requirements,
        }
    }

    /// Copy with every type variable renamed by `suffix`
    pub fn rename_free_vars(&self, suffix: &str) -> Self {
        Self {
            trait_name: self.trait_name.clone(),
            target_types: self
                .target_types
                .iter()
                .map(|ty| ty.rename_free_vars(suffix))
                .collect(),
            constructor_name: self.constructor_name.clone(),
            requirements: self
                .requirements
                .iter()
                .map(|requirement| requirement.rename_free_vars(suffix))
                .collect(),
        }
    }

    /// Type variables of the target types
    pub fn type_vars(&self) -> Vec<String> {
        let mut vars = Vec::new();
        for target in &self.target_types {
            for var in target.free_vars() {
                if !vars.contains(&var) {
                    vars.push(var);
                }
            }
        }
        vars
    }

    /// Whether this instance's targets cover `other`'s by one-way matching
    pub fn generalizes(&self, other: &InstanceDef) -> bool {
        matches_one_way(&self.target_types, &other.target_types)
    }

    pub fn display_types(&self) -> String {
        format_types(&self.target_types)
    }
}

impl fmt::Display for InstanceDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.trait_name, self.display_types())
    }
}

/// Whether `pattern` can be instantiated to `target` without binding target variables
pub(crate) fn matches_one_way(pattern: &[Type], target: &[Type]) -> bool {
    if pattern.len() != target.len() {
        return false;
    }

    // freeze the target's variables into constants nothing else can name
    let freeze: Substitution = target
        .iter()
        .flat_map(Type::free_vars)
        .map(|var| {
            let frozen = Type::con(format!("?{var}"));
            (var, frozen)
        })
        .collect();
    let frozen: Vec<Type> = target.iter().map(|ty| freeze.apply(ty)).collect();
    let renamed: Vec<Type> = pattern.iter().map(|ty| ty.rename_free_vars("'")).collect();

    unify_all(renamed.iter().zip(frozen.iter())).is_ok()
}

impl SymbolTable {
    /// Register an instance in the current scope after checking it against every visible one
    #[tracing::instrument(level = "debug", skip_all, fields(trait_name = %trait_name))]
    pub fn register_implementation(
        &mut self,
        trait_name: &str,
        target_types: Vec<Type>,
        requirements: Vec<Constraint>,
        evidence_name: impl Into<String>,
    ) -> Result<(), TypecheckError> {
        let arity = self
            .get_trait(trait_name)
            .map(|info| info.arity())
            .ok_or_else(|| {
                TypecheckError::internal(format!(
                    "instance of {trait_name} registered before the trait was declared"
                ))
            })?;

        if target_types.len() != arity {
            return Err(ImplementationError::TraitArityMismatch {
                trait_name: trait_name.to_string(),
                expected: arity,
                found: target_types.len(),
                span: None,
            }
            .into());
        }

        let candidate = InstanceDef::new(trait_name, target_types, evidence_name, requirements);

        if self.config().check_overlap {
            if let Some(existing) = self.find_overlap(&candidate) {
                tracing::debug!(%existing, new = %candidate, "rejected overlapping instance");
                return Err(ImplementationError::OverlappingImplementation {
                    trait_name: trait_name.to_string(),
                    existing: existing.display_types(),
                    new: candidate.display_types(),
                    span: None,
                }
                .into());
            }
        }

        tracing::debug!(instance = %candidate, dictionary = %candidate.constructor_name, "register instance");
        self.current_scope_mut()
            .implementations
            .entry(trait_name.to_string())
            .or_default()
            .push(candidate);
        Ok(())
    }

    /// First visible instance whose targets unify with `candidate`'s
    fn find_overlap(&self, candidate: &InstanceDef) -> Option<&InstanceDef> {
        self.get_all_implementations(&candidate.trait_name)
            .into_iter()
            .find(|existing| {
                let left = existing.rename_free_vars(&self.next_attempt_suffix());
                let right = candidate.rename_free_vars(&self.next_attempt_suffix());
                let unifies =
                    unify_all(left.target_types.iter().zip(right.target_types.iter())).is_ok();

                unifies && !self.overlap_is_disambiguated(existing, candidate)
            })
    }

    /// A unifying pair is tolerated when one strictly specializes the other
    /// and the general one constrains its variables with requirements
    fn overlap_is_disambiguated(&self, existing: &InstanceDef, candidate: &InstanceDef) -> bool {
        if !self.config().allow_specialized_overlap {
            return false;
        }

        match (existing.generalizes(candidate), candidate.generalizes(existing)) {
            (true, true) => false,
            (true, false) => !existing.requirements.is_empty(),
            (false, true) => !candidate.requirements.is_empty(),
            (false, false) => false,
        }
    }

    /// Every instance of `trait_name` visible from the current scope, innermost first
    pub fn get_all_implementations(&self, trait_name: &str) -> Vec<&InstanceDef> {
        self.chain()
            .filter_map(|(_, scope)| scope.implementations.get(trait_name))
            .flatten()
            .collect()
    }

    /// Every visible instance of every trait
    pub fn all_implementations(&self) -> Vec<&InstanceDef> {
        self.chain()
            .flat_map(|(_, scope)| scope.implementations.values().flatten())
            .collect()
    }

    /// Whether `trait_name` holds for every instantiation of `targets`, either
    /// through a visible instance at least as general or through `requirements`
    pub fn is_implementation_entailed(
        &self,
        trait_name: &str,
        targets: &[Type],
        requirements: &[Constraint],
    ) -> bool {
        let required = requirements.iter().any(|requirement| {
            requirement.args == targets
                && (requirement.trait_name == trait_name
                    || self
                        .all_super_traits(&requirement.trait_name)
                        .iter()
                        .any(|super_trait| super_trait == trait_name))
        });
        if required {
            return true;
        }

        let expanded: Vec<Type> = targets
            .iter()
            .map(|target| self.resolve_type_alias(target))
            .collect();
        self.get_all_implementations(trait_name)
            .into_iter()
            .any(|instance| {
                if matches_one_way(&instance.target_types, targets) {
                    return true;
                }
                let instance_expanded: Vec<Type> = instance
                    .target_types
                    .iter()
                    .map(|target| self.resolve_type_alias(target))
                    .collect();
                matches_one_way(&instance_expanded, &expanded)
            })
    }
}
