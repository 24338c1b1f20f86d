//! Type unification
//!
//! Robinson unification over `Type` with an occurs check. Applications of
//! unequal arity unify by currying the longer one, so a higher-kinded
//! variable `F` in `F<A>` can bind to a partially applied constructor such
//! as `Result<E>`.

use crate::error::UnificationError;
use crate::types::{Substitution, Type};
use std::cmp::Ordering;

/// Result type for unification operations
pub type UnificationResult<T = Substitution> = Result<T, UnificationError>;

/// Unify two types, producing the most general substitution
pub fn unify(left: &Type, right: &Type) -> UnificationResult {
    let mut unifier = Unifier::new();
    unifier.unify(left, right)?;
    Ok(unifier.into_substitution())
}

/// Unify types pairwise, threading the substitution from each pair into the next
pub fn unify_all<'a>(pairs: impl IntoIterator<Item = (&'a Type, &'a Type)>) -> UnificationResult {
    let mut unifier = Unifier::new();
    for (left, right) in pairs {
        unifier.unify(left, right)?;
    }
    Ok(unifier.into_substitution())
}

/// Incremental unifier accumulating a substitution
#[derive(Debug, Clone, Default)]
pub struct Unifier {
    substitution: Substitution,
    rigid_counter: u32,
}

impl Unifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue unifying on top of an existing substitution
    pub fn with_substitution(substitution: Substitution) -> Self {
        Self {
            substitution,
            rigid_counter: 0,
        }
    }

    pub fn substitution(&self) -> &Substitution {
        &self.substitution
    }

    pub fn into_substitution(self) -> Substitution {
        self.substitution
    }

    /// Unify two types under the current substitution
    pub fn unify(&mut self, left: &Type, right: &Type) -> UnificationResult<()> {
        let left = self.substitution.apply(left);
        let right = self.substitution.apply(right);
        self.unify_resolved(&left, &right)
    }

    fn unify_resolved(&mut self, left: &Type, right: &Type) -> UnificationResult<()> {
        if left == right {
            return Ok(());
        }

        match (left, right) {
            (Type::Var { name }, other) | (other, Type::Var { name }) => self.bind(name, other),

            (Type::Con { name: a, .. }, Type::Con { name: b, .. }) if a == b => Ok(()),

            (
                Type::App {
                    constructor: left_con,
                    args: left_args,
                },
                Type::App {
                    constructor: right_con,
                    args: right_args,
                },
            ) => self.unify_applications(left_con, left_args, right_con, right_args),

            (
                Type::Function {
                    params: left_params,
                    return_type: left_ret,
                },
                Type::Function {
                    params: right_params,
                    return_type: right_ret,
                },
            ) => {
                if left_params.len() != right_params.len() {
                    return Err(UnificationError::FunctionArityMismatch {
                        expected_params: left_params.len(),
                        found_params: right_params.len(),
                        span: None,
                    });
                }
                for (l, r) in left_params.iter().zip(right_params) {
                    self.unify(l, r)?;
                }
                self.unify(left_ret, right_ret)
            }

            (Type::Tuple { elements: left_elems }, Type::Tuple { elements: right_elems }) => {
                if left_elems.len() != right_elems.len() {
                    return Err(UnificationError::ArityMismatch {
                        type_name: "tuple".to_string(),
                        expected_arity: left_elems.len(),
                        found_arity: right_elems.len(),
                        span: None,
                    });
                }
                for (l, r) in left_elems.iter().zip(right_elems) {
                    self.unify(l, r)?;
                }
                Ok(())
            }

            (Type::Record { fields: left_fields }, Type::Record { fields: right_fields }) => {
                let same_shape = left_fields.len() == right_fields.len()
                    && left_fields
                        .iter()
                        .zip(right_fields)
                        .all(|((l, _), (r, _))| l == r);
                if !same_shape {
                    return Err(UnificationError::RecordFieldMismatch {
                        expected: left.clone(),
                        found: right.clone(),
                        span: None,
                    });
                }
                for ((_, l), (_, r)) in left_fields.iter().zip(right_fields) {
                    self.unify(l, r)?;
                }
                Ok(())
            }

            (
                Type::Forall {
                    vars: left_vars,
                    body: left_body,
                },
                Type::Forall {
                    vars: right_vars,
                    body: right_body,
                },
            ) => {
                if left_vars.len() != right_vars.len() {
                    return Err(UnificationError::QuantifierMismatch {
                        expected: left.clone(),
                        found: right.clone(),
                        span: None,
                    });
                }
                self.unify_quantified(left_vars, left_body, right_vars, right_body)
            }

            _ => Err(UnificationError::TypeMismatch {
                expected: left.clone(),
                found: right.clone(),
                span: None,
            }),
        }
    }

    fn bind(&mut self, name: &str, ty: &Type) -> UnificationResult<()> {
        if ty.var_name() == Some(name) {
            return Ok(());
        }

        if ty.contains_var(name) {
            return Err(UnificationError::OccursCheck {
                var_name: name.to_string(),
                containing_type: ty.clone(),
                span: None,
            });
        }

        self.substitution = self
            .substitution
            .compose(&Substitution::singleton(name, ty.clone()));
        Ok(())
    }

    fn unify_applications(
        &mut self,
        left_con: &Type,
        left_args: &[Type],
        right_con: &Type,
        right_args: &[Type],
    ) -> UnificationResult<()> {
        match left_args.len().cmp(&right_args.len()) {
            Ordering::Equal => {
                self.unify(left_con, right_con)?;
                for (l, r) in left_args.iter().zip(right_args) {
                    self.unify(l, r)?;
                }
                Ok(())
            }
            // `F<A>` against `Result<E, Int>`: F takes the partial application `Result<E>`
            Ordering::Less => {
                let split = right_args.len() - left_args.len();
                let partial = Type::app(right_con.clone(), right_args[..split].to_vec());
                self.unify(left_con, &partial)?;
                for (l, r) in left_args.iter().zip(&right_args[split..]) {
                    self.unify(l, r)?;
                }
                Ok(())
            }
            Ordering::Greater => {
                let split = left_args.len() - right_args.len();
                let partial = Type::app(left_con.clone(), left_args[..split].to_vec());
                self.unify(&partial, right_con)?;
                for (l, r) in left_args[split..].iter().zip(right_args) {
                    self.unify(l, r)?;
                }
                Ok(())
            }
        }
    }

    fn unify_quantified(
        &mut self,
        left_vars: &[String],
        left_body: &Type,
        right_vars: &[String],
        right_body: &Type,
    ) -> UnificationResult<()> {
        let rigid: Vec<Type> = left_vars.iter().map(|_| self.fresh_rigid()).collect();
        let left_rigid: Substitution = left_vars.iter().cloned().zip(rigid.clone()).collect();
        let right_rigid: Substitution = right_vars.iter().cloned().zip(rigid.clone()).collect();

        self.unify(&left_rigid.apply(left_body), &right_rigid.apply(right_body))?;

        for (var_name, bound_to) in self.substitution.iter() {
            let escapes = rigid
                .iter()
                .filter_map(Type::con_name)
                .any(|skolem| bound_to.mentions_con(skolem));
            if escapes {
                return Err(UnificationError::EscapingVariable {
                    var_name: var_name.clone(),
                    bound_to: bound_to.clone(),
                    span: None,
                });
            }
        }

        Ok(())
    }

    fn fresh_rigid(&mut self) -> Type {
        let rigid = Type::con(format!("!{}", self.rigid_counter));
        self.rigid_counter += 1;
        rigid
    }
}
