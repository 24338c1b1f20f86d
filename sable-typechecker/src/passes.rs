//! Declaration passes
//!
//! Top-level declarations are processed in ordered passes so that every
//! name is known before any signature mentions it and every trait is
//! complete before instances of it are registered:
//!
//! 1. naming: declare type, trait and function names as pending symbols,
//!    along with the parameter lists of generic aliases
//! 2. headers: fill in types, aliases, traits, signatures and extensions
//! 3. instances: register instances, checking overlap
//! 4. validation: check instance bodies and supertrait instances
//!
//! User errors are collected and reported together. An internal error
//! means the registry was used out of order and aborts the unit at once.

use crate::declarations::{
    Declaration, ExtensionDecl, FunctionDecl, InstanceDecl, TraitDecl, TypeDecl, TypeDefinition,
};
use crate::error::{
    format_types, DeclarationError, ImplementationError, ResolutionError, TypecheckError,
};
use crate::evidence::dictionary_name;
use crate::scope::SymbolTable;
use crate::symbols::{Origin, SymbolKind};
use sable_types::{to_source_span, Kind, Span, Type};
use std::collections::HashSet;

/// Run every declaration pass over one module
#[tracing::instrument(level = "debug", skip(table, declarations), fields(declarations = declarations.len()))]
pub fn analyze_module(
    table: &mut SymbolTable,
    module: &str,
    declarations: &[Declaration],
) -> Result<(), Vec<TypecheckError>> {
    DeclarationAnalyzer::new(table, module).analyze(declarations)
}

/// Drives the declaration passes for one module
pub struct DeclarationAnalyzer<'t> {
    table: &'t mut SymbolTable,
    module: String,
    errors: Vec<TypecheckError>,
    /// Declarations rejected during naming, ignored by later passes
    skipped: HashSet<usize>,
    /// Instances that registered, checked by the validation pass
    registered: Vec<usize>,
}

impl<'t> DeclarationAnalyzer<'t> {
    pub fn new(table: &'t mut SymbolTable, module: impl Into<String>) -> Self {
        Self {
            table,
            module: module.into(),
            errors: Vec::new(),
            skipped: HashSet::new(),
            registered: Vec::new(),
        }
    }

    pub fn analyze(mut self, declarations: &[Declaration]) -> Result<(), Vec<TypecheckError>> {
        if let Err(internal) = self.run_passes(declarations) {
            tracing::debug!(%internal, "aborting module");
            self.errors.push(internal);
            return Err(self.errors);
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    fn run_passes(&mut self, declarations: &[Declaration]) -> Result<(), TypecheckError> {
        self.naming_pass(declarations)?;
        self.header_pass(declarations)?;
        self.instance_pass(declarations)?;
        self.validation_pass(declarations)
    }

    fn origin(&self, span: Option<Span>) -> Origin {
        Origin {
            module: Some(self.module.clone()),
            span,
        }
    }

    /// Collect a user error, or hand an internal one back to abort the passes
    fn report(
        &mut self,
        error: impl Into<TypecheckError>,
        span: Option<Span>,
    ) -> Result<(), TypecheckError> {
        let error = error.into();
        if error.is_internal() {
            return Err(error);
        }
        let error = match span {
            Some(location) => error.at(location),
            None => error,
        };
        self.errors.push(error);
        Ok(())
    }

    fn active<'a, 'd: 'a>(
        &'a self,
        declarations: &'d [Declaration],
    ) -> impl Iterator<Item = (usize, &'d Declaration)> + 'a {
        declarations
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.skipped.contains(index))
    }

    fn naming_pass(&mut self, declarations: &[Declaration]) -> Result<(), TypecheckError> {
        for (index, declaration) in declarations.iter().enumerate() {
            let (name, kind) = match declaration {
                Declaration::Type(decl) => (&decl.name, SymbolKind::Type),
                Declaration::Trait(decl) => (&decl.name, SymbolKind::Trait),
                Declaration::Function(decl) => (&decl.name, SymbolKind::Variable),
                Declaration::Instance(_) | Declaration::Extension(_) => continue,
            };

            if let Some(previous) = self.table.current_scope().symbol(name) {
                let error = DeclarationError::Redefinition {
                    name: name.clone(),
                    span: None,
                    previous_span: to_source_span(previous.definition_site),
                };
                self.skipped.insert(index);
                self.report(error, declaration.span())?;
                continue;
            }

            let origin = self.origin(declaration.span());
            self.table.define_pending(name.clone(), kind, origin);

            // forward uses of a generic alias are arity-checked before its header is declared
            if let Declaration::Type(decl) = declaration {
                if matches!(decl.definition, TypeDefinition::Alias(_)) && !decl.params.is_empty() {
                    self.table
                        .register_alias_params(decl.name.clone(), decl.params.clone());
                }
            }
        }
        Ok(())
    }

    fn header_pass(&mut self, declarations: &[Declaration]) -> Result<(), TypecheckError> {
        let active: Vec<_> = self.active(declarations).collect();

        for &(_, declaration) in &active {
            match declaration {
                Declaration::Type(decl) => self.declare_type(decl)?,
                Declaration::Trait(decl) => self.declare_trait(decl)?,
                Declaration::Function(decl) => self.declare_function(decl)?,
                Declaration::Extension(decl) => self.declare_extension(decl)?,
                Declaration::Instance(_) => {}
            }
        }

        // kinds and supertraits need every trait of the module in place
        for &(_, declaration) in &active {
            if let Declaration::Trait(decl) = declaration {
                self.table.infer_trait_param_kinds(&decl.name)?;
                if let Err(error) = self.table.check_super_traits(&decl.name) {
                    self.report(error, decl.span)?;
                }
            }
        }
        Ok(())
    }

    fn declare_type(&mut self, decl: &TypeDecl) -> Result<(), TypecheckError> {
        let origin = self.origin(decl.span);

        match &decl.definition {
            TypeDefinition::Alias(underlying) => {
                if let Err(error) = self.table.check_alias_arity(underlying, decl.span) {
                    self.report(error, decl.span)?;
                }
                self.table.define_type_alias(
                    decl.name.clone(),
                    decl.params.clone(),
                    underlying.clone(),
                    origin,
                );
            }
            TypeDefinition::Nominal => {
                self.table
                    .define_type(decl.name.clone(), decl.nominal_type(), origin);
                self.table
                    .register_kind(decl.name.clone(), Kind::with_arity(decl.params.len()));
            }
            TypeDefinition::Variants(variants) => {
                let nominal = decl.nominal_type();
                self.table
                    .define_type(decl.name.clone(), nominal.clone(), origin.clone());
                self.table
                    .register_kind(decl.name.clone(), Kind::with_arity(decl.params.len()));
                self.table.register_variants(
                    decl.name.clone(),
                    variants.iter().map(|variant| variant.name.clone()).collect(),
                );

                for variant in variants {
                    let constructor = if variant.fields.is_empty() {
                        nominal.clone()
                    } else {
                        Type::function(variant.fields.clone(), nominal.clone())
                    };
                    self.table.define_constructor(
                        variant.name.clone(),
                        Type::forall(decl.params.clone(), constructor),
                        origin.clone(),
                    );
                }
            }
        }
        Ok(())
    }

    fn declare_trait(&mut self, decl: &TraitDecl) -> Result<(), TypecheckError> {
        let origin = self.origin(decl.span);
        self.table.define_trait(
            decl.name.clone(),
            decl.params.clone(),
            decl.super_traits.clone(),
            origin.clone(),
        );

        for (param, kind) in &decl.param_kinds {
            if !decl.params.contains(param) {
                let error = ResolutionError::TypeNotFound {
                    name: param.clone(),
                    span: None,
                };
                self.report(error, decl.span)?;
                continue;
            }
            self.table
                .register_trait_type_param_kind(&decl.name, param, kind.clone())?;
        }

        for method in &decl.methods {
            self.table.register_trait_method(
                method.name.clone(),
                &decl.name,
                method.ty.clone(),
                origin.clone(),
            )?;
            if method.has_default {
                self.table
                    .register_trait_default_method(&decl.name, &method.name)?;
            }
        }
        Ok(())
    }

    fn declare_function(&mut self, decl: &FunctionDecl) -> Result<(), TypecheckError> {
        for constraint in &decl.constraints {
            if self.table.get_trait(&constraint.trait_name).is_none() {
                let error = ResolutionError::TraitNotFound {
                    name: constraint.trait_name.clone(),
                    span: None,
                };
                self.report(error, decl.span)?;
            }
        }

        let origin = self.origin(decl.span);
        self.table
            .define_constant(decl.name.clone(), decl.ty.clone(), origin);
        if !decl.constraints.is_empty() {
            self.table
                .register_func_constraints(decl.name.clone(), decl.constraints.clone());
        }
        Ok(())
    }

    fn declare_extension(&mut self, decl: &ExtensionDecl) -> Result<(), TypecheckError> {
        let is_type = self
            .table
            .find(&decl.type_name)
            .is_some_and(|symbol| symbol.kind == SymbolKind::Type);

        if !is_type {
            let error = ResolutionError::TypeNotFound {
                name: decl.type_name.clone(),
                span: None,
            };
            return self.report(error, decl.span);
        }

        self.table.register_extension_method(
            decl.type_name.clone(),
            decl.method.clone(),
            decl.ty.clone(),
        );
        Ok(())
    }

    fn instance_pass(&mut self, declarations: &[Declaration]) -> Result<(), TypecheckError> {
        let instances: Vec<(usize, &InstanceDecl)> = self
            .active(declarations)
            .filter_map(|(index, declaration)| match declaration {
                Declaration::Instance(decl) => Some((index, decl)),
                _ => None,
            })
            .collect();

        for (index, decl) in instances {
            if self.register_instance(decl)? {
                self.registered.push(index);
            }
        }
        Ok(())
    }

    /// Register one instance, reporting why it was rejected otherwise
    fn register_instance(&mut self, decl: &InstanceDecl) -> Result<bool, TypecheckError> {
        if self.table.get_trait(&decl.trait_name).is_none() {
            let error = ResolutionError::TraitNotFound {
                name: decl.trait_name.clone(),
                span: None,
            };
            self.report(error, decl.span)?;
            return Ok(false);
        }

        let mut valid = true;
        for target in &decl.target_types {
            if let Err(error) = self.table.check_alias_arity(target, decl.span) {
                self.report(error, decl.span)?;
                valid = false;
            }
        }
        for requirement in &decl.requirements {
            if self.table.get_trait(&requirement.trait_name).is_none() {
                let error = ResolutionError::TraitNotFound {
                    name: requirement.trait_name.clone(),
                    span: None,
                };
                self.report(error, decl.span)?;
                valid = false;
            }
        }
        if !valid {
            return Ok(false);
        }

        let dictionary = dictionary_name(&decl.trait_name, &decl.target_types);
        match self.table.register_implementation(
            &decl.trait_name,
            decl.target_types.clone(),
            decl.requirements.clone(),
            dictionary,
        ) {
            Ok(()) => Ok(true),
            Err(error) => {
                self.report(error, decl.span)?;
                Ok(false)
            }
        }
    }

    fn validation_pass(&mut self, declarations: &[Declaration]) -> Result<(), TypecheckError> {
        for index in std::mem::take(&mut self.registered) {
            if let Declaration::Instance(decl) = &declarations[index] {
                self.validate_instance(decl)?;
            }
        }
        Ok(())
    }

    fn validate_instance(&mut self, decl: &InstanceDecl) -> Result<(), TypecheckError> {
        let Some(info) = self.table.get_trait(&decl.trait_name) else {
            return Err(TypecheckError::internal(format!(
                "trait {} disappeared after its instance was registered",
                decl.trait_name
            )));
        };

        let types = format_types(&decl.target_types);
        let missing: Vec<String> = info
            .required_methods()
            .into_iter()
            .filter(|method| !decl.methods.iter().any(|m| m == method))
            .map(str::to_string)
            .collect();
        let unknown: Vec<String> = decl
            .methods
            .iter()
            .filter(|method| !info.has_method(method))
            .cloned()
            .collect();
        let missing_supers: Vec<String> = self
            .table
            .all_super_traits(&decl.trait_name)
            .into_iter()
            .filter(|super_trait| {
                !self.table.is_implementation_entailed(
                    super_trait,
                    &decl.target_types,
                    &decl.requirements,
                )
            })
            .collect();

        if !missing.is_empty() {
            let error = ImplementationError::MissingMethods {
                trait_name: decl.trait_name.clone(),
                types: types.clone(),
                missing,
                span: None,
            };
            self.report(error, decl.span)?;
        }
        if !unknown.is_empty() {
            let error = ImplementationError::UnknownMethods {
                trait_name: decl.trait_name.clone(),
                types: types.clone(),
                unknown,
                span: None,
            };
            self.report(error, decl.span)?;
        }
        for super_trait in missing_supers {
            let error = ImplementationError::MissingSuperTraitImplementation {
                trait_name: decl.trait_name.clone(),
                super_trait,
                types: types.clone(),
                span: None,
            };
            self.report(error, decl.span)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use miette::SourceSpan;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_user_errors_are_collected_with_location() {
        let mut table = SymbolTable::with_config(ResolverConfig::isolated());
        let mut analyzer = DeclarationAnalyzer::new(&mut table, "main");

        let error = ResolutionError::TraitNotFound {
            name: "Hash".to_string(),
            span: None,
        };
        analyzer.report(error, Some(Span::new(3, 7))).unwrap();

        assert_eq!(
            analyzer.errors,
            vec![TypecheckError::Resolution(ResolutionError::TraitNotFound {
                name: "Hash".to_string(),
                span: Some(SourceSpan::from(Span::new(3, 7))),
            })]
        );
    }

    #[test]
    fn test_internal_errors_are_handed_back() {
        let mut table = SymbolTable::with_config(ResolverConfig::isolated());
        let mut analyzer = DeclarationAnalyzer::new(&mut table, "main");

        let internal = analyzer
            .report(TypecheckError::internal("instances before headers"), None)
            .unwrap_err();
        assert!(internal.is_internal());
        assert!(analyzer.errors.is_empty());
    }

    #[test]
    fn test_empty_module_is_accepted() {
        let mut table = SymbolTable::new();
        assert_eq!(analyze_module(&mut table, "empty", &[]), Ok(()));
    }
}
