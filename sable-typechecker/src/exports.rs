//! Module exports
//!
//! The module loader marks names for export while a module is analyzed and
//! collects the resolved symbols once analysis is done. Exports and
//! re-exports always belong to the module's global scope.

use crate::error::ResolutionError;
use crate::scope::SymbolTable;
use crate::symbols::Symbol;
use indexmap::IndexMap;

/// A pending re-export of names from an imported module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reexport {
    pub module: String,
    /// `None` re-exports everything the module exports
    pub names: Option<Vec<String>>,
}

impl SymbolTable {
    pub fn add_export(&mut self, name: impl Into<String>) {
        self.global_scope_mut().exports.insert(name.into());
    }

    pub fn add_reexport(&mut self, module: impl Into<String>, names: Option<Vec<String>>) {
        self.global_scope_mut().reexports.push(Reexport {
            module: module.into(),
            names,
        });
    }

    /// Resolve local exports and pending re-exports, in declaration order
    pub fn get_exports(&self) -> Result<IndexMap<String, Symbol>, ResolutionError> {
        let global_id = self.global_scope_id();
        let Some(global) = self.scope(global_id) else {
            return Err(ResolutionError::StaleScope {
                scope: global_id.to_string(),
            });
        };

        let mut exports = IndexMap::new();

        for name in &global.exports {
            let symbol = global
                .symbol(name)
                .ok_or_else(|| ResolutionError::UnknownExport {
                    name: name.clone(),
                    span: None,
                })?;
            exports.insert(name.clone(), symbol.clone());
        }

        for reexport in &global.reexports {
            let module = self
                .find_in(global_id, &reexport.module)
                .and_then(|_| self.get_module_exports(&reexport.module))
                .ok_or_else(|| ResolutionError::UnknownModule {
                    name: reexport.module.clone(),
                    span: None,
                })?;

            match &reexport.names {
                None => {
                    for (name, symbol) in module {
                        exports.entry(name.clone()).or_insert_with(|| symbol.clone());
                    }
                }
                Some(names) => {
                    for name in names {
                        let symbol =
                            module
                                .get(name)
                                .ok_or_else(|| ResolutionError::UnknownExport {
                                    name: format!("{}.{name}", reexport.module),
                                    span: None,
                                })?;
                        exports.entry(name.clone()).or_insert_with(|| symbol.clone());
                    }
                }
            }
        }

        tracing::debug!(count = exports.len(), "resolved exports");
        Ok(exports)
    }
}
