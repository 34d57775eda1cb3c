//! Dependency resolution for derived parameters
//!
//! A resolution pass has two phases. [`Resolver::assign_deps`] parses every
//! expression (once, the tree is cached on the parameter) and records which
//! known parameters it refers to. [`Resolver::update_paramval`] then evaluates
//! a parameter after resolving its dependencies depth first, so the order of
//! the [`ParameterSet`] never matters.
//!
//! Values flow through a [`SymbolTable`] that lives as long as the resolver.
//! A session creates a new resolver every time a model is bound.

use std::collections::HashSet;

use tracing::debug;

use crate::parameters::{Parameter, ParameterError, ParameterSet, SymbolTable};

/// Resolves expression parameters against a shared symbol table
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    symtable: SymbolTable,
}

impl Resolver {
    /// Create a resolver with a fresh symbol table holding `pi` and `e`
    pub fn new() -> Self {
        Self {
            symtable: SymbolTable::new(),
        }
    }

    /// Values registered so far
    pub fn symbols(&self) -> &SymbolTable {
        &self.symtable
    }

    /// Record the dependencies of every expression parameter in `params`.
    ///
    /// Only names present in `known` count as dependencies; anything else an
    /// expression mentions is looked up in the symbol table at evaluation
    /// time. Each expression parameter's current value is registered, and an
    /// empty parameter name is replaced by its key.
    pub fn assign_deps(
        &mut self,
        params: &mut ParameterSet,
        known: &ParameterSet,
    ) -> Result<(), ParameterError> {
        for (key, param) in params.iter_mut() {
            if param.name().is_empty() {
                param.set_name(key);
            }

            let names = match param.ast()? {
                Some(ast) => ast.variables(),
                None => continue,
            };

            let deps: Vec<String> = names.into_iter().filter(|n| known.contains(n)).collect();
            debug!(parameter = %key, ?deps, "assigned dependencies");

            param.set_deps(deps);
            self.symtable.set(key, param.value());
        }

        Ok(())
    }

    /// Bring `name` up to date, resolving its dependencies first.
    ///
    /// Free parameters keep their value. In both cases the value ends up in
    /// the symbol table.
    pub fn update_paramval(
        &mut self,
        params: &mut ParameterSet,
        name: &str,
    ) -> Result<(), ParameterError> {
        let mut visiting = Vec::new();
        let mut done = HashSet::new();
        self.resolve_one(params, name, &mut visiting, &mut done)
    }

    /// Resolve every parameter whose value is still undetermined
    pub fn resolve_unset(
        &mut self,
        params: &mut ParameterSet,
        known: &ParameterSet,
    ) -> Result<(), ParameterError> {
        self.assign_deps(params, known)?;

        let unset: Vec<String> = params
            .iter()
            .filter(|(_, p)| p.value().is_none())
            .map(|(name, _)| name.clone())
            .collect();

        self.resolve_names(params, &unset)
    }

    /// Resolve every parameter. Used after free values changed.
    pub fn resolve_all(
        &mut self,
        params: &mut ParameterSet,
        known: &ParameterSet,
    ) -> Result<(), ParameterError> {
        self.assign_deps(params, known)?;

        let names = params.names();
        self.resolve_names(params, &names)
    }

    fn resolve_names(
        &mut self,
        params: &mut ParameterSet,
        names: &[String],
    ) -> Result<(), ParameterError> {
        let mut visiting = Vec::new();
        let mut done = HashSet::new();
        for name in names {
            self.resolve_one(params, name, &mut visiting, &mut done)?;
        }
        debug!(count = names.len(), "resolution pass finished");
        Ok(())
    }

    fn resolve_one(
        &mut self,
        params: &mut ParameterSet,
        name: &str,
        visiting: &mut Vec<String>,
        done: &mut HashSet<String>,
    ) -> Result<(), ParameterError> {
        if done.contains(name) {
            return Ok(());
        }

        if let Some(start) = visiting.iter().position(|n| n == name) {
            let mut chain = visiting[start..].to_vec();
            chain.push(name.to_string());
            return Err(ParameterError::CircularDependency { chain });
        }

        let param = lookup(params, name)?;
        if let Some(expr) = param.expr().map(str::to_string) {
            param.ast()?;
            let deps = param.deps().to_vec();

            visiting.push(name.to_string());
            for dep in &deps {
                self.resolve_one(params, dep, visiting, done)?;
            }
            visiting.pop();

            let param = lookup(params, name)?;
            if let Some(ast) = param.ast()? {
                let value = ast.evaluate(&self.symtable).map_err(|source| {
                    ParameterError::ExpressionEvaluation {
                        name: name.to_string(),
                        expr: expr.clone(),
                        source,
                    }
                })?;
                param.set_value_clamped(value);
            }
        }

        let value = lookup(params, name)?.value();
        self.symtable.set(name, value);
        done.insert(name.to_string());
        Ok(())
    }
}

fn lookup<'a>(params: &'a mut ParameterSet, name: &str) -> Result<&'a mut Parameter, ParameterError> {
    params
        .get_mut(name)
        .ok_or_else(|| ParameterError::ParameterNotFound {
            name: name.to_string(),
        })
}
