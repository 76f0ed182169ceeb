//! Symbol tables.
//!
//! A [`Namespace`] maps names to declarations. It is backed by a persistent
//! map: copying a namespace set for a new proof is O(1) and later additions
//! on either copy stay invisible to the other.
use std::sync::Arc;

use im::OrdMap;

use crate::{
    name::Name,
    op::{Function, ParametricFunctionDecl, ProgramVariable, SchemaVariable},
    utils::{Error, Result},
};

#[derive(Debug, Clone)]
pub struct Namespace<T: Clone> {
    kind: &'static str,
    entries: OrdMap<Name, T>,
}

impl<T: Clone> Namespace<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: OrdMap::new(),
        }
    }

    /// Adds `value`, failing if `name` is taken.
    pub fn add(&mut self, name: Name, value: T) -> Result<()> {
        if self.entries.contains_key(&name) {
            return Err(Error::DuplicateSymbol {
                name,
                namespace: self.kind,
            });
        }
        self.entries.insert(name, value);
        Ok(())
    }

    /// Adds or replaces `value`.
    pub fn add_or_replace(&mut self, name: Name, value: T) -> Option<T> {
        self.entries.insert(name, value)
    }

    pub fn lookup(&self, name: &str) -> Option<&T> {
        self.entries.get(name)
    }

    pub fn get(&self, name: &str) -> Result<&T> {
        self.lookup(name).ok_or_else(|| Error::UnknownSymbol {
            name: Name::new(name),
            namespace: self.kind,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &T)> {
        self.entries.iter()
    }

    pub fn remove(&mut self, name: &str) -> Option<T> {
        self.entries.remove(name)
    }
}

/// The namespaces a proof resolves symbols against.
#[derive(Debug, Clone)]
pub struct NamespaceSet {
    pub functions: Namespace<Arc<Function>>,
    pub parametric_functions: Namespace<Arc<ParametricFunctionDecl>>,
    pub program_variables: Namespace<ProgramVariable>,
    pub schema_variables: Namespace<Arc<SchemaVariable>>,
}

impl Default for NamespaceSet {
    fn default() -> Self {
        Self {
            functions: Namespace::new("function"),
            parametric_functions: Namespace::new("parametric function"),
            program_variables: Namespace::new("program variable"),
            schema_variables: Namespace::new("schema variable"),
        }
    }
}

impl NamespaceSet {
    /// Whether any term-level symbol is called `name`.
    pub fn is_taken(&self, name: &str) -> bool {
        self.functions.contains(name)
            || self.parametric_functions.contains(name)
            || self.program_variables.contains(name)
    }
}
