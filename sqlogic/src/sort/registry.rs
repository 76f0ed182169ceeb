use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use log::{debug, info};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use smallvec::SmallVec;

use super::{ParametricSortDecl, Sort, SortKind, Variance, instance_name};
use crate::{
    name::Name,
    utils::{Error, Result},
};

/// Declaration of an ordinary sort, handed to [`SortRegistry::declare`].
#[derive(Debug, Clone, Default)]
pub struct SortDeclaration {
    pub name: String,
    pub extends: Vec<String>,
    pub is_abstract: bool,
    pub documentation: Option<String>,
    pub origin: Option<String>,
}

impl SortDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn extending<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extends = parents.into_iter().map(Into::into).collect();
        self
    }

    pub fn set_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    pub fn documented(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// Registry of every sort known to an environment.
///
/// Declared sorts must name already registered parents, which keeps the
/// hierarchy acyclic by construction. Parametric instances are interned: the
/// registry hands out a single [`Sort`] per `(declaration, arguments)` pair,
/// creating it on first request.
///
/// # A note on concurrency
/// The registry is shared between all proofs of an environment. Lookups take
/// read locks; instance creation takes an upgradable read on the instance
/// table and only upgrades when the instance is missing. Locks are always
/// acquired in the order `sorts`, `instances`.
pub struct SortRegistry {
    sorts: RwLock<BTreeMap<Name, Sort>>,
    parametric: RwLock<BTreeMap<Name, Arc<ParametricSortDecl>>>,
    instances: RwLock<HashMap<(Name, SmallVec<Sort, 2>), Sort>>,
}

impl Default for SortRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SortRegistry {
    pub fn new() -> Self {
        let mut sorts = BTreeMap::new();
        for s in [Sort::any(), Sort::formula(), Sort::update()] {
            sorts.insert(s.name().clone(), s);
        }
        Self {
            sorts: RwLock::new(sorts),
            parametric: RwLock::new(BTreeMap::new()),
            instances: RwLock::new(HashMap::new()),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Sort> {
        self.sorts.read().get(name).cloned()
    }

    pub fn get(&self, name: &str) -> Result<Sort> {
        self.lookup(name).ok_or_else(|| Error::UnknownSort {
            name: Name::new(name),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sorts.read().contains_key(name)
    }

    pub fn parametric_decl(&self, name: &str) -> Option<Arc<ParametricSortDecl>> {
        self.parametric.read().get(name).cloned()
    }

    /// Registers a declared sort. Its parents must already be known.
    pub fn declare(&self, decl: SortDeclaration) -> Result<Sort> {
        let name = Name::new(&decl.name);
        let parents = decl
            .extends
            .iter()
            .map(|p| self.get(p))
            .collect::<Result<Vec<_>>>()?;
        let sort = Sort::from_parts(
            name,
            SortKind::Declared,
            parents,
            decl.is_abstract,
            decl.documentation,
            decl.origin,
        );
        self.insert(sort)
    }

    /// Registers a generic sort.
    pub fn declare_generic(&self, name: &str, extends: &[&str], one_of: &[&str]) -> Result<Sort> {
        let extends = extends
            .iter()
            .map(|p| self.get(p))
            .collect::<Result<Vec<_>>>()?;
        let one_of = one_of
            .iter()
            .map(|p| self.get(p))
            .collect::<Result<Vec<_>>>()?;
        self.insert(Sort::new_generic(name, &extends, &one_of))
    }

    /// Inserts an already constructed sort, e.g. a rule-local generic sort.
    pub fn insert(&self, sort: Sort) -> Result<Sort> {
        let is_parametric = self.parametric.read().contains_key(sort.name());
        let mut sorts = self.sorts.write();
        if is_parametric || sorts.contains_key(sort.name()) {
            return Err(Error::DuplicateSort {
                name: sort.name().clone(),
            });
        }
        debug!("Registered sort `{}` extending {:?}.", sort.name(), sort.extends());
        sorts.insert(sort.name().clone(), sort.clone());
        Ok(sort)
    }

    /// Registers a parametric sort declaration. Parameters are fresh generic sorts.
    pub fn declare_parametric(
        &self,
        name: &str,
        params: &[(&str, Variance)],
        extends: &[&str],
        documentation: Option<String>,
    ) -> Result<Arc<ParametricSortDecl>> {
        let params: Vec<(Sort, Variance)> = params
            .iter()
            .map(|(p, v)| (Sort::new_generic(*p, &[], &[]), *v))
            .collect();
        let extends = extends
            .iter()
            .map(|e| {
                params
                    .iter()
                    .find(|(p, _)| p.name().as_str() == *e)
                    .map(|(p, _)| p.clone())
                    .map_or_else(|| self.get(e), Ok)
            })
            .collect::<Result<Vec<_>>>()?;
        let decl = Arc::new(ParametricSortDecl {
            name: Name::new(name),
            params,
            extends,
            documentation,
        });

        let is_sort = self.contains(name);
        let mut parametric = self.parametric.write();
        if is_sort || parametric.contains_key(name) {
            return Err(Error::DuplicateSort {
                name: Name::new(name),
            });
        }
        debug!("Registered parametric sort `{}` with {} parameters.", name, decl.params.len());
        parametric.insert(decl.name.clone(), decl.clone());
        Ok(decl)
    }

    /// Canonical instance of a parametric sort.
    ///
    /// Equal `(decl, args)` requests always return the same [`Sort`] object.
    pub fn instantiate_parametric(
        &self,
        decl_name: &Name,
        args: impl IntoIterator<Item = Sort>,
    ) -> Result<Sort> {
        let decl = self
            .parametric_decl(decl_name)
            .ok_or_else(|| Error::UnknownSort {
                name: decl_name.clone(),
            })?;
        let args: SmallVec<Sort, 2> = args.into_iter().collect();
        if args.len() != decl.params.len() {
            return Err(Error::ParametricArity {
                decl: decl.name.clone(),
                expected: decl.params.len(),
                found: args.len(),
            });
        }

        let key = (decl.name.clone(), args);
        if let Some(existing) = self.instances.read().get(&key) {
            return Ok(existing.clone());
        }

        // Parents are computed before taking the write lock: instantiating
        // them may intern further instances.
        let args = key.1.clone();
        let substitution = |s: &Sort| {
            decl.params
                .iter()
                .position(|(p, _)| p == s)
                .map(|i| args[i].clone())
        };
        let mut parents = Vec::with_capacity(decl.extends.len());
        for e in &decl.extends {
            parents.push(e.substitute(&substitution, self)?);
        }
        let sort = Sort::from_parts(
            instance_name(&decl.name, &args),
            SortKind::Instance {
                decl: decl.clone(),
                args: args.clone(),
            },
            parents,
            false,
            decl.documentation.clone(),
            None,
        );

        let instances = self.instances.upgradable_read();
        if let Some(existing) = instances.get(&key) {
            // Another writer raced us.
            return Ok(existing.clone());
        }
        let mut instances = RwLockUpgradableReadGuard::upgrade(instances);
        info!("New parametric sort instance `{}`.", sort.name());
        instances.insert(key, sort.clone());
        Ok(sort)
    }

    /// All non-generic sorts in name order, including parametric instances
    /// created so far but excluding `Formula` and `Update`.
    ///
    /// This is the search space for generic sort instantiation.
    pub fn instantiable_sorts(&self) -> Vec<Sort> {
        let sorts = self.sorts.read();
        let instances = self.instances.read();
        let mut out: Vec<Sort> = sorts
            .values()
            .filter(|s| !s.is_generic() && !s.is_formula() && !s.is_update())
            .cloned()
            .chain(instances.values().filter(|s| !s.contains_generic()).cloned())
            .collect();
        out.sort();
        out
    }

    /// Every registered sort in name order.
    pub fn all(&self) -> Vec<Sort> {
        self.sorts.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SortRegistry {
        let reg = SortRegistry::new();
        reg.declare(SortDeclaration::new("num")).unwrap();
        reg.declare(SortDeclaration::new("int").extending(["num"]))
            .unwrap();
        reg.declare_parametric("Seq", &[("E", Variance::Covariant)], &[], None)
            .unwrap();
        reg.declare_parametric("Cell", &[("E", Variance::Invariant)], &[], None)
            .unwrap();
        reg
    }

    #[test]
    fn parents_must_exist() {
        let reg = SortRegistry::new();
        let err = reg
            .declare(SortDeclaration::new("int").extending(["num"]))
            .unwrap_err();
        assert!(err.is_unknown_sort());
    }

    #[test]
    fn duplicate_declaration_is_rejected() {
        let reg = registry();
        assert!(reg.declare(SortDeclaration::new("int")).unwrap_err().is_duplicate_sort());
    }

    #[test]
    fn instances_are_canonical() {
        let reg = registry();
        let int = reg.get("int").unwrap();
        let a = reg.instantiate_parametric(&Name::new("Seq"), [int.clone()]).unwrap();
        let b = reg.instantiate_parametric(&Name::new("Seq"), [int]).unwrap();
        assert_eq!(a.name().as_str(), "Seq<[int]>");
        assert!(Arc::ptr_eq(&a.0, &b.0));
        assert_eq!(a, b);
    }

    #[test]
    fn variance_drives_instance_subsorting() {
        let reg = registry();
        let int = reg.get("int").unwrap();
        let num = reg.get("num").unwrap();
        let seq = Name::new("Seq");
        let cell = Name::new("Cell");
        let seq_int = reg.instantiate_parametric(&seq, [int.clone()]).unwrap();
        let seq_num = reg.instantiate_parametric(&seq, [num.clone()]).unwrap();
        let cell_int = reg.instantiate_parametric(&cell, [int]).unwrap();
        let cell_num = reg.instantiate_parametric(&cell, [num]).unwrap();
        assert!(seq_int.extends_trans(&seq_num));
        assert!(!seq_num.extends_trans(&seq_int));
        assert!(!cell_int.extends_trans(&cell_num));
        assert!(cell_int.extends_trans(&Sort::any()));
    }
}
