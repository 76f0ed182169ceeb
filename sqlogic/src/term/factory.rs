use std::collections::HashSet;

use log::trace;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use smallvec::SmallVec;

use super::{Term, TermLabel};
use crate::{
    op::{BoundVariable, Operator},
    utils::Result,
};

/// Validating, interning constructor of terms.
///
/// Every [`crate::services::Services`] owns one factory; the interning table
/// lives as long as the services (one proof) and is dropped with them.
///
/// # A note on concurrency
/// Creation takes an upgradable read lock and only upgrades to a write lock
/// when the term is new. Terms are never removed while the factory lives,
/// so a returned term remains the canonical representative.
#[derive(Default)]
pub struct TermFactory {
    cache: RwLock<HashSet<Term>>,
}

impl TermFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `op` against its arguments and returns the canonical term.
    pub fn create(
        &self,
        op: Operator,
        subs: SmallVec<Term, 2>,
        bound_vars: SmallVec<BoundVariable, 1>,
        labels: SmallVec<TermLabel, 1>,
    ) -> Result<Term> {
        op.validate(&subs, &bound_vars)?;
        Ok(self.intern(Term::new_unchecked(op, subs, bound_vars, labels)))
    }

    /// Term without sub-terms, binders or labels.
    pub fn leaf(&self, op: Operator) -> Result<Term> {
        self.create(op, SmallVec::new(), SmallVec::new(), SmallVec::new())
    }

    fn intern(&self, term: Term) -> Term {
        let cache = self.cache.upgradable_read();
        if let Some(existing) = cache.get(&term) {
            return existing.clone();
        }
        let mut cache = RwLockUpgradableReadGuard::upgrade(cache);
        trace!("Interned term with hash 0x{:016x}.", term.structural_hash());
        cache.insert(term.clone());
        term
    }

    /// Same term with `labels` replacing its labels.
    pub fn relabel(&self, t: &Term, labels: SmallVec<TermLabel, 1>) -> Result<Term> {
        if t.labels() == labels.as_slice() {
            return Ok(t.clone());
        }
        self.create(
            t.op().clone(),
            t.subs().iter().cloned().collect(),
            t.bound_vars().iter().cloned().collect(),
            labels,
        )
    }

    /// Number of distinct terms created through this factory.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}
