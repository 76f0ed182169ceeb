//! Sequents and positions within them.
//!
//! Role
//! - [`Semisequent`]: an ordered, duplicate-free list of formulas backed by a
//!   persistent vector, so that every proof node can keep its own snapshot
//!   while sharing structure with its parent.
//! - [`Sequent`]: antecedent `==>` succedent.
//! - Every mutation returns a change record ([`SemisequentChangeInfo`],
//!   [`SequentChangeInfo`]) describing added, removed, modified and rejected
//!   formulas. Records of consecutive mutations merge with `combine`.
//! - [`PosInOccurrence`]: a sub-term position inside one formula of a sequent.
//!
//! Performance
//! - Insertion and removal are O(log n) on the persistent vector; the
//!   redundancy check on insertion is linear in the semisequent length.
use im::Vector;
use strum::{Display, EnumIs, EnumIter};

use crate::{
    term::{PosInTerm, Term},
    utils::{Error, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIs, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Side {
    Antecedent,
    Succedent,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Antecedent => Side::Succedent,
            Side::Succedent => Side::Antecedent,
        }
    }
}

/// A top-level formula of a sequent.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SequentFormula(Term);

impl SequentFormula {
    pub fn new(formula: Term) -> Result<Self> {
        if !formula.is_formula() {
            return Err(Error::IllSortedArgument {
                op: "==>".into(),
                index: 0,
                expected: crate::sort::Sort::formula().name().clone(),
                found: formula.sort().name().clone(),
            });
        }
        Ok(Self(formula))
    }

    pub fn formula(&self) -> &Term {
        &self.0
    }

    pub fn into_formula(self) -> Term {
        self.0
    }
}

impl std::fmt::Debug for SequentFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `old` was replaced by `new` in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaChange {
    pub old: SequentFormula,
    pub new: SequentFormula,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Semisequent(Vector<SequentFormula>);

/// Outcome of one or several semisequent mutations.
#[derive(Debug, Clone)]
pub struct SemisequentChangeInfo {
    pub added: Vec<SequentFormula>,
    pub removed: Vec<SequentFormula>,
    pub modified: Vec<FormulaChange>,
    /// Formulas not inserted because an equal formula was already present.
    pub rejected: Vec<SequentFormula>,
    pub result: Semisequent,
}

impl SemisequentChangeInfo {
    fn unchanged(result: Semisequent) -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            modified: Vec::new(),
            rejected: Vec::new(),
            result,
        }
    }

    pub fn has_changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.modified.is_empty()
    }

    /// Merges `later` (a mutation of `self.result`) into this record.
    ///
    /// A formula added and then removed disappears from both lists; a
    /// formula added and then modified is reported as added in its final form.
    pub fn combine(mut self, later: SemisequentChangeInfo) -> SemisequentChangeInfo {
        for f in later.removed {
            if let Some(i) = self.added.iter().position(|a| *a == f) {
                self.added.remove(i);
            } else if let Some(i) = self.modified.iter().position(|m| m.new == f) {
                let change = self.modified.remove(i);
                self.removed.push(change.old);
            } else {
                self.removed.push(f);
            }
        }
        for change in later.modified {
            if let Some(a) = self.added.iter_mut().find(|a| **a == change.old) {
                *a = change.new;
            } else if let Some(m) = self.modified.iter_mut().find(|m| m.new == change.old) {
                m.new = change.new;
            } else {
                self.modified.push(change);
            }
        }
        self.added.extend(later.added);
        self.rejected.extend(later.rejected);
        self.result = later.result;
        self
    }
}

impl Semisequent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SequentFormula> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SequentFormula> {
        self.0.iter()
    }

    pub fn index_of(&self, f: &SequentFormula) -> Option<usize> {
        self.0.iter().position(|g| g == f)
    }

    /// Whether a formula equal to `f` modulo bound-variable renaming occurs.
    pub fn contains_equivalent(&self, f: &SequentFormula) -> bool {
        self.0
            .iter()
            .any(|g| g == f || g.formula().equals_mod_renaming(f.formula()))
    }

    /// Inserts `f` at `index` (clamped to the length) unless it is redundant.
    pub fn insert(&self, index: usize, f: SequentFormula) -> SemisequentChangeInfo {
        if self.contains_equivalent(&f) {
            let mut info = SemisequentChangeInfo::unchanged(self.clone());
            info.rejected.push(f);
            return info;
        }
        let mut v = self.0.clone();
        v.insert(index.min(v.len()), f.clone());
        let mut info = SemisequentChangeInfo::unchanged(Semisequent(v));
        info.added.push(f);
        info
    }

    pub fn insert_first(&self, f: SequentFormula) -> SemisequentChangeInfo {
        self.insert(0, f)
    }

    pub fn insert_last(&self, f: SequentFormula) -> SemisequentChangeInfo {
        self.insert(self.len(), f)
    }

    /// Inserts `fs` in order starting at `index`.
    pub fn insert_all(&self, index: usize, fs: impl IntoIterator<Item = SequentFormula>) -> SemisequentChangeInfo {
        let mut info = SemisequentChangeInfo::unchanged(self.clone());
        let mut at = index;
        for f in fs {
            let step = info.result.insert(at, f);
            if !step.added.is_empty() {
                at += 1;
            }
            info = info.combine(step);
        }
        info
    }

    pub fn remove(&self, index: usize) -> SemisequentChangeInfo {
        if index >= self.len() {
            return SemisequentChangeInfo::unchanged(self.clone());
        }
        let mut v = self.0.clone();
        let f = v.remove(index);
        let mut info = SemisequentChangeInfo::unchanged(Semisequent(v));
        info.removed.push(f);
        info
    }

    /// Replaces the formula at `index`. When the replacement duplicates
    /// another formula, the old one is removed and the new one rejected.
    pub fn replace(&self, index: usize, f: SequentFormula) -> SemisequentChangeInfo {
        let Some(old) = self.0.get(index).cloned() else {
            return SemisequentChangeInfo::unchanged(self.clone());
        };
        if old == f {
            return SemisequentChangeInfo::unchanged(self.clone());
        }
        let duplicate = self
            .0
            .iter()
            .enumerate()
            .any(|(i, g)| i != index && (*g == f || g.formula().equals_mod_renaming(f.formula())));
        if duplicate {
            let mut info = self.remove(index);
            info.rejected.push(f);
            return info;
        }
        let mut v = self.0.clone();
        v.set(index, f.clone());
        let mut info = SemisequentChangeInfo::unchanged(Semisequent(v));
        info.modified.push(FormulaChange { old, new: f });
        info
    }
}

impl FromIterator<SequentFormula> for Semisequent {
    fn from_iter<I: IntoIterator<Item = SequentFormula>>(iter: I) -> Self {
        let mut s = Semisequent::new();
        for f in iter {
            s = s.insert_last(f).result;
        }
        s
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequent {
    antecedent: Semisequent,
    succedent: Semisequent,
}

/// Outcome of sequent mutations, per side.
#[derive(Debug, Clone)]
pub struct SequentChangeInfo {
    pub antecedent: Option<SemisequentChangeInfo>,
    pub succedent: Option<SemisequentChangeInfo>,
    pub original: Sequent,
    pub result: Sequent,
}

impl SequentChangeInfo {
    fn single(original: &Sequent, side: Side, info: SemisequentChangeInfo) -> Self {
        let mut result = original.clone();
        *result.side_mut(side) = info.result.clone();
        let (antecedent, succedent) = match side {
            Side::Antecedent => (Some(info), None),
            Side::Succedent => (None, Some(info)),
        };
        Self {
            antecedent,
            succedent,
            original: original.clone(),
            result,
        }
    }

    pub fn unchanged(sequent: &Sequent) -> Self {
        Self {
            antecedent: None,
            succedent: None,
            original: sequent.clone(),
            result: sequent.clone(),
        }
    }

    pub fn side(&self, side: Side) -> Option<&SemisequentChangeInfo> {
        match side {
            Side::Antecedent => self.antecedent.as_ref(),
            Side::Succedent => self.succedent.as_ref(),
        }
    }

    pub fn has_changed(&self) -> bool {
        self.antecedent.as_ref().is_some_and(|i| i.has_changed())
            || self.succedent.as_ref().is_some_and(|i| i.has_changed())
    }

    pub fn has_changed_side(&self, side: Side) -> bool {
        self.side(side).is_some_and(|i| i.has_changed())
    }

    pub fn added(&self, side: Side) -> &[SequentFormula] {
        self.side(side).map_or(&[], |i| &i.added)
    }

    pub fn removed(&self, side: Side) -> &[SequentFormula] {
        self.side(side).map_or(&[], |i| &i.removed)
    }

    pub fn modified(&self, side: Side) -> &[FormulaChange] {
        self.side(side).map_or(&[], |i| &i.modified)
    }

    pub fn rejected(&self, side: Side) -> &[SequentFormula] {
        self.side(side).map_or(&[], |i| &i.rejected)
    }

    /// Merges `later`, a change of `self.result`, into this record.
    pub fn combine(self, later: SequentChangeInfo) -> SequentChangeInfo {
        fn merge(
            a: Option<SemisequentChangeInfo>,
            b: Option<SemisequentChangeInfo>,
        ) -> Option<SemisequentChangeInfo> {
            match (a, b) {
                (Some(a), Some(b)) => Some(a.combine(b)),
                (a, None) => a,
                (None, b) => b,
            }
        }
        SequentChangeInfo {
            antecedent: merge(self.antecedent, later.antecedent),
            succedent: merge(self.succedent, later.succedent),
            original: self.original,
            result: later.result,
        }
    }
}

impl Sequent {
    pub fn new(antecedent: Semisequent, succedent: Semisequent) -> Self {
        Self {
            antecedent,
            succedent,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn antecedent(&self) -> &Semisequent {
        &self.antecedent
    }

    pub fn succedent(&self) -> &Semisequent {
        &self.succedent
    }

    pub fn side(&self, side: Side) -> &Semisequent {
        match side {
            Side::Antecedent => &self.antecedent,
            Side::Succedent => &self.succedent,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut Semisequent {
        match side {
            Side::Antecedent => &mut self.antecedent,
            Side::Succedent => &mut self.succedent,
        }
    }

    pub fn len(&self) -> usize {
        self.antecedent.len() + self.succedent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All formulas, antecedent first, with their side and index.
    pub fn iter(&self) -> impl Iterator<Item = (Side, usize, &SequentFormula)> {
        let ante = self
            .antecedent
            .iter()
            .enumerate()
            .map(|(i, f)| (Side::Antecedent, i, f));
        let succ = self
            .succedent
            .iter()
            .enumerate()
            .map(|(i, f)| (Side::Succedent, i, f));
        ante.chain(succ)
    }

    pub fn formula(&self, side: Side, index: usize) -> Option<&SequentFormula> {
        self.side(side).get(index)
    }

    pub fn insert(&self, side: Side, index: usize, f: SequentFormula) -> SequentChangeInfo {
        SequentChangeInfo::single(self, side, self.side(side).insert(index, f))
    }

    pub fn insert_first(&self, side: Side, f: SequentFormula) -> SequentChangeInfo {
        self.insert(side, 0, f)
    }

    pub fn insert_last(&self, side: Side, f: SequentFormula) -> SequentChangeInfo {
        self.insert(side, self.side(side).len(), f)
    }

    pub fn insert_all(
        &self,
        side: Side,
        index: usize,
        fs: impl IntoIterator<Item = SequentFormula>,
    ) -> SequentChangeInfo {
        SequentChangeInfo::single(self, side, self.side(side).insert_all(index, fs))
    }

    pub fn remove(&self, side: Side, index: usize) -> SequentChangeInfo {
        SequentChangeInfo::single(self, side, self.side(side).remove(index))
    }

    pub fn replace(&self, side: Side, index: usize, f: SequentFormula) -> SequentChangeInfo {
        SequentChangeInfo::single(self, side, self.side(side).replace(index, f))
    }

    /// Index of `f` on `side`, preferring `hint` when it still points at `f`.
    pub fn locate(&self, side: Side, f: &SequentFormula, hint: usize) -> Option<usize> {
        let semi = self.side(side);
        match semi.get(hint) {
            Some(g) if g == f => Some(hint),
            _ => semi.index_of(f),
        }
    }
}

/// A sub-term occurrence in a sequent formula.
///
/// The formula is stored with the position: an occurrence stays meaningful
/// after unrelated formulas are inserted before it, and [`Self::relocate`]
/// finds it again in a changed sequent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PosInOccurrence {
    side: Side,
    index: usize,
    formula: SequentFormula,
    pos: PosInTerm,
}

impl PosInOccurrence {
    pub fn new(side: Side, index: usize, formula: SequentFormula, pos: PosInTerm) -> Self {
        Self {
            side,
            index,
            formula,
            pos,
        }
    }

    pub fn top_level(side: Side, index: usize, formula: SequentFormula) -> Self {
        Self::new(side, index, formula, PosInTerm::top())
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_antecedent(&self) -> bool {
        self.side.is_antecedent()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn formula(&self) -> &SequentFormula {
        &self.formula
    }

    pub fn pos_in_term(&self) -> &PosInTerm {
        &self.pos
    }

    pub fn is_top_level(&self) -> bool {
        self.pos.is_top()
    }

    /// The term at this position.
    pub fn subterm(&self) -> Result<&Term> {
        self.formula
            .formula()
            .subterm(self.pos.indices())
            .ok_or_else(|| Error::InvalidPosition {
                path: self.pos.to_string(),
                term: self.formula.formula().to_string(),
            })
    }

    pub fn down(&self, i: usize) -> Self {
        Self {
            pos: self.pos.down(i),
            ..self.clone()
        }
    }

    pub fn up(&self) -> Self {
        Self {
            pos: self.pos.up(),
            ..self.clone()
        }
    }

    pub fn top(&self) -> Self {
        Self {
            pos: PosInTerm::top(),
            ..self.clone()
        }
    }

    /// Same occurrence in `sequent`, if its formula is still present.
    pub fn relocate(&self, sequent: &Sequent) -> Option<Self> {
        let index = sequent.locate(self.side, &self.formula, self.index)?;
        Some(Self {
            index,
            ..self.clone()
        })
    }

    /// Whether the occurrence sits in a positive (succedent-like) position,
    /// or `None` below an equivalence or a conditional's condition.
    pub fn polarity(&self) -> Option<bool> {
        use crate::op::{Junctor, Operator};
        let mut positive = self.side.is_succedent();
        let mut t = self.formula.formula();
        for &i in self.pos.indices() {
            match t.op() {
                Operator::Junctor(Junctor::Not) => positive = !positive,
                Operator::Junctor(Junctor::Imp) if i == 0 => positive = !positive,
                Operator::Junctor(Junctor::Equiv) => return None,
                Operator::IfThenElse if i == 0 => return None,
                _ => {}
            }
            t = t.sub(i as usize);
        }
        Some(positive)
    }
}
