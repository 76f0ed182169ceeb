//! Schema variable instantiations.
//!
//! Role
//! - [`SVInstantiations`] maps schema variables to their values. It is
//!   persistent: [`SVInstantiations::add`] returns a new map and leaves the
//!   receiver untouched, so a failed matching branch simply drops its copy.
//! - Adding checks the value against the variable's kind, sort and rigidity
//!   and rejects conflicting values. A value equal (modulo renaming of bound
//!   variables) to the existing one is accepted.
//! - Sort requirements that involve generic sorts are recorded as
//!   [`GenericSortCondition`]s and resolved once matching is complete.
//! - The update context holds the updates in front of the find position for
//!   rules restricted to the same update level.
//!
//! Performance
//! - Backed by `im` structures: cloning is O(1), insertion O(log n).
use std::{fmt, sync::Arc};

use im::{OrdMap, Vector};
use smallvec::SmallVec;
use strum::EnumIs;

use crate::{
    name::Name,
    op::{ModalityKind, SchemaVariable, SvKind},
    program::ProgramElement,
    sort::SortRegistry,
    term::{Term, TermLabel},
    utils::{Error, Result},
};

pub mod generic;

pub use generic::{GenericSortCondition, GenericSortInstantiations};

/// Value a schema variable is instantiated with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum InstantiationValue {
    Term(Term),
    Program(ProgramElement),
    ProgramList(Vec<ProgramElement>),
    Labels(SmallVec<TermLabel, 1>),
    Modality(ModalityKind),
}

impl InstantiationValue {
    pub fn as_term(&self) -> Option<&Term> {
        match self {
            InstantiationValue::Term(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_program(&self) -> Option<&ProgramElement> {
        match self {
            InstantiationValue::Program(p) => Some(p),
            _ => None,
        }
    }

    fn same_as(&self, other: &InstantiationValue) -> bool {
        match (self, other) {
            (InstantiationValue::Term(a), InstantiationValue::Term(b)) => {
                a == b || a.equals_mod_renaming(b)
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for InstantiationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstantiationValue::Term(t) => write!(f, "{t}"),
            InstantiationValue::Program(p) => write!(f, "{p}"),
            InstantiationValue::ProgramList(ps) => {
                for (i, p) in ps.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{p}")?;
                }
                Ok(())
            }
            InstantiationValue::Labels(ls) => {
                write!(f, "<<")?;
                for (i, l) in ls.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{l}")?;
                }
                write!(f, ">>")
            }
            InstantiationValue::Modality(k) => write!(f, "{k}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantiationEntry {
    pub sv: Arc<SchemaVariable>,
    pub value: InstantiationValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SVInstantiations {
    map: OrdMap<Name, InstantiationEntry>,
    update_context: Vector<Term>,
    generic_conditions: Vector<GenericSortCondition>,
}

impl SVInstantiations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, sv: &str) -> Option<&InstantiationValue> {
        self.map.get(sv).map(|e| &e.value)
    }

    pub fn term(&self, sv: &str) -> Option<&Term> {
        self.get(sv).and_then(InstantiationValue::as_term)
    }

    pub fn is_instantiated(&self, sv: &SchemaVariable) -> bool {
        self.map.contains_key(sv.name())
    }

    /// Entries in schema variable name order.
    pub fn iter(&self) -> impl Iterator<Item = &InstantiationEntry> {
        self.map.values()
    }

    pub fn update_context(&self) -> &Vector<Term> {
        &self.update_context
    }

    pub fn with_update_context(&self, updates: impl IntoIterator<Item = Term>) -> Self {
        Self {
            update_context: updates.into_iter().collect(),
            ..self.clone()
        }
    }

    pub fn generic_conditions(&self) -> &Vector<GenericSortCondition> {
        &self.generic_conditions
    }

    /// Records an additional generic sort condition, failing if the
    /// conditions become unsatisfiable.
    pub fn add_generic_condition(
        &self,
        cond: GenericSortCondition,
        registry: &SortRegistry,
    ) -> Result<Self> {
        if self.generic_conditions.contains(&cond) {
            return Ok(self.clone());
        }
        let mut conds = self.generic_conditions.clone();
        conds.push_back(cond);
        if !GenericSortInstantiations::satisfiable(conds.iter(), registry) {
            let generic = conds.back().map(|c| c.generic().name().clone());
            return Err(Error::UnresolvableGenericSort {
                sort: generic.unwrap_or_else(|| Name::new("?")),
            });
        }
        Ok(Self {
            generic_conditions: conds,
            ..self.clone()
        })
    }

    /// Resolves the generic sorts mentioned by the recorded conditions.
    pub fn generic_instantiations(&self, registry: &SortRegistry) -> Result<GenericSortInstantiations> {
        GenericSortInstantiations::resolve(self.generic_conditions.iter(), registry)
    }

    /// Adds `sv := value` after checking it against the declaration of `sv`.
    pub fn add(
        &self,
        sv: &Arc<SchemaVariable>,
        value: InstantiationValue,
        registry: &SortRegistry,
    ) -> Result<Self> {
        if let Some(existing) = self.map.get(sv.name()) {
            return if existing.value.same_as(&value) {
                Ok(self.clone())
            } else {
                Err(Error::ConflictingInstantiation {
                    sv: sv.name().clone(),
                    existing: existing.value.to_string(),
                    value: value.to_string(),
                })
            };
        }

        let conds = check_kind(sv, &value)?;
        let mut next = self.clone();
        for c in conds {
            next = next.add_generic_condition(c, registry)?;
        }
        next.map.insert(
            sv.name().clone(),
            InstantiationEntry {
                sv: sv.clone(),
                value,
            },
        );
        Ok(next)
    }

    /// Same as [`Self::add`] but replaces an existing instantiation.
    pub fn replace(
        &self,
        sv: &Arc<SchemaVariable>,
        value: InstantiationValue,
        registry: &SortRegistry,
    ) -> Result<Self> {
        let mut without = self.clone();
        without.map.remove(sv.name());
        without.add(sv, value, registry)
    }

    pub fn add_term(&self, sv: &Arc<SchemaVariable>, t: Term, registry: &SortRegistry) -> Result<Self> {
        self.add(sv, InstantiationValue::Term(t), registry)
    }

    /// Union of two instantiation sets; fails on the first conflict.
    pub fn union(&self, other: &SVInstantiations, registry: &SortRegistry) -> Result<Self> {
        let mut out = self.clone();
        for e in other.iter() {
            out = out.add(&e.sv, e.value.clone(), registry)?;
        }
        for c in other.generic_conditions.iter() {
            out = out.add_generic_condition(c.clone(), registry)?;
        }
        if out.update_context.is_empty() {
            out.update_context = other.update_context.clone();
        }
        Ok(out)
    }
}

fn illegal(sv: &SchemaVariable, value: &InstantiationValue, reason: impl Into<String>) -> Error {
    Error::IllegalInstantiation {
        sv: sv.name().clone(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Kind, sort and rigidity check; returns the generic sort conditions the
/// instantiation entails.
fn check_kind(
    sv: &SchemaVariable,
    value: &InstantiationValue,
) -> Result<SmallVec<GenericSortCondition, 2>> {
    let term_sort_check = |t: &Term, strict: bool| -> Result<SmallVec<GenericSortCondition, 2>> {
        if t.is_formula() || t.sort().is_update() {
            return Err(illegal(sv, value, "expected a term, found a formula or update"));
        }
        GenericSortCondition::collect(sv.sort(), t.sort(), strict).ok_or_else(|| {
            illegal(
                sv,
                value,
                format!("sort `{}` does not fit declared sort `{}`", t.sort(), sv.sort()),
            )
        })
    };

    let conds = match (sv.kind(), value) {
        (SvKind::Formula, InstantiationValue::Term(t)) if t.is_formula() => SmallVec::new(),
        (SvKind::Update, InstantiationValue::Term(t)) if t.sort().is_update() => SmallVec::new(),
        (SvKind::Term { strict }, InstantiationValue::Term(t)) => term_sort_check(t, *strict)?,
        (SvKind::Variable, InstantiationValue::Term(t)) => {
            if t.as_logic_variable().is_none() {
                return Err(illegal(sv, value, "expected a logic variable"));
            }
            term_sort_check(t, true)?
        }
        (SvKind::Skolem, InstantiationValue::Term(t)) => term_sort_check(t, true)?,
        (SvKind::ProgramVariable, InstantiationValue::Program(ProgramElement::Variable(v))) => {
            GenericSortCondition::collect(sv.sort(), v.sort(), false)
                .ok_or_else(|| illegal(sv, value, "program variable of unsuitable sort"))?
        }
        (SvKind::Expression, InstantiationValue::Program(p)) if p.is_expression() => SmallVec::new(),
        (SvKind::Statement, InstantiationValue::Program(p)) if p.is_statement() => SmallVec::new(),
        (SvKind::StatementList, InstantiationValue::ProgramList(ps))
            if ps.iter().all(ProgramElement::is_statement) =>
        {
            SmallVec::new()
        }
        (SvKind::Modality(kinds), InstantiationValue::Modality(k)) => {
            if !kinds.contains(k) {
                return Err(illegal(sv, value, "modality kind not admitted"));
            }
            SmallVec::new()
        }
        (SvKind::Label, InstantiationValue::Labels(_)) => SmallVec::new(),
        (kind, _) => {
            return Err(illegal(sv, value, format!("value does not fit kind {kind:?}")));
        }
    };

    if sv.is_rigid() {
        if let InstantiationValue::Term(t) = value {
            if !t.is_rigid() {
                return Err(illegal(sv, value, "schema variable requires a rigid term"));
            }
        }
    }
    Ok(conds)
}
