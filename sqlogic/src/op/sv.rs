use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use smallvec::SmallVec;
use strum::EnumIs;

use super::ModalityKind;
use crate::{name::Name, sort::Sort};

/// Matching mode of a schema variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum SvKind {
    /// Matches any formula.
    Formula,
    /// Matches a term whose sort extends the variable's sort, or has exactly
    /// that sort when `strict`.
    Term { strict: bool },
    /// Matches a bound (logic) variable.
    Variable,
    /// Never matched; instantiated with a fresh constant when a rule is applied.
    Skolem,
    Update,
    /// Program constructs.
    ProgramVariable,
    Expression,
    Statement,
    StatementList,
    /// Matches one of the listed modality kinds.
    Modality(SmallVec<ModalityKind, 2>),
    /// Matches the label set of a term.
    Label,
}

/// A typed placeholder of a rule pattern.
///
/// Schema variables are identified by name; a rule source declares each
/// name once.
pub struct SchemaVariable {
    name: Name,
    kind: SvKind,
    sort: Sort,
    rigid: bool,
}

impl SchemaVariable {
    pub fn new(name: impl Into<Name>, kind: SvKind, sort: Sort) -> Arc<Self> {
        Arc::new(Self::unshared(name.into(), kind, sort, false))
    }

    fn unshared(name: Name, kind: SvKind, sort: Sort, rigid: bool) -> Self {
        let sort = match &kind {
            SvKind::Formula | SvKind::Modality(_) => Sort::formula(),
            SvKind::Update => Sort::update(),
            _ => sort,
        };
        Self {
            name,
            kind,
            sort,
            rigid,
        }
    }

    pub fn formula(name: impl Into<Name>) -> Arc<Self> {
        Self::new(name, SvKind::Formula, Sort::formula())
    }

    pub fn term(name: impl Into<Name>, sort: Sort) -> Arc<Self> {
        Self::new(name, SvKind::Term { strict: false }, sort)
    }

    pub fn strict_term(name: impl Into<Name>, sort: Sort) -> Arc<Self> {
        Self::new(name, SvKind::Term { strict: true }, sort)
    }

    pub fn variable(name: impl Into<Name>, sort: Sort) -> Arc<Self> {
        Self::new(name, SvKind::Variable, sort)
    }

    pub fn skolem(name: impl Into<Name>, sort: Sort) -> Arc<Self> {
        Self::new(name, SvKind::Skolem, sort)
    }

    pub fn update(name: impl Into<Name>) -> Arc<Self> {
        Self::new(name, SvKind::Update, Sort::update())
    }

    pub fn modality(name: impl Into<Name>, kinds: impl IntoIterator<Item = ModalityKind>) -> Arc<Self> {
        Self::new(name, SvKind::Modality(kinds.into_iter().collect()), Sort::formula())
    }

    /// Same variable, restricted to rigid instantiations.
    pub fn rigid(name: impl Into<Name>, kind: SvKind, sort: Sort) -> Arc<Self> {
        Arc::new(Self::unshared(name.into(), kind, sort, true))
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn kind(&self) -> &SvKind {
        &self.kind
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn is_rigid(&self) -> bool {
        self.rigid
    }

    pub fn is_strict(&self) -> bool {
        matches!(self.kind, SvKind::Term { strict: true })
    }

    pub fn is_formula_sv(&self) -> bool {
        self.kind.is_formula()
    }

    pub fn is_term_sv(&self) -> bool {
        self.kind.is_term()
    }

    pub fn is_variable_sv(&self) -> bool {
        self.kind.is_variable()
    }

    pub fn is_skolem_sv(&self) -> bool {
        self.kind.is_skolem()
    }

    pub fn is_update_sv(&self) -> bool {
        self.kind.is_update()
    }

    pub fn is_label_sv(&self) -> bool {
        self.kind.is_label()
    }

    pub fn is_modality_sv(&self) -> bool {
        self.kind.is_modality()
    }

    pub fn is_program_sv(&self) -> bool {
        matches!(
            self.kind,
            SvKind::ProgramVariable | SvKind::Expression | SvKind::Statement | SvKind::StatementList
        )
    }

    /// Whether the variable may occur as a term (as opposed to a binder,
    /// a modality or a label).
    pub fn is_term_position(&self) -> bool {
        matches!(
            self.kind,
            SvKind::Formula
                | SvKind::Term { .. }
                | SvKind::Variable
                | SvKind::Skolem
                | SvKind::Update
                | SvKind::ProgramVariable
                | SvKind::Expression
        )
    }
}

impl PartialEq for SchemaVariable {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.name == other.name
    }
}

impl Eq for SchemaVariable {}

impl Hash for SchemaVariable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl PartialOrd for SchemaVariable {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaVariable {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Debug for SchemaVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {})", self.name, self.kind, self.sort)
    }
}

impl fmt::Display for SchemaVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
