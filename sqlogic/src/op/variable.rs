use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::{name::Name, sort::Sort};

struct LogicVariableData {
    name: Name,
    sort: Sort,
}

/// A variable bound by a quantifier or substitution.
///
/// Identity is object identity: two variables created separately are
/// different even when they share a name and sort. Comparisons that must
/// ignore the choice of bound variables use
/// [`Term::equals_mod_renaming`](crate::term::Term::equals_mod_renaming).
#[derive(Clone)]
pub struct LogicVariable(Arc<LogicVariableData>);

impl LogicVariable {
    pub fn new(name: impl Into<Name>, sort: Sort) -> Self {
        LogicVariable(Arc::new(LogicVariableData {
            name: name.into(),
            sort,
        }))
    }

    pub fn name(&self) -> &Name {
        &self.0.name
    }

    pub fn sort(&self) -> &Sort {
        &self.0.sort
    }

    /// A new variable with the same name and sort but its own identity.
    pub fn renamed_copy(&self) -> Self {
        LogicVariable::new(self.0.name.clone(), self.0.sort.clone())
    }
}

impl PartialEq for LogicVariable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for LogicVariable {}

impl Hash for LogicVariable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
        self.0.sort.hash(state);
    }
}

impl fmt::Debug for LogicVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0.name, self.0.sort)
    }
}

struct ProgramVariableData {
    name: Name,
    sort: Sort,
}

/// A state-dependent variable of the program language, usable both inside
/// modalities and as a (non-rigid) term.
#[derive(Clone)]
pub struct ProgramVariable(Arc<ProgramVariableData>);

impl ProgramVariable {
    pub fn new(name: impl Into<Name>, sort: Sort) -> Self {
        ProgramVariable(Arc::new(ProgramVariableData {
            name: name.into(),
            sort,
        }))
    }

    pub fn name(&self) -> &Name {
        &self.0.name
    }

    pub fn sort(&self) -> &Sort {
        &self.0.sort
    }
}

impl PartialEq for ProgramVariable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for ProgramVariable {}

impl Hash for ProgramVariable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state)
    }
}

impl PartialOrd for ProgramVariable {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProgramVariable {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.name.cmp(&other.0.name)
    }
}

impl fmt::Debug for ProgramVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

impl fmt::Display for ProgramVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}
