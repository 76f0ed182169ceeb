use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use smallvec::SmallVec;

use crate::{name::Name, sort::Sort};

/// A function symbol. Predicates are functions of sort `Formula`, constants
/// are functions without arguments.
pub struct Function {
    name: Name,
    sort: Sort,
    arg_sorts: SmallVec<Sort, 4>,
    rigid: bool,
    skolem: bool,
}

impl Function {
    pub fn new(name: impl Into<Name>, sort: Sort, arg_sorts: impl IntoIterator<Item = Sort>) -> Self {
        Self {
            name: name.into(),
            sort,
            arg_sorts: arg_sorts.into_iter().collect(),
            rigid: true,
            skolem: false,
        }
    }

    /// Marks the symbol as state dependent.
    pub fn non_rigid(mut self) -> Self {
        self.rigid = false;
        self
    }

    /// A rigid constant introduced by a rule application.
    pub fn skolem(name: impl Into<Name>, sort: Sort) -> Self {
        let name = name.into();
        Self {
            name,
            sort,
            arg_sorts: SmallVec::new(),
            rigid: true,
            skolem: true,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn arg_sorts(&self) -> &[Sort] {
        &self.arg_sorts
    }

    pub fn arity(&self) -> usize {
        self.arg_sorts.len()
    }

    pub fn is_rigid(&self) -> bool {
        self.rigid
    }

    pub fn is_skolem(&self) -> bool {
        self.skolem
    }

    pub fn is_predicate(&self) -> bool {
        self.sort.is_formula()
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || (self.name == other.name && self.sort == other.sort)
    }
}

impl Eq for Function {}

impl Hash for Function {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, s) in self.arg_sorts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{s}")?;
        }
        write!(f, "): {}", self.sort)
    }
}

/// A family of functions indexed by sorts, e.g. `S::cast` or `S::instance`.
///
/// Argument and result sorts may mention the sort parameters, which are
/// generic sorts substituted on instantiation.
#[derive(Debug)]
pub struct ParametricFunctionDecl {
    pub name: Name,
    pub sort_params: Vec<Sort>,
    pub sort: Sort,
    pub arg_sorts: Vec<Sort>,
    pub rigid: bool,
}

/// One member of a [`ParametricFunctionDecl`] family.
///
/// Instances are canonical per [`crate::services::Services`]; obtain them through
/// [`crate::services::Services::parametric_function`].
pub struct ParametricFunctionInstance {
    decl: Arc<ParametricFunctionDecl>,
    args: SmallVec<Sort, 2>,
    sort: Sort,
    arg_sorts: SmallVec<Sort, 4>,
}

impl ParametricFunctionInstance {
    pub(crate) fn new(
        decl: Arc<ParametricFunctionDecl>,
        args: SmallVec<Sort, 2>,
        sort: Sort,
        arg_sorts: SmallVec<Sort, 4>,
    ) -> Self {
        Self {
            decl,
            args,
            sort,
            arg_sorts,
        }
    }

    pub fn decl(&self) -> &Arc<ParametricFunctionDecl> {
        &self.decl
    }

    pub fn args(&self) -> &[Sort] {
        &self.args
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn arg_sorts(&self) -> &[Sort] {
        &self.arg_sorts
    }

    pub fn is_rigid(&self) -> bool {
        self.decl.rigid
    }

    /// Whether this instance belongs to the same family as `other`.
    pub fn is_similar(&self, other: &ParametricFunctionInstance) -> bool {
        Arc::ptr_eq(&self.decl, &other.decl) || self.decl.name == other.decl.name
    }
}

impl PartialEq for ParametricFunctionInstance {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || (self.is_similar(other) && self.args == other.args)
    }
}

impl Eq for ParametricFunctionInstance {}

impl Hash for ParametricFunctionInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.decl.name.hash(state);
        self.args.hash(state);
    }
}

impl fmt::Display for ParametricFunctionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.len() == 1 {
            write!(f, "{}::{}", self.args[0], self.decl.name)
        } else {
            write!(f, "{}<[", self.decl.name)?;
            for (i, a) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{a}")?;
            }
            write!(f, "]>")
        }
    }
}

impl fmt::Debug for ParametricFunctionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
