//! Sorts
//!
//! A sort is the static type of a term. Sorts form a hierarchy through their
//! directly extended super-sorts; [`Sort::extends_trans`] answers the
//! reflexive-transitive subsort question used everywhere types must agree.
//!
//! Three built-in sorts exist independently of any registry:
//! - [`Sort::any`] is the top of the hierarchy. Declared sorts without
//!   explicit parents extend it.
//! - [`Sort::formula`] and [`Sort::update`] are isolated: they extend nothing
//!   and nothing extends them.
//!
//! Besides declared sorts there are
//! - generic sorts, sort variables occurring in rules and resolved while
//!   matching (see [`crate::inst::generic`]),
//! - instances of parametric sorts such as `Seq<[int]>`, which the
//!   [`SortRegistry`] keeps canonical: one representative per
//!   `(declaration, arguments)` pair.
//!
//! Sorts are compared by name. Names are unique within a registry, so the
//! pointer comparison performed first is only a fast path.
use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use once_cell::sync::Lazy;
use smallvec::SmallVec;
use strum::{Display, EnumIs};

use crate::name::Name;

mod registry;

pub use registry::{SortDeclaration, SortRegistry};

/// How the subsort relation of a parametric sort follows its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Variance {
    Covariant,
    Contravariant,
    Invariant,
}

/// Declaration of a parametric sort such as `Seq<[E]>`.
///
/// Parameters are generic sorts; `extends` may mention them and is
/// instantiated together with the arguments.
#[derive(Debug)]
pub struct ParametricSortDecl {
    pub name: Name,
    pub params: Vec<(Sort, Variance)>,
    pub extends: Vec<Sort>,
    pub documentation: Option<String>,
}

#[derive(Clone, Debug, EnumIs)]
pub enum SortKind {
    Any,
    Formula,
    Update,
    Declared,
    /// Sort variable. `one_of`, if not empty, restricts admissible instantiations.
    Generic {
        one_of: SmallVec<Sort, 2>,
    },
    Instance {
        decl: Arc<ParametricSortDecl>,
        args: SmallVec<Sort, 2>,
    },
}

struct SortData {
    name: Name,
    kind: SortKind,
    extends: SmallVec<Sort, 2>,
    is_abstract: bool,
    documentation: Option<String>,
    origin: Option<String>,
}

#[derive(Clone)]
pub struct Sort(Arc<SortData>);

static ANY: Lazy<Sort> = Lazy::new(|| Sort::builtin("any", SortKind::Any));
static FORMULA: Lazy<Sort> = Lazy::new(|| Sort::builtin("Formula", SortKind::Formula));
static UPDATE: Lazy<Sort> = Lazy::new(|| Sort::builtin("Update", SortKind::Update));

impl Sort {
    fn builtin(name: &str, kind: SortKind) -> Sort {
        Sort(Arc::new(SortData {
            name: Name::new(name),
            kind,
            extends: SmallVec::new(),
            is_abstract: false,
            documentation: None,
            origin: None,
        }))
    }

    /// Top sort.
    pub fn any() -> Sort {
        ANY.clone()
    }

    pub fn formula() -> Sort {
        FORMULA.clone()
    }

    pub fn update() -> Sort {
        UPDATE.clone()
    }

    pub(crate) fn from_parts(
        name: Name,
        kind: SortKind,
        extends: impl IntoIterator<Item = Sort>,
        is_abstract: bool,
        documentation: Option<String>,
        origin: Option<String>,
    ) -> Sort {
        let mut extends: SmallVec<Sort, 2> = extends.into_iter().collect();
        if extends.is_empty() {
            extends.push(Sort::any());
        }
        Sort(Arc::new(SortData {
            name,
            kind,
            extends,
            is_abstract,
            documentation,
            origin,
        }))
    }

    /// Creates a generic sort outside of any registry.
    ///
    /// Mostly useful for rule construction where generic sorts are local to a
    /// rule file; registries also accept them through
    /// [`SortRegistry::declare_generic`].
    pub fn new_generic(name: impl Into<Name>, extends: &[Sort], one_of: &[Sort]) -> Sort {
        Sort::from_parts(
            name.into(),
            SortKind::Generic {
                one_of: one_of.iter().cloned().collect(),
            },
            extends.iter().cloned(),
            false,
            None,
            None,
        )
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.0.name
    }

    #[inline]
    pub fn kind(&self) -> &SortKind {
        &self.0.kind
    }

    /// Directly extended super-sorts.
    pub fn extends(&self) -> &[Sort] {
        &self.0.extends
    }

    pub fn is_abstract(&self) -> bool {
        self.0.is_abstract
    }

    pub fn documentation(&self) -> Option<&str> {
        self.0.documentation.as_deref()
    }

    pub fn origin(&self) -> Option<&str> {
        self.0.origin.as_deref()
    }

    pub fn is_any(&self) -> bool {
        self.0.kind.is_any()
    }

    pub fn is_formula(&self) -> bool {
        self.0.kind.is_formula()
    }

    pub fn is_update(&self) -> bool {
        self.0.kind.is_update()
    }

    pub fn is_generic(&self) -> bool {
        self.0.kind.is_generic()
    }

    /// Whether this sort is generic or is a parametric instance mentioning a generic sort.
    pub fn contains_generic(&self) -> bool {
        match &self.0.kind {
            SortKind::Generic { .. } => true,
            SortKind::Instance { args, .. } => args.iter().any(Sort::contains_generic),
            _ => false,
        }
    }

    /// Admissible instantiations of a generic sort (empty means unrestricted).
    pub fn one_of(&self) -> &[Sort] {
        match &self.0.kind {
            SortKind::Generic { one_of } => one_of,
            _ => &[],
        }
    }

    /// Declaration and arguments if this is a parametric sort instance.
    pub fn as_instance(&self) -> Option<(&Arc<ParametricSortDecl>, &[Sort])> {
        match &self.0.kind {
            SortKind::Instance { decl, args } => Some((decl, args)),
            _ => None,
        }
    }

    /// Reflexive-transitive closure of the extension relation.
    ///
    /// Every sort but `Formula` and `Update` extends `any`. Two instances of
    /// the same parametric declaration are compared argument-wise according
    /// to the declared variance before the declared super-sorts are searched.
    pub fn extends_trans(&self, other: &Sort) -> bool {
        if self == other {
            return true;
        }
        if self.is_formula() || self.is_update() || other.is_formula() || other.is_update() {
            return false;
        }
        if other.is_any() {
            return true;
        }

        let mut stack: SmallVec<&Sort, 8> = SmallVec::new();
        stack.push(self);
        while let Some(current) = stack.pop() {
            if current == other {
                return true;
            }
            if let (Some((d1, a1)), Some((d2, a2))) = (current.as_instance(), other.as_instance()) {
                if d1.name == d2.name && instance_args_extend(&d1.params, a1, a2) {
                    return true;
                }
            }
            stack.extend(current.extends().iter());
        }
        false
    }

    /// Replaces generic sorts according to `f`, re-interning parametric
    /// instances through `registry` when one of their arguments changed.
    pub fn substitute(
        &self,
        f: &dyn Fn(&Sort) -> Option<Sort>,
        registry: &SortRegistry,
    ) -> crate::utils::Result<Sort> {
        match &self.0.kind {
            SortKind::Generic { .. } => Ok(f(self).unwrap_or_else(|| self.clone())),
            SortKind::Instance { decl, args } => {
                let mut changed = false;
                let mut new_args: SmallVec<Sort, 2> = SmallVec::new();
                for a in args {
                    let s = a.substitute(f, registry)?;
                    changed |= &s != a;
                    new_args.push(s);
                }
                if changed {
                    registry.instantiate_parametric(&decl.name, new_args)
                } else {
                    Ok(self.clone())
                }
            }
            _ => Ok(self.clone()),
        }
    }
}

fn instance_args_extend(params: &[(Sort, Variance)], sub: &[Sort], sup: &[Sort]) -> bool {
    params
        .iter()
        .zip(sub.iter().zip(sup.iter()))
        .all(|((_, variance), (a, b))| match variance {
            Variance::Covariant => a.extends_trans(b),
            Variance::Contravariant => b.extends_trans(a),
            Variance::Invariant => a == b,
        })
}

impl PartialEq for Sort {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for Sort {}

impl Hash for Sort {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state)
    }
}

impl PartialOrd for Sort {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sort {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.name.cmp(&other.0.name)
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

impl fmt::Debug for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sort({})", self.0.name)
    }
}

/// Canonical display name of a parametric instance, e.g. `Seq<[int]>`.
pub(crate) fn instance_name(decl: &Name, args: &[Sort]) -> Name {
    let args = args
        .iter()
        .map(|a| a.name().as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Name::new(format!("{decl}<[{args}]>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_sorts_are_isolated() {
        assert!(Sort::formula().extends_trans(&Sort::formula()));
        assert!(!Sort::formula().extends_trans(&Sort::any()));
        assert!(!Sort::update().extends_trans(&Sort::any()));
        assert!(!Sort::any().extends_trans(&Sort::formula()));
    }

    #[test]
    fn generic_sorts_extend_their_bounds() {
        let reg = SortRegistry::new();
        let num = reg.declare(SortDeclaration::new("num")).unwrap();
        let g = Sort::new_generic("G", &[num.clone()], &[]);
        assert!(g.extends_trans(&num));
        assert!(g.extends_trans(&Sort::any()));
        assert!(!num.extends_trans(&g));
    }
}
