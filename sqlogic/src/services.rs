//! The per-proof environment.
//!
//! Role
//! - Bundles the sort registry, the symbol namespaces, the term factory and
//!   the canonical parametric function instances.
//! - Converts program expressions into terms, so that symbolic execution
//!   rules can move expressions out of modalities.
//!
//! Every proof owns its own [`Services`] (see [`Services::for_proof`]): the
//! interning tables are dropped with the proof, and two proofs never contend
//! on them. The sort registry is shared read-mostly between copies.
use std::{collections::HashMap, sync::Arc};

use log::debug;
use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard, RwLockWriteGuard};
use smallvec::SmallVec;

use crate::{
    name::Name,
    namespace::NamespaceSet,
    op::{Function, ParametricFunctionDecl, ParametricFunctionInstance, ProgramVariable, SchemaVariable},
    program::{BinaryOp, ProgramElement, UnaryOp},
    sort::{Sort, SortRegistry},
    term::{Term, TermBuilder, TermFactory},
    utils::{Error, Result},
};

/// Name of the sort integer literals belong to.
pub const INT_SORT: &str = "int";
/// Name of the sort of boolean program variables.
pub const BOOLEAN_SORT: &str = "boolean";
/// Constant denoting the boolean value `true` in term position.
pub const BOOLEAN_TRUE: &str = "TRUE";

pub struct Services {
    sorts: Arc<SortRegistry>,
    namespaces: RwLock<NamespaceSet>,
    tf: TermFactory,
    parametric_instances: RwLock<HashMap<(Name, SmallVec<Sort, 2>), Arc<ParametricFunctionInstance>>>,
}

impl Default for Services {
    fn default() -> Self {
        Self::new(Arc::new(SortRegistry::new()))
    }
}

impl Services {
    pub fn new(sorts: Arc<SortRegistry>) -> Self {
        Self {
            sorts,
            namespaces: RwLock::new(NamespaceSet::default()),
            tf: TermFactory::new(),
            parametric_instances: RwLock::new(HashMap::new()),
        }
    }

    /// A copy for a new proof: same sorts and symbols, fresh caches.
    pub fn for_proof(&self) -> Services {
        Services {
            sorts: self.sorts.clone(),
            namespaces: RwLock::new(self.namespaces.read().clone()),
            tf: TermFactory::new(),
            parametric_instances: RwLock::new(HashMap::new()),
        }
    }

    pub fn sorts(&self) -> &SortRegistry {
        &self.sorts
    }

    pub fn shared_sorts(&self) -> Arc<SortRegistry> {
        self.sorts.clone()
    }

    pub fn namespaces(&self) -> RwLockReadGuard<'_, NamespaceSet> {
        self.namespaces.read()
    }

    pub fn namespaces_mut(&self) -> RwLockWriteGuard<'_, NamespaceSet> {
        self.namespaces.write()
    }

    pub fn term_factory(&self) -> &TermFactory {
        &self.tf
    }

    pub fn tb(&self) -> TermBuilder<'_> {
        TermBuilder::new(&self.tf)
    }

    pub fn sort(&self, name: &str) -> Result<Sort> {
        self.sorts.get(name)
    }

    pub fn declare_function(&self, f: Function) -> Result<Arc<Function>> {
        let f = Arc::new(f);
        self.namespaces.write().functions.add(f.name().clone(), f.clone())?;
        debug!("Declared function {:?}.", f);
        Ok(f)
    }

    /// Declares an already shared symbol, e.g. a skolem constant that is
    /// referenced by terms built before the declaration.
    pub fn adopt_function(&self, f: Arc<Function>) -> Result<()> {
        self.namespaces.write().functions.add(f.name().clone(), f.clone())?;
        debug!("Declared function {:?}.", f);
        Ok(())
    }

    pub fn declare_program_variable(&self, name: &str, sort: Sort) -> Result<ProgramVariable> {
        let pv = ProgramVariable::new(name, sort);
        self.namespaces
            .write()
            .program_variables
            .add(pv.name().clone(), pv.clone())?;
        Ok(pv)
    }

    pub fn declare_schema_variable(&self, sv: Arc<SchemaVariable>) -> Result<Arc<SchemaVariable>> {
        self.namespaces
            .write()
            .schema_variables
            .add(sv.name().clone(), sv.clone())?;
        Ok(sv)
    }

    pub fn declare_parametric_function(
        &self,
        decl: ParametricFunctionDecl,
    ) -> Result<Arc<ParametricFunctionDecl>> {
        let decl = Arc::new(decl);
        self.namespaces
            .write()
            .parametric_functions
            .add(decl.name.clone(), decl.clone())?;
        Ok(decl)
    }

    pub fn function(&self, name: &str) -> Option<Arc<Function>> {
        self.namespaces.read().functions.lookup(name).cloned()
    }

    pub fn program_variable(&self, name: &str) -> Option<ProgramVariable> {
        self.namespaces.read().program_variables.lookup(name).cloned()
    }

    pub fn schema_variable(&self, name: &str) -> Option<Arc<SchemaVariable>> {
        self.namespaces.read().schema_variables.lookup(name).cloned()
    }

    /// Canonical instance of the parametric function `name` at `args`.
    pub fn parametric_function(&self, name: &str, args: &[Sort]) -> Result<Arc<ParametricFunctionInstance>> {
        let decl = self
            .namespaces
            .read()
            .parametric_functions
            .get(name)?
            .clone();
        self.instantiate_parametric(&decl, args)
    }

    pub fn instantiate_parametric(
        &self,
        decl: &Arc<ParametricFunctionDecl>,
        args: &[Sort],
    ) -> Result<Arc<ParametricFunctionInstance>> {
        if decl.sort_params.len() != args.len() {
            return Err(Error::ParametricArity {
                decl: decl.name.clone(),
                expected: decl.sort_params.len(),
                found: args.len(),
            });
        }
        let key: (Name, SmallVec<Sort, 2>) = (decl.name.clone(), args.iter().cloned().collect());
        if let Some(existing) = self.parametric_instances.read().get(&key) {
            return Ok(existing.clone());
        }

        let mapping = |s: &Sort| {
            decl.sort_params
                .iter()
                .position(|p| p == s)
                .map(|i| args[i].clone())
        };
        let sort = decl.sort.substitute(&mapping, &self.sorts)?;
        let arg_sorts = decl
            .arg_sorts
            .iter()
            .map(|s| s.substitute(&mapping, &self.sorts))
            .collect::<Result<SmallVec<Sort, 4>>>()?;

        let cache = self.parametric_instances.upgradable_read();
        if let Some(existing) = cache.get(&key) {
            return Ok(existing.clone());
        }
        let mut cache = RwLockUpgradableReadGuard::upgrade(cache);
        let instance = Arc::new(ParametricFunctionInstance::new(
            decl.clone(),
            key.1.clone(),
            sort,
            arg_sorts,
        ));
        cache.insert(key, instance.clone());
        Ok(instance)
    }

    /// A name derived from `base` not used by any term-level symbol.
    pub fn fresh_name(&self, base: &str) -> Name {
        let ns = self.namespaces.read();
        Name::fresh_variant(base, |n| ns.is_taken(n))
    }

    /// Declares a new rigid constant of `sort` named after `base`.
    pub fn new_skolem_constant(&self, base: &str, sort: Sort) -> Arc<Function> {
        let mut ns = self.namespaces.write();
        let name = Name::fresh_variant(base, |n| ns.is_taken(n));
        let f = Arc::new(Function::skolem(name.clone(), sort));
        ns.functions.add_or_replace(name, f.clone());
        debug!("Introduced skolem constant {:?}.", f);
        f
    }

    /// Integer literal `value` as a constant of sort `int`.
    pub fn int_literal(&self, value: i64) -> Result<Term> {
        let int = self.sorts.get(INT_SORT)?;
        let f = Arc::new(Function::new(value.to_string(), int, []));
        self.tb().func(&f, [])
    }

    fn program_function(&self, name: &str, fragment: &ProgramElement) -> Result<Arc<Function>> {
        self.function(name).ok_or_else(|| Error::ProgramConversion {
            fragment: format!("{fragment} (needs function `{name}`)"),
        })
    }

    /// Converts a program expression to a term of the expression's sort.
    ///
    /// Arithmetic maps to the functions `add`, `sub`, `mul` and `neg`;
    /// boolean expressions are only convertible in formula position, see
    /// [`Self::program_to_formula`].
    pub fn program_to_term(&self, e: &ProgramElement) -> Result<Term> {
        let tb = self.tb();
        match e {
            ProgramElement::Variable(v) => tb.pv(v),
            ProgramElement::IntLiteral(i) => self.int_literal(*i),
            ProgramElement::Schema(sv) if sv.is_term_position() => tb.sv(sv),
            ProgramElement::Unary {
                op: UnaryOp::Neg,
                operand,
            } => {
                let f = self.program_function("neg", e)?;
                tb.func(&f, [self.program_to_term(operand)?])
            }
            ProgramElement::Binary { op, lhs, rhs } if !op.is_comparison() => {
                let name = match op {
                    BinaryOp::Add => "add",
                    BinaryOp::Sub => "sub",
                    _ => "mul",
                };
                let f = self.program_function(name, e)?;
                tb.func(&f, [self.program_to_term(lhs)?, self.program_to_term(rhs)?])
            }
            _ => Err(Error::ProgramConversion {
                fragment: e.to_string(),
            }),
        }
    }

    /// Converts a boolean program expression to a formula.
    ///
    /// Comparisons map to the predicates `lt`, `leq`, `gt`, `geq` and `==`
    /// to equality; a boolean variable `b` becomes `b = TRUE`.
    pub fn program_to_formula(&self, e: &ProgramElement) -> Result<Term> {
        let tb = self.tb();
        match e {
            ProgramElement::BoolLiteral(true) => tb.tt(),
            ProgramElement::BoolLiteral(false) => tb.ff(),
            ProgramElement::Unary {
                op: UnaryOp::Not,
                operand,
            } => tb.not(self.program_to_formula(operand)?),
            ProgramElement::Binary {
                op: BinaryOp::Eq,
                lhs,
                rhs,
            } => tb.equals(self.program_to_term(lhs)?, self.program_to_term(rhs)?),
            ProgramElement::Binary { op, lhs, rhs } if op.is_comparison() => {
                let name = match op {
                    BinaryOp::Lt => "lt",
                    BinaryOp::Le => "leq",
                    BinaryOp::Gt => "gt",
                    _ => "geq",
                };
                let f = self.program_function(name, e)?;
                tb.func(&f, [self.program_to_term(lhs)?, self.program_to_term(rhs)?])
            }
            ProgramElement::Variable(v) if v.sort().name().as_str() == BOOLEAN_SORT => {
                let t = self.program_function(BOOLEAN_TRUE, e)?;
                tb.equals(tb.pv(v)?, tb.func(&t, [])?)
            }
            ProgramElement::Schema(sv) if sv.is_term_position() => {
                let t = tb.sv(sv)?;
                if t.is_formula() {
                    Ok(t)
                } else {
                    let tru = self.program_function(BOOLEAN_TRUE, e)?;
                    tb.equals(t, tb.func(&tru, [])?)
                }
            }
            _ => Err(Error::ProgramConversion {
                fragment: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::SortDeclaration;

    fn services() -> Services {
        let services = Services::default();
        let int = services.sorts().declare(SortDeclaration::new("int")).unwrap();
        services
            .declare_function(Function::new("add", int.clone(), [int.clone(), int.clone()]))
            .unwrap();
        services
            .declare_function(Function::new("lt", Sort::formula(), [int.clone(), int]))
            .unwrap();
        services
    }

    #[test]
    fn converts_arithmetic_and_comparisons() {
        let s = services();
        let i = s.declare_program_variable("i", s.sort("int").unwrap()).unwrap();
        let sum = ProgramElement::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(ProgramElement::Variable(i.clone())),
            rhs: Box::new(ProgramElement::IntLiteral(1)),
        };
        let t = s.program_to_term(&sum).unwrap();
        assert_eq!(t.to_string(), "add(i, 1)");

        let cmp = ProgramElement::Binary {
            op: BinaryOp::Lt,
            lhs: Box::new(ProgramElement::Variable(i)),
            rhs: Box::new(ProgramElement::IntLiteral(0)),
        };
        assert!(s.program_to_formula(&cmp).unwrap().is_formula());
        assert!(s.program_to_term(&cmp).unwrap_err().is_program_conversion());
    }

    #[test]
    fn skolem_names_are_fresh() {
        let s = services();
        let int = s.sort("int").unwrap();
        let a = s.new_skolem_constant("x", int.clone());
        let b = s.new_skolem_constant("x", int);
        assert_eq!(a.name().as_str(), "x");
        assert_eq!(b.name().as_str(), "x_0");
    }

    #[test]
    fn proof_copies_do_not_share_symbols_added_later() {
        let s = services();
        let copy = s.for_proof();
        copy.new_skolem_constant("c", s.sort("int").unwrap());
        assert!(copy.function("c").is_some());
        assert!(s.function("c").is_none());
        assert!(copy.function("add").is_some());
    }
}
