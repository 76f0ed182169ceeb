//! Rules implemented in code rather than as taclets.
//!
//! [`ExternalVerdictRule`] closes a goal when an [`SmtSolver`] reports the
//! goal's sequent valid. The solver is a seam: the only implementation in
//! this crate is [`TruthTableSolver`], a propositional checker.
use std::{fmt, sync::Arc};

use log::debug;
use sqlogic::{
    Name,
    op::{Junctor, Operator},
    sequent::{PosInOccurrence, Sequent},
    services::Services,
    term::Term,
};
use strum::{Display, EnumIs};

use crate::{magic::MAX_TRUTH_TABLE_ATOMS, utils::error::ProofResult};

pub trait BuiltInRule: Send + Sync + fmt::Debug {
    fn name(&self) -> &Name;

    fn rule_sets(&self) -> &[Name] {
        &[]
    }

    /// Whether the rule is offered at formula positions instead of for the
    /// goal as a whole.
    fn applies_at_positions(&self) -> bool {
        false
    }

    fn is_applicable(&self, sequent: &Sequent, pos: Option<&PosInOccurrence>, services: &Services) -> bool;

    /// Sequents of the new goals; an empty result closes the goal.
    fn apply(&self, sequent: &Sequent, pos: Option<&PosInOccurrence>, services: &Services) -> ProofResult<Vec<Sequent>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIs)]
#[strum(serialize_all = "snake_case")]
pub enum Verdict {
    Valid,
    Falsifiable,
    Unknown,
}

/// Decision procedure queried for whole sequents.
pub trait SmtSolver: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn check(&self, sequent: &Sequent, services: &Services) -> Verdict;
}

#[derive(Debug, Clone)]
pub struct ExternalVerdictRule {
    name: Name,
    rule_sets: Vec<Name>,
    solver: Arc<dyn SmtSolver>,
}

impl ExternalVerdictRule {
    pub fn new(name: impl Into<Name>, solver: Arc<dyn SmtSolver>) -> Self {
        Self {
            name: name.into(),
            rule_sets: Vec::new(),
            solver,
        }
    }

    pub fn in_rule_set(mut self, set: impl Into<Name>) -> Self {
        self.rule_sets.push(set.into());
        self
    }
}

impl BuiltInRule for ExternalVerdictRule {
    fn name(&self) -> &Name {
        &self.name
    }

    fn rule_sets(&self) -> &[Name] {
        &self.rule_sets
    }

    fn is_applicable(&self, sequent: &Sequent, pos: Option<&PosInOccurrence>, services: &Services) -> bool {
        pos.is_none() && self.solver.check(sequent, services).is_valid()
    }

    fn apply(&self, sequent: &Sequent, _pos: Option<&PosInOccurrence>, services: &Services) -> ProofResult<Vec<Sequent>> {
        let verdict = self.solver.check(sequent, services);
        debug!("Solver `{}` answered {verdict}.", self.solver.name());
        match verdict {
            Verdict::Valid => Ok(Vec::new()),
            other => Err(crate::utils::error::ProofError::illegal(
                &self.name,
                format!("solver `{}` answered {other}", self.solver.name()),
            )),
        }
    }
}

/// Propositional validity by enumerating assignments of the atoms.
///
/// Anything that is not a junctor is an atom. A sequent that is not a
/// tautology is only reported falsifiable when every atom is a nullary
/// predicate; otherwise first-order reasoning might still prove it.
#[derive(Debug, Clone)]
pub struct TruthTableSolver {
    max_atoms: usize,
}

impl Default for TruthTableSolver {
    fn default() -> Self {
        Self {
            max_atoms: MAX_TRUTH_TABLE_ATOMS,
        }
    }
}

impl TruthTableSolver {
    pub fn with_max_atoms(max_atoms: usize) -> Self {
        Self { max_atoms }
    }

    fn collect_atoms(t: &Term, atoms: &mut Vec<Term>) {
        match t.op() {
            Operator::Junctor(Junctor::True | Junctor::False) => {}
            Operator::Junctor(_) => t.subs().iter().for_each(|s| Self::collect_atoms(s, atoms)),
            _ => {
                if !atoms.iter().any(|a| a == t || a.equals_mod_renaming(t)) {
                    atoms.push(t.clone());
                }
            }
        }
    }

    fn eval(t: &Term, atoms: &[Term], assignment: u64) -> bool {
        match t.op() {
            Operator::Junctor(j) => match j {
                Junctor::True => true,
                Junctor::False => false,
                Junctor::Not => !Self::eval(t.sub(0), atoms, assignment),
                Junctor::And => Self::eval(t.sub(0), atoms, assignment) && Self::eval(t.sub(1), atoms, assignment),
                Junctor::Or => Self::eval(t.sub(0), atoms, assignment) || Self::eval(t.sub(1), atoms, assignment),
                Junctor::Imp => !Self::eval(t.sub(0), atoms, assignment) || Self::eval(t.sub(1), atoms, assignment),
                Junctor::Equiv => Self::eval(t.sub(0), atoms, assignment) == Self::eval(t.sub(1), atoms, assignment),
            },
            _ => {
                let i = atoms.iter().position(|a| a == t || a.equals_mod_renaming(t));
                i.is_some_and(|i| assignment & (1 << i) != 0)
            }
        }
    }
}

impl SmtSolver for TruthTableSolver {
    fn name(&self) -> &str {
        "truth_table"
    }

    fn check(&self, sequent: &Sequent, _services: &Services) -> Verdict {
        let mut atoms = Vec::new();
        for (_, _, f) in sequent.iter() {
            Self::collect_atoms(f.formula(), &mut atoms);
        }
        if atoms.len() > self.max_atoms.min(63) {
            return Verdict::Unknown;
        }
        let holds = |assignment: u64| {
            sequent.antecedent().iter().any(|f| !Self::eval(f.formula(), &atoms, assignment))
                || sequent.succedent().iter().any(|f| Self::eval(f.formula(), &atoms, assignment))
        };
        if (0..1u64 << atoms.len()).all(holds) {
            return Verdict::Valid;
        }
        let propositional = atoms.iter().all(|a| match a.op() {
            Operator::Function(f) => f.arity() == 0 && f.is_predicate(),
            _ => false,
        });
        if propositional { Verdict::Falsifiable } else { Verdict::Unknown }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlogic::{op::Function, parser::parse_sequent, sort::Sort};

    fn services() -> Services {
        let s = Services::default();
        for p in ["a", "b"] {
            s.declare_function(Function::new(p, Sort::formula(), [])).unwrap();
        }
        s
    }

    #[test]
    fn tautologies_are_valid() {
        let s = services();
        let solver = TruthTableSolver::default();
        for src in ["a ==> a", "a -> b, a ==> b", "==> a | !a", "false ==>", "a & b ==> b & a"] {
            let seq = parse_sequent(&s, src).unwrap();
            assert_eq!(solver.check(&seq, &s), Verdict::Valid, "{src}");
        }
    }

    #[test]
    fn countermodels_are_reported_for_propositional_sequents() {
        let s = services();
        let solver = TruthTableSolver::default();
        let seq = parse_sequent(&s, "a | b ==> a").unwrap();
        assert_eq!(solver.check(&seq, &s), Verdict::Falsifiable);
        let empty = parse_sequent(&s, "==>").unwrap();
        assert_eq!(solver.check(&empty, &s), Verdict::Falsifiable);
    }

    #[test]
    fn atom_limit_gives_unknown() {
        let s = services();
        let seq = parse_sequent(&s, "a, b ==> a").unwrap();
        assert_eq!(TruthTableSolver::with_max_atoms(1).check(&seq, &s), Verdict::Unknown);
    }

    #[test]
    fn verdict_rule_closes_only_valid_goals() {
        let s = services();
        let rule = ExternalVerdictRule::new("smt", Arc::new(TruthTableSolver::default()));
        let valid = parse_sequent(&s, "a ==> a").unwrap();
        let open = parse_sequent(&s, "a ==> b").unwrap();
        assert!(rule.is_applicable(&valid, None, &s));
        assert!(rule.apply(&valid, None, &s).unwrap().is_empty());
        assert!(!rule.is_applicable(&open, None, &s));
        assert!(rule.apply(&open, None, &s).unwrap_err().is_illegal_application());
    }
}
