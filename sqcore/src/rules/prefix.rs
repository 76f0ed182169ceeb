//! Taclet prefixes.
//!
//! The prefix of a schema variable is the set of variable schema variables
//! bound above its occurrences. A term instantiating the schema variable may
//! only contain free logic variables that instantiate a variable of its
//! prefix, or, for schema variables that never leave the find context,
//! variables bound above the find position.
use std::collections::{BTreeMap, BTreeSet};

use sqlogic::{
    Name,
    inst::SVInstantiations,
    op::{BoundVariable, LogicVariable, Operator},
    term::Term,
};

use crate::utils::error::{ProofError, ProofResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TacletPrefix {
    pub binders: BTreeSet<Name>,
    /// Every occurrence is in the find term or in a term replacing it.
    pub context: bool,
}

/// Where a term of a taclet appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    Find,
    Assumes,
    /// `replacewith` of a rewrite taclet.
    Rewrite,
    /// Formulas added to or replacing top-level formulas of the sequent.
    TopLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TacletPrefixMap {
    prefixes: BTreeMap<Name, TacletPrefix>,
}

impl TacletPrefixMap {
    /// Computes the prefixes of all schema variables in `parts`.
    ///
    /// Fails if a schema variable occurs below different binders, or if a
    /// variable schema variable is bound twice in the find or assumes part.
    pub fn compute<'t>(taclet: &Name, parts: impl IntoIterator<Item = (Occurrence, &'t Term)>) -> ProofResult<Self> {
        let mut map = TacletPrefixMap::default();
        let mut bound_in_match: BTreeSet<Name> = BTreeSet::new();
        for (occurrence, term) in parts {
            let mut stack = Vec::new();
            map.visit(taclet, term, occurrence, &mut stack, &mut bound_in_match)?;
        }
        Ok(map)
    }

    fn visit(
        &mut self,
        taclet: &Name,
        t: &Term,
        occurrence: Occurrence,
        stack: &mut Vec<Name>,
        bound_in_match: &mut BTreeSet<Name>,
    ) -> ProofResult<()> {
        if !t.contains_schema_variables() {
            return Ok(());
        }
        if let Operator::SchemaVariable(sv) = t.op() {
            if sv.is_variable_sv() {
                return Ok(());
            }
            let binders: BTreeSet<Name> = stack.iter().cloned().collect();
            let context = matches!(occurrence, Occurrence::Find | Occurrence::Rewrite);
            match self.prefixes.get_mut(sv.name()) {
                Some(existing) if existing.binders != binders => {
                    return Err(ProofError::InvariantViolation(format!(
                        "taclet `{taclet}`: schema variable `{}` occurs with different prefixes",
                        sv.name()
                    )));
                }
                Some(existing) => existing.context &= context,
                None => {
                    self.prefixes.insert(sv.name().clone(), TacletPrefix { binders, context });
                }
            }
            return Ok(());
        }

        let scope = t.binding_scope();
        let mut pushed = 0;
        for b in t.bound_vars() {
            if let BoundVariable::Schema(sv) = b {
                let in_match = matches!(occurrence, Occurrence::Find | Occurrence::Assumes);
                if in_match && !bound_in_match.insert(sv.name().clone()) {
                    return Err(ProofError::InvariantViolation(format!(
                        "taclet `{taclet}`: variable `{}` is bound more than once",
                        sv.name()
                    )));
                }
                stack.push(sv.name().clone());
                pushed += 1;
            }
        }
        for (i, sub) in t.subs().iter().enumerate() {
            if Some(i) == scope || pushed == 0 {
                self.visit(taclet, sub, occurrence, stack, bound_in_match)?;
            } else {
                let inner = stack.split_off(stack.len() - pushed);
                self.visit(taclet, sub, occurrence, stack, bound_in_match)?;
                stack.extend(inner);
            }
        }
        stack.truncate(stack.len() - pushed);
        Ok(())
    }

    pub fn get(&self, sv: &str) -> Option<&TacletPrefix> {
        self.prefixes.get(sv)
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Checks the free variables of every term instantiation against the
    /// prefixes. `context_vars` are the variables bound above the find
    /// position.
    pub fn admits(&self, inst: &SVInstantiations, context_vars: &[LogicVariable]) -> bool {
        let var_of = |name: &Name| -> Option<LogicVariable> {
            inst.term(name).and_then(|t| t.as_logic_variable()).cloned()
        };

        let mut seen: Vec<LogicVariable> = Vec::new();
        for e in inst.iter() {
            if !e.sv.is_variable_sv() {
                continue;
            }
            if let Some(v) = e.value.as_term().and_then(|t| t.as_logic_variable()) {
                if seen.contains(v) {
                    return false;
                }
                seen.push(v.clone());
            }
        }

        for e in inst.iter() {
            let Some(t) = e.value.as_term() else { continue };
            if e.sv.is_variable_sv() || t.is_closed() {
                continue;
            }
            let Some(prefix) = self.prefixes.get(e.sv.name()) else {
                continue;
            };
            let allowed: Vec<LogicVariable> = prefix.binders.iter().filter_map(var_of).collect();
            let ok = t.free_vars().iter().all(|v| {
                allowed.contains(v) || (prefix.context && context_vars.contains(v))
            });
            if !ok {
                return false;
            }
        }
        true
    }
}
