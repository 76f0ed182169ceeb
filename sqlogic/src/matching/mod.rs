//! Matching virtual machine.
//!
//! Role
//! - [`MatchProgram::compile`] turns a rule pattern into a flat list of
//!   [`MatchInstruction`]s by a depth-first walk: per pattern node one
//!   operator check (or a schema variable binding), then the children's
//!   instructions, joined by explicit cursor moves.
//! - [`MatchProgram::run`] interprets the list over a concrete term with a
//!   pre-order cursor, threading [`MatchConditions`] through the steps.
//!
//! A mismatch is `None`. Nothing partial survives a failed run: the
//! conditions are persistent values and the caller's copy is never touched.
//!
//! Bound variables of the pattern are matched through a renaming table
//! (pattern variable to concrete variable) that lives as long as the binder's
//! scope. Variable schema variables are instantiated with the concrete bound
//! variable; the instantiation store rejects a second, different one.
//!
//! Performance
//! - Compile once per rule, run once per candidate position. Sub-patterns
//!   without schema variables compile to a single ground comparison, which
//!   is O(1) on interned terms.
use std::{fmt, sync::Arc};

use im::Vector;
use log::trace;

use crate::{
    inst::{InstantiationValue, SVInstantiations},
    op::{LogicVariable, SchemaVariable},
    services::Services,
    term::Term,
};

mod cursor;
mod generator;
mod instruction;
mod program;

pub use instruction::MatchInstruction;

/// Pattern variable to concrete variable, innermost binder last.
pub type RenameTable = Vector<(LogicVariable, LogicVariable)>;

/// Result of a successful match: instantiations plus the renaming of the
/// pattern's bound variables still in scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchConditions {
    inst: SVInstantiations,
    renaming: RenameTable,
}

impl MatchConditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instantiations(inst: SVInstantiations) -> Self {
        Self {
            inst,
            renaming: RenameTable::new(),
        }
    }

    pub fn instantiations(&self) -> &SVInstantiations {
        &self.inst
    }

    pub fn into_instantiations(self) -> SVInstantiations {
        self.inst
    }

    pub fn renaming(&self) -> &RenameTable {
        &self.renaming
    }

    fn add(
        mut self,
        sv: &Arc<SchemaVariable>,
        value: InstantiationValue,
        services: &Services,
    ) -> Option<Self> {
        match self.inst.add(sv, value, services.sorts()) {
            Ok(inst) => {
                self.inst = inst;
                Some(self)
            }
            Err(e) => {
                trace!("Match rejected: {e}");
                None
            }
        }
    }
}

/// A compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchProgram {
    instructions: Vec<MatchInstruction>,
}

impl MatchProgram {
    pub fn compile(pattern: &Term) -> Self {
        let mut instructions = Vec::new();
        generator::emit(pattern, &mut instructions);
        Self { instructions }
    }

    pub fn instructions(&self) -> &[MatchInstruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Matches `term`, extending `mc`.
    pub fn run(&self, term: &Term, mc: MatchConditions, services: &Services) -> Option<MatchConditions> {
        let mut cursor = cursor::TermCursor::new(term);
        let mut mc = mc;
        for instr in &self.instructions {
            mc = instr.execute(&mut cursor, mc, services)?;
        }
        debug_assert!(cursor.current().is_none());
        Some(mc)
    }
}

impl fmt::Display for MatchProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instr) in self.instructions.iter().enumerate() {
            writeln!(f, "{i:>4}: {instr}")?;
        }
        Ok(())
    }
}

/// Compiles `pattern` and matches it against `term` with empty conditions.
pub fn match_term(pattern: &Term, term: &Term, services: &Services) -> Option<MatchConditions> {
    MatchProgram::compile(pattern).run(term, MatchConditions::new(), services)
}
