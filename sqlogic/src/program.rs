//! Program fragments carried by modalities.
//!
//! The language is a small structured imperative core (assignments,
//! conditionals, loops, blocks over integer and boolean expressions). It is a
//! closed enum: every consumer matches exhaustively. Program schema variables
//! appear as [`ProgramElement::Schema`] leaves inside rule patterns.
use std::sync::Arc;

use strum::{Display, EnumIs, EnumIter};

use crate::{
    op::{ProgramVariable, SchemaVariable, SvKind},
    utils::{Error, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum UnaryOp {
    #[strum(serialize = "-")]
    Neg,
    #[strum(serialize = "!")]
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum BinaryOp {
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "==")]
    Eq,
}

impl BinaryOp {
    /// Binding strength, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Mul => 3,
            BinaryOp::Add | BinaryOp::Sub => 2,
            _ => 1,
        }
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum ProgramElement {
    Block(Vec<ProgramElement>),
    Assign {
        lhs: Box<ProgramElement>,
        rhs: Box<ProgramElement>,
    },
    If {
        cond: Box<ProgramElement>,
        then_branch: Box<ProgramElement>,
        else_branch: Option<Box<ProgramElement>>,
    },
    While {
        cond: Box<ProgramElement>,
        body: Box<ProgramElement>,
    },
    Skip,
    Variable(ProgramVariable),
    IntLiteral(i64),
    BoolLiteral(bool),
    Unary {
        op: UnaryOp,
        operand: Box<ProgramElement>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<ProgramElement>,
        rhs: Box<ProgramElement>,
    },
    Schema(Arc<SchemaVariable>),
}

/// What a program schema variable stands for when a pattern is grounded.
#[derive(Debug, Clone, Copy)]
pub enum ProgramFill<'a> {
    One(&'a ProgramElement),
    Many(&'a [ProgramElement]),
}

impl ProgramElement {
    pub fn empty_block() -> Self {
        ProgramElement::Block(Vec::new())
    }

    /// Whether this element can stand in statement position.
    pub fn is_statement(&self) -> bool {
        match self {
            ProgramElement::Block(_)
            | ProgramElement::Assign { .. }
            | ProgramElement::If { .. }
            | ProgramElement::While { .. }
            | ProgramElement::Skip => true,
            ProgramElement::Schema(sv) => matches!(
                sv.kind(),
                SvKind::Statement | SvKind::StatementList
            ),
            _ => false,
        }
    }

    pub fn is_expression(&self) -> bool {
        match self {
            ProgramElement::Variable(_)
            | ProgramElement::IntLiteral(_)
            | ProgramElement::BoolLiteral(_)
            | ProgramElement::Unary { .. }
            | ProgramElement::Binary { .. } => true,
            ProgramElement::Schema(sv) => matches!(
                sv.kind(),
                SvKind::ProgramVariable | SvKind::Expression
            ),
            _ => false,
        }
    }

    /// Variables and literals: expressions without evaluation side conditions.
    pub fn is_simple_expression(&self) -> bool {
        matches!(
            self,
            ProgramElement::Variable(_)
                | ProgramElement::IntLiteral(_)
                | ProgramElement::BoolLiteral(_)
        )
    }

    /// Statements of a block, or the element itself as a one-element slice.
    pub fn statements(&self) -> &[ProgramElement] {
        match self {
            ProgramElement::Block(stmts) => stmts,
            other => std::slice::from_ref(other),
        }
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&ProgramElement> {
        match self {
            ProgramElement::Block(stmts) => stmts.iter().collect(),
            ProgramElement::Assign { lhs, rhs } => vec![lhs, rhs],
            ProgramElement::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let mut out: Vec<&ProgramElement> = vec![cond, then_branch];
                if let Some(e) = else_branch {
                    out.push(e);
                }
                out
            }
            ProgramElement::While { cond, body } => vec![cond, body],
            ProgramElement::Unary { operand, .. } => vec![operand],
            ProgramElement::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            ProgramElement::Skip
            | ProgramElement::Variable(_)
            | ProgramElement::IntLiteral(_)
            | ProgramElement::BoolLiteral(_)
            | ProgramElement::Schema(_) => Vec::new(),
        }
    }

    pub fn contains_schema(&self) -> bool {
        match self {
            ProgramElement::Schema(_) => true,
            other => other.children().into_iter().any(ProgramElement::contains_schema),
        }
    }

    /// Program variables written by assignments anywhere in this fragment.
    pub fn assigned_variables(&self) -> Vec<ProgramVariable> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            if let ProgramElement::Assign { lhs, .. } = current {
                if let ProgramElement::Variable(v) = lhs.as_ref() {
                    if !out.contains(v) {
                        out.push(v.clone());
                    }
                }
            }
            stack.extend(current.children());
        }
        out
    }

    /// Grounds a program pattern.
    ///
    /// Statement-list schema variables are spliced into the surrounding block;
    /// every other schema variable is replaced by exactly one element.
    pub fn instantiate<'a>(
        &self,
        fill: &dyn Fn(&Arc<SchemaVariable>) -> Option<ProgramFill<'a>>,
    ) -> Result<ProgramElement> {
        let boxed = |e: &ProgramElement| e.instantiate(fill).map(Box::new);
        Ok(match self {
            ProgramElement::Block(stmts) => {
                let mut out = Vec::with_capacity(stmts.len());
                for s in stmts {
                    match s {
                        ProgramElement::Schema(sv) => match fill(sv) {
                            Some(ProgramFill::Many(many)) => out.extend(many.iter().cloned()),
                            Some(ProgramFill::One(one)) => out.push(one.clone()),
                            None => return Err(Error::Uninstantiated { sv: sv.name().clone() }),
                        },
                        other => out.push(other.instantiate(fill)?),
                    }
                }
                ProgramElement::Block(out)
            }
            ProgramElement::Schema(sv) => match fill(sv) {
                Some(ProgramFill::One(one)) => one.clone(),
                Some(ProgramFill::Many(many)) => ProgramElement::Block(many.to_vec()),
                None => return Err(Error::Uninstantiated { sv: sv.name().clone() }),
            },
            ProgramElement::Assign { lhs, rhs } => ProgramElement::Assign {
                lhs: boxed(lhs)?,
                rhs: boxed(rhs)?,
            },
            ProgramElement::If {
                cond,
                then_branch,
                else_branch,
            } => ProgramElement::If {
                cond: boxed(cond)?,
                then_branch: boxed(then_branch)?,
                else_branch: else_branch.as_deref().map(boxed).transpose()?,
            },
            ProgramElement::While { cond, body } => ProgramElement::While {
                cond: boxed(cond)?,
                body: boxed(body)?,
            },
            ProgramElement::Unary { op, operand } => ProgramElement::Unary {
                op: *op,
                operand: boxed(operand)?,
            },
            ProgramElement::Binary { op, lhs, rhs } => ProgramElement::Binary {
                op: *op,
                lhs: boxed(lhs)?,
                rhs: boxed(rhs)?,
            },
            leaf @ (ProgramElement::Skip
            | ProgramElement::Variable(_)
            | ProgramElement::IntLiteral(_)
            | ProgramElement::BoolLiteral(_)) => leaf.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::Sort;

    #[test]
    fn statement_lists_are_spliced() {
        let x = ProgramVariable::new("x", Sort::any());
        let rest = SchemaVariable::new("#rest", SvKind::StatementList, Sort::any());
        let pattern = ProgramElement::Block(vec![
            ProgramElement::Skip,
            ProgramElement::Schema(rest.clone()),
        ]);
        let body = vec![
            ProgramElement::Assign {
                lhs: Box::new(ProgramElement::Variable(x.clone())),
                rhs: Box::new(ProgramElement::IntLiteral(1)),
            },
            ProgramElement::Skip,
        ];
        let out = pattern
            .instantiate(&|sv| (sv == &rest).then_some(ProgramFill::Many(&body)))
            .unwrap();
        assert_eq!(out.statements().len(), 3);
        assert_eq!(out.assigned_variables(), vec![x]);
    }
}
