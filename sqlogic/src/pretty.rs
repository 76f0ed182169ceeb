//! RcDoc-based pretty-printer with termcolor annotations for terms, sequents
//! and programs.
//!
//! Role
//! - Convert logic objects into annotated documents suitable for width-aware
//!   rendering, in exactly the concrete syntax [`crate::parser`] reads back.
//! - Provide colored output for terminals (TTY-aware) and plain strings for
//!   logs and tests. `Display` of [`Term`], [`Sequent`] and
//!   [`ProgramElement`] goes through this module.
//!
//! Bound variables that would be confused with another variable occurring
//! free in the same scope are printed as `x_0`, `x_1`, ...
//!
//! Performance
//! - Building the doc is O(n) in term size; rendering respects line widths
//!   with linear-time layout in the size of the resulting document.
use std::{
    fmt,
    io::{self, Write},
};

use pretty::{FmtWrite, RcDoc, RenderAnnotated};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::{
    op::{BoundVariable, Junctor, LogicVariable, ModalityKind, ModalityRef, Operator, SvKind, UpdateTarget},
    program::{ProgramElement, UnaryOp},
    sequent::{Semisequent, Sequent, SequentFormula},
    term::{Term, TermLabel},
};

/// Styles used to annotate parts of the pretty-printed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Punct, // commas, semicolons, `:=`, `==>`
    /// Parentheses are colored by nesting depth so matching pairs share a color.
    Paren(u8),
    Keyword,  // \forall, \if, \skip, if, while
    Operator, // &, |, ->, <->, =, !
    Ident,    // variables and function symbols
    Schema,   // schema variables
    Sort,
    Label,
}

impl Style {
    fn to_color_spec(self) -> ColorSpec {
        let mut s = ColorSpec::new();
        match self {
            Style::Punct => {
                s.set_dimmed(true);
            }
            Style::Paren(depth) => {
                let fg = match depth % 6 {
                    0 => Color::Blue,
                    1 => Color::Green,
                    2 => Color::White,
                    3 => Color::Yellow,
                    4 => Color::Red,
                    _ => Color::Magenta,
                };
                s.set_fg(Some(fg)).set_dimmed(true);
            }
            Style::Keyword => {
                s.set_fg(Some(Color::Cyan)).set_bold(true);
            }
            Style::Operator => {
                s.set_fg(Some(Color::Yellow)).set_bold(true);
            }
            Style::Ident => {
                s.set_fg(Some(Color::Green));
            }
            Style::Schema => {
                s.set_fg(Some(Color::Red)).set_italic(true);
            }
            Style::Sort => {
                s.set_fg(Some(Color::Magenta));
            }
            Style::Label => {
                s.set_fg(Some(Color::Blue)).set_dimmed(true);
            }
        }
        s
    }
}

type Doc = RcDoc<'static, Style>;

fn styled(style: Style, s: impl ToString) -> Doc {
    RcDoc::text(s.to_string()).annotate(style)
}

fn punct(s: &'static str) -> Doc {
    styled(Style::Punct, s)
}

#[inline]
fn lparen(depth: u8) -> Doc {
    RcDoc::as_string("(").annotate(Style::Paren(depth))
}

#[inline]
fn rparen(depth: u8) -> Doc {
    RcDoc::as_string(")").annotate(Style::Paren(depth))
}

fn parenthesized(doc: Doc, depth: u8) -> Doc {
    lparen(depth).append(doc).append(rparen(depth))
}

fn kw(s: &'static str) -> Doc {
    styled(Style::Keyword, s)
}

fn op(s: &'static str) -> Doc {
    styled(Style::Operator, s)
}

fn ident(s: impl ToString) -> Doc {
    styled(Style::Ident, s)
}

fn comma_separated(docs: Vec<Doc>) -> Doc {
    RcDoc::intersperse(docs, punct(",").append(RcDoc::space()))
}

const EQUIV: u8 = 1;
const IMP: u8 = 2;
const OR: u8 = 3;
const AND: u8 = 4;
const PREFIX: u8 = 5;
const EQUALS: u8 = 6;
const LABELED: u8 = 7;
const ATOM: u8 = 8;

/// Binding strength of the term's root, ignoring labels.
fn calculate_precedence(t: &Term) -> u8 {
    match t.op() {
        Operator::Junctor(Junctor::Equiv) => EQUIV,
        Operator::Junctor(Junctor::Imp) => IMP,
        Operator::Junctor(Junctor::Or) => OR,
        Operator::Junctor(Junctor::And) => AND,
        Operator::Junctor(Junctor::Not)
        | Operator::Quantifier(_)
        | Operator::Substitution
        | Operator::Modality(_) => PREFIX,
        Operator::UpdateApplication if t.sort().is_update() => EQUIV,
        Operator::UpdateApplication => PREFIX,
        Operator::Equals => EQUALS,
        Operator::ElementaryUpdate(_) | Operator::ParallelUpdate => EQUIV,
        _ => ATOM,
    }
}

/// Quantifiers, substitutions, modalities and update applications whose
/// scope ends wherever their body ends.
fn opens_scope(t: &Term) -> bool {
    match t.op() {
        Operator::Quantifier(_) | Operator::Substitution | Operator::Modality(_) => true,
        Operator::UpdateApplication => !t.sort().is_update(),
        _ => false,
    }
}

fn precedence(t: &Term) -> u8 {
    if t.has_labels() {
        LABELED.min(calculate_precedence(t))
    } else {
        calculate_precedence(t)
    }
}

#[derive(Default)]
struct Printer {
    /// Printed names of the logic variables bound at the current position.
    bound: Vec<(LogicVariable, String)>,
    /// Set while printing the left operand of a binary operator.
    left_operand: bool,
}

impl Printer {
    fn var_name(&self, v: &LogicVariable) -> String {
        self.bound
            .iter()
            .rev()
            .find(|(b, _)| b == v)
            .map_or_else(|| v.name().to_string(), |(_, n)| n.clone())
    }

    /// Chooses a printed name for `v` that no other variable free in `body` uses.
    fn bind(&mut self, v: &LogicVariable, body: &Term) -> String {
        let clashes = |printer: &Printer, candidate: &str| {
            body.free_vars()
                .iter()
                .any(|u| u != v && printer.var_name(u) == candidate)
        };
        let base = v.name().as_str();
        let mut name = base.to_string();
        let mut counter = 0usize;
        while clashes(self, &name) {
            name = format!("{base}_{counter}");
            counter += 1;
        }
        self.bound.push((v.clone(), name.clone()));
        name
    }

    fn binder(&mut self, bv: &BoundVariable, body: &Term) -> (Doc, bool) {
        match bv {
            BoundVariable::Logic(v) => {
                let name = self.bind(v, body);
                let doc = styled(Style::Sort, v.sort().name())
                    .append(RcDoc::space())
                    .append(ident(name));
                (doc, true)
            }
            BoundVariable::Schema(sv) => (styled(Style::Schema, sv.name()), false),
        }
    }

    /// Prints a part that sits between delimiters, where no operator follows it.
    fn enclosed(&mut self, print: impl FnOnce(&mut Self) -> Doc) -> Doc {
        let left_operand = std::mem::replace(&mut self.left_operand, false);
        let doc = print(self);
        self.left_operand = left_operand;
        doc
    }

    fn term(&mut self, t: &Term, min: u8, depth: u8) -> Doc {
        // A binder followed by an operator would read as scoping over it.
        if precedence(t) < min || (self.left_operand && opens_scope(t)) {
            let inner = self.enclosed(|p| p.term(t, 0, depth + 1));
            return parenthesized(inner, depth);
        }
        if !t.has_labels() {
            return self.core(t, depth);
        }
        let core = if calculate_precedence(t) < ATOM {
            let inner = self.enclosed(|p| p.core(t, depth + 1));
            parenthesized(inner, depth)
        } else {
            self.core(t, depth)
        };
        let labels = t.labels().iter().map(label).collect();
        core.append(styled(Style::Label, "<<"))
            .append(comma_separated(labels))
            .append(styled(Style::Label, ">>"))
    }

    fn binary(&mut self, a: &Term, symbol: &'static str, b: &Term, mins: (u8, u8), depth: u8) -> Doc {
        let left_operand = std::mem::replace(&mut self.left_operand, true);
        let left = self.term(a, mins.0, depth);
        self.left_operand = left_operand;
        left.append(RcDoc::line())
            .append(op(symbol))
            .append(RcDoc::space())
            .append(self.term(b, mins.1, depth))
            .group()
    }

    fn args(&mut self, t: &Term, depth: u8) -> Doc {
        if t.arity() == 0 {
            return RcDoc::nil();
        }
        let args = self.enclosed(|p| {
            let args = t.subs().iter().map(|s| p.term(s, 0, depth + 1)).collect();
            comma_separated(args)
        });
        parenthesized(args, depth).group()
    }

    fn core(&mut self, t: &Term, depth: u8) -> Doc {
        match t.op() {
            Operator::Junctor(Junctor::True) => kw("true"),
            Operator::Junctor(Junctor::False) => kw("false"),
            Operator::Junctor(Junctor::Not) => op("!").append(self.term(t.sub(0), PREFIX, depth)),
            Operator::Junctor(Junctor::And) => self.binary(t.sub(0), "&", t.sub(1), (AND, PREFIX), depth),
            Operator::Junctor(Junctor::Or) => self.binary(t.sub(0), "|", t.sub(1), (OR, AND), depth),
            Operator::Junctor(Junctor::Imp) => self.binary(t.sub(0), "->", t.sub(1), (OR, IMP), depth),
            Operator::Junctor(Junctor::Equiv) => {
                self.binary(t.sub(0), "<->", t.sub(1), (EQUIV, IMP), depth)
            }
            Operator::Equals => self.binary(t.sub(0), "=", t.sub(1), (LABELED, LABELED), depth),
            Operator::Quantifier(q) => {
                let (binder, pushed) = self.binder(&t.bound_vars()[0], t.sub(0));
                let body = self.term(t.sub(0), PREFIX, depth);
                if pushed {
                    self.bound.pop();
                }
                styled(Style::Keyword, q)
                    .append(RcDoc::space())
                    .append(binder)
                    .append(punct(";"))
                    .append(RcDoc::line())
                    .append(body)
                    .nest(2)
                    .group()
            }
            Operator::Substitution => {
                let replacement = self.enclosed(|p| p.term(t.sub(0), 0, depth));
                let (binder, pushed) = self.binder(&t.bound_vars()[0], t.sub(1));
                let target = self.term(t.sub(1), PREFIX, depth);
                if pushed {
                    self.bound.pop();
                }
                punct("{")
                    .append(kw("\\subst"))
                    .append(RcDoc::space())
                    .append(binder)
                    .append(punct(";"))
                    .append(RcDoc::space())
                    .append(replacement)
                    .append(punct("}"))
                    .append(target)
                    .group()
            }
            Operator::IfThenElse => kw("\\if")
                .append(RcDoc::space())
                .append(parenthesized(self.enclosed(|p| p.term(t.sub(0), 0, depth + 1)), depth))
                .append(RcDoc::line())
                .append(kw("\\then"))
                .append(RcDoc::space())
                .append(parenthesized(self.enclosed(|p| p.term(t.sub(1), 0, depth + 1)), depth))
                .append(RcDoc::line())
                .append(kw("\\else"))
                .append(RcDoc::space())
                .append(parenthesized(self.enclosed(|p| p.term(t.sub(2), 0, depth + 1)), depth))
                .group()
                .nest(2),
            Operator::Function(f) => ident(f.name()).append(self.args(t, depth)),
            Operator::Parametric(f) => ident(f).append(self.args(t, depth)),
            Operator::LogicVariable(v) => ident(self.var_name(v)),
            Operator::ProgramVariable(v) => ident(v.name()),
            Operator::SchemaVariable(sv) => styled(Style::Schema, sv.name()),
            Operator::UpdateApplication if t.sort().is_update() => self.update(t, depth),
            Operator::UpdateApplication => punct("{")
                .append(self.enclosed(|p| p.update(t.sub(0), depth)))
                .append(punct("}"))
                .append(self.term(t.sub(1), PREFIX, depth))
                .group(),
            Operator::ElementaryUpdate(_) | Operator::ParallelUpdate | Operator::SkipUpdate => {
                self.update(t, depth)
            }
            Operator::Modality(m) => {
                let program = block_contents(&m.program, depth);
                let open = match &m.kind {
                    ModalityRef::Concrete(ModalityKind::Diamond) => punct("<{"),
                    ModalityRef::Concrete(ModalityKind::Box) => punct("[{"),
                    ModalityRef::Schema(sv) => kw("\\modality")
                        .append(punct("{"))
                        .append(styled(Style::Schema, sv.name()))
                        .append(punct("}"))
                        .append(punct("{")),
                };
                let close = match &m.kind {
                    ModalityRef::Concrete(ModalityKind::Diamond) => punct("}>"),
                    ModalityRef::Concrete(ModalityKind::Box) => punct("}]"),
                    ModalityRef::Schema(_) => punct("}").append(kw("\\endmodality")),
                };
                open.append(program)
                    .append(close)
                    .append(RcDoc::space())
                    .append(self.term(t.sub(0), PREFIX, depth))
                    .group()
            }
        }
    }

    /// Updates use their own grammar: `||` is left associative and binds
    /// loosest, `{u} u'` applies an update to an update.
    fn update(&mut self, u: &Term, depth: u8) -> Doc {
        match u.op() {
            Operator::ElementaryUpdate(target) => {
                let lhs = match target {
                    UpdateTarget::Variable(v) => ident(v.name()),
                    UpdateTarget::Schema(sv) => styled(Style::Schema, sv.name()),
                };
                lhs.append(RcDoc::space())
                    .append(punct(":="))
                    .append(RcDoc::space())
                    .append(self.term(u.sub(0), 0, depth))
            }
            Operator::ParallelUpdate => self
                .update(u.sub(0), depth)
                .append(RcDoc::line())
                .append(op("||"))
                .append(RcDoc::space())
                .append(self.update_operand(u.sub(1), depth))
                .group(),
            Operator::SkipUpdate => kw("\\skip"),
            Operator::UpdateApplication => punct("{")
                .append(self.update(u.sub(0), depth))
                .append(punct("}"))
                .append(self.update_operand(u.sub(1), depth)),
            _ => self.term(u, ATOM, depth),
        }
    }

    fn update_operand(&mut self, u: &Term, depth: u8) -> Doc {
        if u.op().is_parallel_update() {
            parenthesized(self.update(u, depth + 1), depth)
        } else {
            self.update(u, depth)
        }
    }
}

fn label(l: &TermLabel) -> Doc {
    match l {
        TermLabel::Named { .. } => styled(Style::Label, l),
        TermLabel::Schema(sv) => styled(Style::Schema, sv.name()),
    }
}

// ---------------- programs ----------------

fn expression_precedence(e: &ProgramElement) -> u8 {
    match e {
        ProgramElement::Binary { op, .. } => op.precedence(),
        _ => 4,
    }
}

fn expression(e: &ProgramElement, depth: u8) -> Doc {
    match e {
        ProgramElement::Variable(v) => ident(v.name()),
        ProgramElement::IntLiteral(i) => RcDoc::as_string(i),
        ProgramElement::BoolLiteral(b) => kw(if *b { "true" } else { "false" }),
        ProgramElement::Schema(sv) => styled(Style::Schema, sv.name()),
        ProgramElement::Unary { op: o, operand } => {
            let symbol = match o {
                UnaryOp::Neg => op("-"),
                UnaryOp::Not => op("!"),
            };
            let atomic = matches!(
                operand.as_ref(),
                ProgramElement::Variable(_)
                    | ProgramElement::BoolLiteral(_)
                    | ProgramElement::Schema(_)
                    | ProgramElement::Unary { .. }
            );
            if atomic {
                symbol.append(expression(operand, depth))
            } else {
                symbol.append(parenthesized(expression(operand, depth + 1), depth))
            }
        }
        ProgramElement::Binary { op: o, lhs, rhs } => {
            let p = o.precedence();
            let lhs_parens = expression_precedence(lhs) < p
                || (o.is_comparison() && expression_precedence(lhs) == p);
            let rhs_parens = expression_precedence(rhs) <= p;
            let side = |e: &ProgramElement, parens: bool| {
                if parens {
                    parenthesized(expression(e, depth + 1), depth)
                } else {
                    expression(e, depth)
                }
            };
            side(lhs, lhs_parens)
                .append(RcDoc::space())
                .append(styled(Style::Operator, o))
                .append(RcDoc::space())
                .append(side(rhs, rhs_parens))
        }
        statement => program(statement, depth),
    }
}

fn block(p: &ProgramElement, depth: u8) -> Doc {
    punct("{").append(block_contents(p, depth)).append(punct("}"))
}

/// Statements of a block, padded by one space on each side.
fn block_contents(p: &ProgramElement, depth: u8) -> Doc {
    let statements: Vec<Doc> = match p {
        ProgramElement::Block(stmts) => stmts.iter().map(|s| program(s, depth)).collect(),
        other => vec![program(other, depth)],
    };
    if statements.is_empty() {
        return RcDoc::space();
    }
    RcDoc::line()
        .append(RcDoc::intersperse(statements, RcDoc::line()))
        .nest(2)
        .append(RcDoc::line())
        .group()
}

fn program(p: &ProgramElement, depth: u8) -> Doc {
    match p {
        ProgramElement::Block(_) => block(p, depth),
        ProgramElement::Assign { lhs, rhs } => expression(lhs, depth)
            .append(RcDoc::space())
            .append(punct("="))
            .append(RcDoc::space())
            .append(expression(rhs, depth))
            .append(punct(";")),
        ProgramElement::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let doc = kw("if")
                .append(RcDoc::space())
                .append(parenthesized(expression(cond, depth + 1), depth))
                .append(RcDoc::space())
                .append(block(then_branch, depth));
            match else_branch {
                Some(e) => doc
                    .append(RcDoc::space())
                    .append(kw("else"))
                    .append(RcDoc::space())
                    .append(block(e, depth)),
                None => doc,
            }
        }
        ProgramElement::While { cond, body } => kw("while")
            .append(RcDoc::space())
            .append(parenthesized(expression(cond, depth + 1), depth))
            .append(RcDoc::space())
            .append(block(body, depth)),
        ProgramElement::Skip => kw("skip").append(punct(";")),
        ProgramElement::Schema(sv) if matches!(sv.kind(), SvKind::Statement | SvKind::StatementList) => {
            styled(Style::Schema, sv.name()).append(punct(";"))
        }
        e => expression(e, depth),
    }
}

// ---------------- sequents ----------------

fn semisequent(printer: &mut Printer, s: &Semisequent) -> Doc {
    let formulas = s
        .iter()
        .map(|f| printer.term(f.formula(), 0, 0))
        .collect();
    comma_separated(formulas)
}

fn sequent(s: &Sequent) -> Doc {
    let mut printer = Printer::default();
    let antecedent = semisequent(&mut printer, s.antecedent());
    let succedent = semisequent(&mut printer, s.succedent());
    let arrow = if s.antecedent().is_empty() {
        punct("==>")
    } else {
        RcDoc::line().append(punct("==>"))
    };
    let arrow = if s.succedent().is_empty() {
        arrow
    } else {
        arrow.append(RcDoc::space())
    };
    antecedent.append(arrow).append(succedent).group()
}

// A writer that maps Style annotations to termcolor ColorSpec on a WriteColor sink.
struct ColorWriter<'w, W: WriteColor + Write> {
    out: &'w mut W,
}

impl<'a, 'w, W: WriteColor + Write> RenderAnnotated<'a, Style> for ColorWriter<'w, W> {
    fn push_annotation(&mut self, ann: &'a Style) -> io::Result<()> {
        self.out.set_color(&ann.to_color_spec())
    }
    fn pop_annotation(&mut self) -> io::Result<()> {
        self.out.reset()
    }
}

impl<'w, W: WriteColor + Write> pretty::Render for ColorWriter<'w, W> {
    type Error = io::Error;
    fn write_str(&mut self, s: &str) -> io::Result<usize> {
        self.out.write_all(s.as_bytes())?;
        Ok(s.len())
    }
    fn write_str_all(&mut self, s: &str) -> io::Result<()> {
        self.out.write_all(s.as_bytes())
    }
    fn fail_doc(&self) -> Self::Error {
        io::Error::other("render failed")
    }
}

/// Render a document to a `termcolor::WriteColor` with width-aware layout.
fn render_to<W: WriteColor + Write>(doc: &Doc, width: usize, out: &mut W) -> io::Result<()> {
    let mut cw = ColorWriter { out };
    doc.render_raw(width, &mut cw)
}

/// Retrieve the width of the terminal, or 80 if it cannot be determined.
fn terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

/// Objects with a document representation.
pub trait ToDoc {
    fn to_doc(&self) -> RcDoc<'static, Style>;
}

impl ToDoc for Term {
    fn to_doc(&self) -> Doc {
        Printer::default().term(self, 0, 0)
    }
}

impl ToDoc for SequentFormula {
    fn to_doc(&self) -> Doc {
        self.formula().to_doc()
    }
}

impl ToDoc for Sequent {
    fn to_doc(&self) -> Doc {
        sequent(self)
    }
}

impl ToDoc for ProgramElement {
    fn to_doc(&self) -> Doc {
        program(self, 0)
    }
}

/// ======================== Trait impls =========================
/// Pretty-printing conveniences for anything with a document representation.
pub trait PrettyPrint {
    /// Render with colors to any termcolor writer at the given width.
    fn pretty_render_to<W: WriteColor + Write>(&self, width: usize, out: &mut W) -> io::Result<()>;

    /// Print to stdout with colors (TTY-aware), at auto-detected width (or 80 if not a TTY).
    fn pretty_print(&self) -> io::Result<()>;

    /// Format into a plain string (no colors) at the given width.
    fn pretty_string(&self, width: usize) -> String;
}

impl<T: ToDoc> PrettyPrint for T {
    #[inline]
    fn pretty_render_to<W: WriteColor + Write>(&self, width: usize, out: &mut W) -> io::Result<()> {
        render_to(&self.to_doc(), width, out)
    }

    fn pretty_print(&self) -> io::Result<()> {
        let stdout = StandardStream::stdout(ColorChoice::Auto);
        let mut stdout = stdout.lock();
        render_to(&self.to_doc(), terminal_width(), &mut stdout)
    }

    fn pretty_string(&self, width: usize) -> String {
        let mut buf = String::new();
        let _ = self.to_doc().render_fmt(width, &mut buf);
        buf
    }
}

/// `Display` keeps everything on one line unless a term is huge.
const DISPLAY_WIDTH: usize = 1 << 16;

macro_rules! impl_display_via_doc {
    ($($t:ty),*) => {
        $(
            impl fmt::Display for $t {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    let mut w = FmtWrite::new(f);
                    self.to_doc().render_raw(DISPLAY_WIDTH, &mut w)
                }
            }
        )*
    };
}

impl_display_via_doc!(Term, SequentFormula, Sequent, ProgramElement);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        op::{Function, ProgramVariable, Quantifier},
        program::BinaryOp,
        services::Services,
        sort::{Sort, SortDeclaration},
    };

    fn int_services() -> (Services, Sort) {
        let services = Services::default();
        let int = services
            .sorts()
            .declare(SortDeclaration::new("int"))
            .unwrap();
        (services, int)
    }

    #[test]
    fn junctors_print_with_minimal_parentheses() {
        let (services, _) = int_services();
        let tb = services.tb();
        let p = services
            .declare_function(Function::new("p", Sort::formula(), []))
            .unwrap();
        let q = services
            .declare_function(Function::new("q", Sort::formula(), []))
            .unwrap();
        let (p, q) = (tb.func(&p, []).unwrap(), tb.func(&q, []).unwrap());

        let left = tb.imp(tb.imp(p.clone(), q.clone()).unwrap(), p.clone()).unwrap();
        assert_eq!(left.to_string(), "(p -> q) -> p");
        let right = tb.imp(p.clone(), tb.imp(q.clone(), p.clone()).unwrap()).unwrap();
        assert_eq!(right.to_string(), "p -> q -> p");
        let mixed = tb.and(tb.or(p.clone(), q.clone()).unwrap(), tb.not(p.clone()).unwrap()).unwrap();
        assert_eq!(mixed.to_string(), "(p | q) & !p");
        let negated = tb.not(tb.and(p.clone(), q).unwrap()).unwrap();
        assert_eq!(negated.to_string(), "!(p & q)");
    }

    #[test]
    fn clashing_binders_are_renamed() {
        let (services, int) = int_services();
        let tb = services.tb();
        let lt = services
            .declare_function(Function::new("lt", Sort::formula(), [int.clone(), int.clone()]))
            .unwrap();
        let outer = LogicVariable::new("x", int.clone());
        let inner = LogicVariable::new("x", int);
        let body = tb
            .func(&lt, [tb.var(&outer).unwrap(), tb.var(&inner).unwrap()])
            .unwrap();
        let t = tb
            .all(&outer, tb.quantify(Quantifier::Ex, BoundVariable::Logic(inner), body).unwrap())
            .unwrap();
        assert_eq!(t.to_string(), "\\forall int x; \\exists int x_0; lt(x, x_0)");
    }

    #[test]
    fn shadowing_without_capture_keeps_names() {
        let (services, int) = int_services();
        let tb = services.tb();
        let p = services
            .declare_function(Function::new("p", Sort::formula(), [int.clone()]))
            .unwrap();
        let outer = LogicVariable::new("x", int.clone());
        let inner = LogicVariable::new("x", int);
        let body = tb.func(&p, [tb.var(&inner).unwrap()]).unwrap();
        let t = tb.all(&outer, tb.all(&inner, body).unwrap()).unwrap();
        assert_eq!(t.to_string(), "\\forall int x; \\forall int x; p(x)");
    }

    #[test]
    fn updates_and_modalities() {
        let (services, int) = int_services();
        let tb = services.tb();
        let i = ProgramVariable::new("i", int.clone());
        let j = ProgramVariable::new("j", int);
        let one = services.int_literal(1).unwrap();
        let update = tb
            .parallel(
                tb.elementary(&i, one.clone()).unwrap(),
                tb.parallel(tb.elementary(&j, one.clone()).unwrap(), tb.skip().unwrap())
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(update.to_string(), "i := 1 || (j := 1 || \\skip)");

        let assign = ProgramElement::Assign {
            lhs: Box::new(ProgramElement::Variable(i.clone())),
            rhs: Box::new(ProgramElement::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(ProgramElement::Variable(j.clone())),
                rhs: Box::new(ProgramElement::IntLiteral(-1)),
            }),
        };
        let post = tb.equals(tb.pv(&i).unwrap(), one).unwrap();
        let boxed = tb.modality(ModalityKind::Box, vec![assign], post).unwrap();
        let applied = tb.apply(tb.elementary(&j, tb.pv(&i).unwrap()).unwrap(), boxed).unwrap();
        assert_eq!(applied.to_string(), "{j := i}[{ i = j + -1; }] i = 1");
    }

    #[test]
    fn program_expressions_keep_their_grouping() {
        let int = Sort::any();
        let x = ProgramElement::Variable(ProgramVariable::new("x", int));
        let bin = |op, l: ProgramElement, r: ProgramElement| ProgramElement::Binary {
            op,
            lhs: Box::new(l),
            rhs: Box::new(r),
        };
        let e = bin(
            BinaryOp::Sub,
            x.clone(),
            bin(BinaryOp::Sub, x.clone(), ProgramElement::IntLiteral(1)),
        );
        assert_eq!(e.to_string(), "x - (x - 1)");
        let e = bin(
            BinaryOp::Mul,
            bin(BinaryOp::Add, x.clone(), x.clone()),
            ProgramElement::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(ProgramElement::IntLiteral(2)),
            },
        );
        assert_eq!(e.to_string(), "(x + x) * -(2)");
    }

    #[test]
    fn labels_follow_their_term() {
        let (services, int) = int_services();
        let tb = services.tb();
        let c = services
            .declare_function(Function::new("c", int, []))
            .unwrap();
        let t = tb
            .labeled(
                &tb.func(&c, []).unwrap(),
                [TermLabel::named("origin"), TermLabel::with_params("step", ["s1".into()])],
            )
            .unwrap();
        assert_eq!(t.to_string(), "c<<origin, step(s1)>>");
        let eq = tb.equals(t.clone(), t).unwrap();
        assert_eq!(eq.to_string(), "c<<origin, step(s1)>> = c<<origin, step(s1)>>");
    }
}
