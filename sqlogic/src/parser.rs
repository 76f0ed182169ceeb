//! Concrete syntax front-end.
//!
//! Role
//! - Tokenizes and parses terms, sequents, updates, programs and sorts into
//!   an arena-allocated syntax tree, then resolves names against a
//!   [`Services`] instance to build validated [`Term`]s.
//!
//! Names inside terms resolve in this order: variables bound by an enclosing
//! quantifier or substitution, schema variables, program variables, function
//! symbols. An unresolved name is reported with its source range.
//!
//! Precedence, loosest first: `<->`, `->` (right associative), `|`, `&`,
//! prefix operators (`!`, quantifiers, updates, substitutions, modalities),
//! `=`, label suffixes `t<<l>>`, atoms.
//!
//! Performance
//! - Lexing and parsing are linear on typical input; syntax nodes live in a
//!   [`typed_arena::Arena`] dropped once resolution is done.
use std::fmt;

use chumsky::{input::ValueInput, prelude::*, recursive::Indirect};
use typed_arena::Arena;

use crate::{
    name::Name,
    op::{BoundVariable, Junctor, LogicVariable, ModalityKind, ModalityRef, Quantifier, SvKind},
    program::{BinaryOp, ProgramElement, UnaryOp},
    sequent::{Semisequent, Sequent, SequentFormula},
    services::Services,
    sort::Sort,
    term::{Term, TermLabel},
    utils::{Error, Result},
};

pub type Span = SimpleSpan;
pub type Spanned<T> = (T, Span);

type Extra<'a> = extra::Err<Rich<'a, Token, Span>>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Token {
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semi,
    /// `:=`
    Assign,
    /// `||`
    Parallel,
    Not,
    And,
    Or,
    Imp,
    Equiv,
    Eq,
    EqEq,
    /// `==>`
    SeqArrow,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    DiamondOpen,
    DiamondClose,
    BoxOpen,
    BoxClose,
    LabelOpen,
    LabelClose,
    SortArgsOpen,
    SortArgsClose,
    PathSep,
    Forall,
    Exists,
    If,
    Then,
    Else,
    Subst,
    Skip,
    Modality,
    EndModality,
    True,
    False,
    KwIf,
    KwElse,
    KwWhile,
    KwSkip,
    Ident(String),
    Int(i64),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Comma => ",",
            Token::Semi => ";",
            Token::Assign => ":=",
            Token::Parallel => "||",
            Token::Not => "!",
            Token::And => "&",
            Token::Or => "|",
            Token::Imp => "->",
            Token::Equiv => "<->",
            Token::Eq => "=",
            Token::EqEq => "==",
            Token::SeqArrow => "==>",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::DiamondOpen => "<{",
            Token::DiamondClose => "}>",
            Token::BoxOpen => "[{",
            Token::BoxClose => "}]",
            Token::LabelOpen => "<<",
            Token::LabelClose => ">>",
            Token::SortArgsOpen => "<[",
            Token::SortArgsClose => "]>",
            Token::PathSep => "::",
            Token::Forall => "\\forall",
            Token::Exists => "\\exists",
            Token::If => "\\if",
            Token::Then => "\\then",
            Token::Else => "\\else",
            Token::Subst => "\\subst",
            Token::Skip => "\\skip",
            Token::Modality => "\\modality",
            Token::EndModality => "\\endmodality",
            Token::True => "true",
            Token::False => "false",
            Token::KwIf => "if",
            Token::KwElse => "else",
            Token::KwWhile => "while",
            Token::KwSkip => "skip",
            Token::Ident(s) => return write!(f, "{s}"),
            Token::Int(i) => return write!(f, "{i}"),
        };
        write!(f, "{s}")
    }
}

fn lexer<'src>() -> impl Parser<'src, &'src str, Vec<Spanned<Token>>, extra::Err<Rich<'src, char>>> {
    let int = text::int(10).try_map(|s: &str, span| {
        s.parse::<i64>()
            .map(Token::Int)
            .map_err(|e| Rich::custom(span, format!("invalid integer literal `{s}`: {e}")))
    });

    let keyword = just('\\')
        .ignore_then(text::ascii::ident())
        .try_map(|kw: &str, span| match kw {
            "forall" => Ok(Token::Forall),
            "exists" => Ok(Token::Exists),
            "if" => Ok(Token::If),
            "then" => Ok(Token::Then),
            "else" => Ok(Token::Else),
            "subst" => Ok(Token::Subst),
            "skip" => Ok(Token::Skip),
            "modality" => Ok(Token::Modality),
            "endmodality" => Ok(Token::EndModality),
            _ => Err(Rich::custom(span, format!("unknown keyword `\\{kw}`"))),
        });

    // Longest match first.
    let compound = choice((
        just("==>").to(Token::SeqArrow),
        just("<->").to(Token::Equiv),
        just("<{").to(Token::DiamondOpen),
        just("<[").to(Token::SortArgsOpen),
        just("<<").to(Token::LabelOpen),
        just("<=").to(Token::Le),
        just("->").to(Token::Imp),
        just("]>").to(Token::SortArgsClose),
        just("}>").to(Token::DiamondClose),
        just("}]").to(Token::BoxClose),
        just("[{").to(Token::BoxOpen),
        just(">>").to(Token::LabelClose),
        just(">=").to(Token::Ge),
        just("::").to(Token::PathSep),
        just(":=").to(Token::Assign),
        just("||").to(Token::Parallel),
        just("==").to(Token::EqEq),
    ));

    let single = choice((
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('{').to(Token::LBrace),
        just('}').to(Token::RBrace),
        just(',').to(Token::Comma),
        just(';').to(Token::Semi),
        just('!').to(Token::Not),
        just('&').to(Token::And),
        just('|').to(Token::Or),
        just('=').to(Token::Eq),
        just('<').to(Token::Lt),
        just('>').to(Token::Gt),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
    ));

    let ident = any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_' || *c == '#')
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
                .repeated(),
        )
        .to_slice()
        .map(|s: &str| match s {
            "true" => Token::True,
            "false" => Token::False,
            "if" => Token::KwIf,
            "else" => Token::KwElse,
            "while" => Token::KwWhile,
            "skip" => Token::KwSkip,
            _ => Token::Ident(s.to_string()),
        });

    let comment = just("//")
        .then(any().and_is(just('\n').not()).repeated())
        .padded();

    choice((keyword, compound, single, int, ident))
        .map_with(|tok, e| (tok, e.span()))
        .padded_by(comment.repeated())
        .padded()
        .repeated()
        .collect()
        .then_ignore(end())
}

// ---------------- syntax tree ----------------

#[derive(Debug, Clone)]
struct SortAst {
    name: Name,
    args: Vec<SortAst>,
}

#[derive(Debug, Clone)]
struct Binder {
    sort: Option<SortAst>,
    name: Name,
}

#[derive(Debug, Clone)]
struct LabelAst {
    name: Name,
    params: Vec<Name>,
}

#[derive(Debug, Clone)]
enum ModalityAst {
    Concrete(ModalityKind),
    Schema(Name),
}

#[derive(Debug)]
struct Node<'a> {
    kind: Ast<'a>,
    span: Span,
}

#[derive(Debug, Clone)]
enum Ast<'a> {
    True,
    False,
    Int(i64),
    Not(&'a Node<'a>),
    Binary(Junctor, &'a Node<'a>, &'a Node<'a>),
    Equals(&'a Node<'a>, &'a Node<'a>),
    Quantified {
        q: Quantifier,
        binder: Binder,
        body: &'a Node<'a>,
    },
    Subst {
        binder: Binder,
        replacement: &'a Node<'a>,
        target: &'a Node<'a>,
    },
    Apply {
        update: &'a Node<'a>,
        target: &'a Node<'a>,
    },
    Modality {
        kind: ModalityAst,
        program: Vec<&'a PNode<'a>>,
        post: &'a Node<'a>,
    },
    Ite(&'a Node<'a>, &'a Node<'a>, &'a Node<'a>),
    Call {
        name: Name,
        sort_args: Option<Vec<SortAst>>,
        args: Vec<&'a Node<'a>>,
    },
    SortDependent {
        sort: SortAst,
        name: Name,
        args: Vec<&'a Node<'a>>,
    },
    Labeled(&'a Node<'a>, Vec<LabelAst>),
    Elementary {
        lhs: Name,
        value: &'a Node<'a>,
    },
    Parallel(&'a Node<'a>, &'a Node<'a>),
    Skip,
}

#[derive(Debug)]
struct PNode<'a> {
    kind: PAst<'a>,
    span: Span,
}

#[derive(Debug, Clone)]
enum PAst<'a> {
    Block(Vec<&'a PNode<'a>>),
    Assign(&'a PNode<'a>, &'a PNode<'a>),
    If(&'a PNode<'a>, &'a PNode<'a>, Option<&'a PNode<'a>>),
    While(&'a PNode<'a>, &'a PNode<'a>),
    Skip,
    /// An identifier in statement position: a statement schema variable.
    Placeholder(Name),
    Ident(Name),
    Int(i64),
    Bool(bool),
    Unary(UnaryOp, &'a PNode<'a>),
    Binary(BinaryOp, &'a PNode<'a>, &'a PNode<'a>),
}

fn join<'a>(a: &Node<'a>, b: &Node<'a>) -> Span {
    (a.span.start..b.span.end).into()
}

fn pjoin<'a>(a: &PNode<'a>, b: &PNode<'a>) -> Span {
    (a.span.start..b.span.end).into()
}

// ---------------- chumsky parsers over tokens ----------------

fn ident<'a, I>() -> impl Parser<'a, I, Name, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = Span>,
{
    select! { Token::Ident(s) => Name::from(s) }.labelled("identifier")
}

fn sort_parser<'a, I>() -> impl Parser<'a, I, SortAst, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = Span>,
{
    recursive(|sort| {
        ident()
            .then(
                sort.separated_by(just(Token::Comma))
                    .at_least(1)
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::SortArgsOpen), just(Token::SortArgsClose))
                    .or_not(),
            )
            .map(|(name, args)| SortAst {
                name,
                args: args.unwrap_or_default(),
            })
            .labelled("sort")
    })
}

fn program_parser<'a, I>(
    arena: &'a Arena<PNode<'a>>,
) -> impl Parser<'a, I, Vec<&'a PNode<'a>>, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = Span>,
{
    let node = move |kind: PAst<'a>, span: Span| -> &'a PNode<'a> { arena.alloc(PNode { kind, span }) };

    let expr = recursive(|expr| {
        let atom = choice((
            select! {
                Token::Int(i) => PAst::Int(i),
                Token::True => PAst::Bool(true),
                Token::False => PAst::Bool(false),
                Token::Ident(s) => PAst::Ident(Name::from(s)),
            }
            .map_with(move |kind, e| node(kind, e.span())),
            expr.delimited_by(just(Token::LParen), just(Token::RParen)),
        ))
        .labelled("expression");

        let unary = recursive(|unary| {
            choice((
                just(Token::Minus)
                    .ignore_then(select! { Token::Int(i) => i })
                    .map_with(move |i: i64, e| node(PAst::Int(-i), e.span())),
                choice((
                    just(Token::Not).to(UnaryOp::Not),
                    just(Token::Minus).to(UnaryOp::Neg),
                ))
                .then(unary)
                .map_with(move |(op, operand), e| node(PAst::Unary(op, operand), e.span())),
                atom,
            ))
        });

        let product = unary.clone().foldl(
            just(Token::Star).to(BinaryOp::Mul).then(unary).repeated(),
            move |a, (op, b)| node(PAst::Binary(op, a, b), pjoin(a, b)),
        );

        let sum = product.clone().foldl(
            choice((
                just(Token::Plus).to(BinaryOp::Add),
                just(Token::Minus).to(BinaryOp::Sub),
            ))
            .then(product)
            .repeated(),
            move |a, (op, b)| node(PAst::Binary(op, a, b), pjoin(a, b)),
        );

        let comparison = choice((
            just(Token::Lt).to(BinaryOp::Lt),
            just(Token::Le).to(BinaryOp::Le),
            just(Token::Gt).to(BinaryOp::Gt),
            just(Token::Ge).to(BinaryOp::Ge),
            just(Token::EqEq).to(BinaryOp::Eq),
        ));

        sum.clone()
            .then(comparison.then(sum).or_not())
            .map(move |(a, rest)| match rest {
                Some((op, b)) => node(PAst::Binary(op, a, b), pjoin(a, b)),
                None => a,
            })
    });

    let statement = recursive(|statement| {
        let block = statement
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map_with(move |stmts, e| node(PAst::Block(stmts), e.span()));

        let target = ident().map_with(move |name, e| node(PAst::Ident(name), e.span()));
        let assign = target
            .then_ignore(just(Token::Eq))
            .then(expr.clone())
            .then_ignore(just(Token::Semi))
            .map_with(move |(lhs, rhs), e| node(PAst::Assign(lhs, rhs), e.span()));

        let condition = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let if_ = just(Token::KwIf)
            .ignore_then(condition.clone())
            .then(block.clone())
            .then(just(Token::KwElse).ignore_then(block.clone()).or_not())
            .map_with(move |((cond, then), otherwise), e| {
                node(PAst::If(cond, then, otherwise), e.span())
            });

        let while_ = just(Token::KwWhile)
            .ignore_then(condition)
            .then(block.clone())
            .map_with(move |(cond, body), e| node(PAst::While(cond, body), e.span()));

        let skip = just(Token::KwSkip)
            .then(just(Token::Semi))
            .map_with(move |_, e| node(PAst::Skip, e.span()));

        let placeholder = ident()
            .then_ignore(just(Token::Semi))
            .map_with(move |name, e| node(PAst::Placeholder(name), e.span()));

        choice((assign, if_, while_, block, skip, placeholder)).labelled("statement")
    });

    statement.repeated().collect()
}

type TermParser<'a, I> = Recursive<Indirect<'a, 'a, I, &'a Node<'a>, Extra<'a>>>;

/// Term and update parsers, which are mutually recursive.
fn term_parsers<'a, I>(
    nodes: &'a Arena<Node<'a>>,
    programs: &'a Arena<PNode<'a>>,
) -> (TermParser<'a, I>, TermParser<'a, I>)
where
    I: ValueInput<'a, Token = Token, Span = Span>,
{
    let node = move |kind: Ast<'a>, span: Span| -> &'a Node<'a> { nodes.alloc(Node { kind, span }) };

    let mut term: TermParser<'a, I> = Recursive::declare();
    let mut update: TermParser<'a, I> = Recursive::declare();

    let sort = sort_parser();
    let args = term
        .clone()
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen))
        .or_not()
        .map(Option::unwrap_or_default);
    let sort_args = sort
        .clone()
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect::<Vec<_>>()
        .delimited_by(just(Token::SortArgsOpen), just(Token::SortArgsClose));
    let paren = term
        .clone()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let literal = choice((
        just(Token::True).to(Ast::True),
        just(Token::False).to(Ast::False),
        select! { Token::Int(i) => Ast::Int(i) },
        just(Token::Minus)
            .ignore_then(select! { Token::Int(i) => i })
            .map(|i: i64| Ast::Int(-i)),
    ))
    .map_with(move |kind, e| node(kind, e.span()));

    let ite = just(Token::If)
        .ignore_then(paren.clone())
        .then_ignore(just(Token::Then))
        .then(paren.clone())
        .then_ignore(just(Token::Else))
        .then(paren.clone())
        .map_with(move |((c, a), b), e| node(Ast::Ite(c, a, b), e.span()));

    let sort_dependent = sort
        .clone()
        .then_ignore(just(Token::PathSep))
        .then(ident())
        .then(args.clone())
        .map_with(move |((sort, name), args), e| {
            node(Ast::SortDependent { sort, name, args }, e.span())
        });

    let call = ident()
        .then(sort_args.or_not())
        .then(args)
        .map_with(move |((name, sort_args), args), e| {
            node(
                Ast::Call {
                    name,
                    sort_args,
                    args,
                },
                e.span(),
            )
        });

    let atom = choice((literal, ite, paren, sort_dependent, call)).labelled("term");

    let label = ident()
        .then(
            ident()
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen))
                .or_not(),
        )
        .map(|(name, params)| LabelAst {
            name,
            params: params.unwrap_or_default(),
        });
    let labels = label
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LabelOpen), just(Token::LabelClose));

    let postfix = atom
        .then(labels.or_not())
        .map_with(move |(t, labels), e| match labels {
            Some(labels) => node(Ast::Labeled(t, labels), e.span()),
            None => t,
        });

    let equality = postfix
        .clone()
        .then(just(Token::Eq).ignore_then(postfix).or_not())
        .map(move |(a, b)| match b {
            Some(b) => node(Ast::Equals(a, b), join(a, b)),
            None => a,
        });

    let binder = choice((
        sort.then(ident()).map(|(sort, name)| Binder {
            sort: Some(sort),
            name,
        }),
        ident().map(|name| Binder { sort: None, name }),
    ))
    .labelled("binder");

    let program = program_parser(programs);

    let prefix = recursive(|prefix| {
        let not = just(Token::Not)
            .ignore_then(prefix.clone())
            .map_with(move |t, e| node(Ast::Not(t), e.span()));

        let quantified = choice((
            just(Token::Forall).to(Quantifier::All),
            just(Token::Exists).to(Quantifier::Ex),
        ))
        .then(binder.clone())
        .then_ignore(just(Token::Semi))
        .then(prefix.clone())
        .map_with(move |((q, binder), body), e| {
            node(Ast::Quantified { q, binder, body }, e.span())
        });

        let subst = just(Token::LBrace)
            .ignore_then(just(Token::Subst))
            .ignore_then(binder)
            .then_ignore(just(Token::Semi))
            .then(term.clone())
            .then_ignore(just(Token::RBrace))
            .then(prefix.clone())
            .map_with(move |((binder, replacement), target), e| {
                node(
                    Ast::Subst {
                        binder,
                        replacement,
                        target,
                    },
                    e.span(),
                )
            });

        let apply = update
            .clone()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .then(prefix.clone())
            .map_with(move |(update, target), e| node(Ast::Apply { update, target }, e.span()));

        let modality = |open: Token, close: Token, kind: ModalityKind| {
            program
                .clone()
                .delimited_by(just(open), just(close))
                .then(prefix.clone())
                .map_with(move |(program, post), e| {
                    node(
                        Ast::Modality {
                            kind: ModalityAst::Concrete(kind),
                            program,
                            post,
                        },
                        e.span(),
                    )
                })
        };
        let diamond = modality(Token::DiamondOpen, Token::DiamondClose, ModalityKind::Diamond);
        let boxed = modality(Token::BoxOpen, Token::BoxClose, ModalityKind::Box);

        let schematic = just(Token::Modality)
            .ignore_then(ident().delimited_by(just(Token::LBrace), just(Token::RBrace)))
            .then(
                program
                    .clone()
                    .delimited_by(just(Token::LBrace), just(Token::RBrace)),
            )
            .then_ignore(just(Token::EndModality))
            .then(prefix.clone())
            .map_with(move |((sv, program), post), e| {
                node(
                    Ast::Modality {
                        kind: ModalityAst::Schema(sv),
                        program,
                        post,
                    },
                    e.span(),
                )
            });

        choice((not, quantified, subst, apply, diamond, boxed, schematic, equality))
    });

    let and = prefix.clone().foldl(
        just(Token::And).ignore_then(prefix).repeated(),
        move |a, b| node(Ast::Binary(Junctor::And, a, b), join(a, b)),
    );
    let or = and.clone().foldl(
        just(Token::Or).ignore_then(and).repeated(),
        move |a, b| node(Ast::Binary(Junctor::Or, a, b), join(a, b)),
    );
    let imp = recursive(|imp| {
        or.clone()
            .then(just(Token::Imp).ignore_then(imp).or_not())
            .map(move |(a, b)| match b {
                Some(b) => node(Ast::Binary(Junctor::Imp, a, b), join(a, b)),
                None => a,
            })
    });
    let equiv = imp.clone().foldl(
        just(Token::Equiv).ignore_then(imp).repeated(),
        move |a, b| node(Ast::Binary(Junctor::Equiv, a, b), join(a, b)),
    );
    term.define(equiv.labelled("formula"));

    let elementary = recursive(|elementary| {
        choice((
            just(Token::Skip).map_with(move |_, e| node(Ast::Skip, e.span())),
            ident()
                .then_ignore(just(Token::Assign))
                .then(term.clone())
                .map_with(move |(lhs, value), e| node(Ast::Elementary { lhs, value }, e.span())),
            update
                .clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
            update
                .clone()
                .delimited_by(just(Token::LBrace), just(Token::RBrace))
                .then(elementary)
                .map_with(move |(update, target), e| {
                    node(Ast::Apply { update, target }, e.span())
                }),
            ident().map_with(move |name, e| {
                node(
                    Ast::Call {
                        name,
                        sort_args: None,
                        args: Vec::new(),
                    },
                    e.span(),
                )
            }),
        ))
        .labelled("update")
    });
    update.define(elementary.clone().foldl(
        just(Token::Parallel).ignore_then(elementary).repeated(),
        move |a, b| node(Ast::Parallel(a, b), join(a, b)),
    ));

    (term, update)
}

// ---------------- name resolution ----------------

struct Diagnostic {
    span: Span,
    message: String,
}

type Resolved<T> = std::result::Result<T, Diagnostic>;

fn diag<T>(span: Span, message: impl fmt::Display) -> Resolved<T> {
    Err(Diagnostic {
        span,
        message: message.to_string(),
    })
}

trait AtSpan<T> {
    fn at(self, span: Span) -> Resolved<T>;
}

impl<T> AtSpan<T> for Result<T> {
    fn at(self, span: Span) -> Resolved<T> {
        self.map_err(|e| Diagnostic {
            span,
            message: e.to_string(),
        })
    }
}

struct Resolver<'s> {
    services: &'s Services,
    scope: Vec<BoundVariable>,
}

impl<'s> Resolver<'s> {
    fn new(services: &'s Services) -> Self {
        Self {
            services,
            scope: Vec::new(),
        }
    }

    fn sort(&self, s: &SortAst, span: Span) -> Resolved<Sort> {
        let registry = self.services.sorts();
        if s.args.is_empty() {
            return registry.get(&s.name).at(span);
        }
        let args = s
            .args
            .iter()
            .map(|a| self.sort(a, span))
            .collect::<Resolved<Vec<_>>>()?;
        registry.instantiate_parametric(&s.name, args).at(span)
    }

    fn binder(&self, b: &Binder, span: Span) -> Resolved<BoundVariable> {
        if let Some(sort) = &b.sort {
            let sort = self.sort(sort, span)?;
            return Ok(BoundVariable::Logic(LogicVariable::new(b.name.clone(), sort)));
        }
        match self.services.schema_variable(&b.name) {
            Some(sv) if sv.is_variable_sv() => Ok(BoundVariable::Schema(sv)),
            Some(_) => diag(
                span,
                format!("schema variable `{}` cannot be used as a binder", b.name),
            ),
            None => diag(span, format!("bound variable `{}` needs a sort", b.name)),
        }
    }

    fn scoped(&mut self, bv: BoundVariable, body: &Node<'_>) -> Resolved<Term> {
        self.scope.push(bv);
        let result = self.term(body);
        self.scope.pop();
        result
    }

    fn term(&mut self, n: &Node<'_>) -> Resolved<Term> {
        let services = self.services;
        let tb = services.tb();
        let span = n.span;
        match &n.kind {
            Ast::True => tb.tt().at(span),
            Ast::False => tb.ff().at(span),
            Ast::Int(i) => services.int_literal(*i).at(span),
            Ast::Not(t) => {
                let t = self.term(t)?;
                tb.not(t).at(span)
            }
            Ast::Binary(j, a, b) => {
                let (a, b) = (self.term(a)?, self.term(b)?);
                match j {
                    Junctor::And => tb.and(a, b),
                    Junctor::Or => tb.or(a, b),
                    Junctor::Imp => tb.imp(a, b),
                    _ => tb.equiv(a, b),
                }
                .at(span)
            }
            Ast::Equals(a, b) => {
                let (a, b) = (self.term(a)?, self.term(b)?);
                tb.equals(a, b).at(span)
            }
            Ast::Ite(c, a, b) => {
                let (c, a, b) = (self.term(c)?, self.term(a)?, self.term(b)?);
                tb.ite(c, a, b).at(span)
            }
            Ast::Quantified { q, binder, body } => {
                let bv = self.binder(binder, span)?;
                let body = self.scoped(bv.clone(), body)?;
                tb.quantify(*q, bv, body).at(span)
            }
            Ast::Subst {
                binder,
                replacement,
                target,
            } => {
                let bv = self.binder(binder, span)?;
                let replacement = self.term(replacement)?;
                let target = self.scoped(bv.clone(), target)?;
                tb.subst(bv, replacement, target).at(span)
            }
            Ast::Apply { update, target } => {
                let update = self.term(update)?;
                let target = self.term(target)?;
                tb.apply(update, target).at(span)
            }
            Ast::Modality {
                kind,
                program,
                post,
            } => {
                let kind = match kind {
                    ModalityAst::Concrete(k) => ModalityRef::Concrete(*k),
                    ModalityAst::Schema(name) => match services.schema_variable(name) {
                        Some(sv) if sv.is_modality_sv() => ModalityRef::Schema(sv),
                        _ => return diag(span, format!("`{name}` is not a modality schema variable")),
                    },
                };
                let program = program
                    .iter()
                    .map(|s| self.statement(s))
                    .collect::<Resolved<Vec<_>>>()?;
                let post = self.term(post)?;
                tb.modality_with(kind, ProgramElement::Block(program), post)
                    .at(span)
            }
            Ast::Labeled(t, labels) => {
                let t = self.term(t)?;
                let mut resolved: Vec<TermLabel> = t.labels().to_vec();
                for l in labels {
                    let label = match services.schema_variable(&l.name) {
                        Some(sv) if sv.is_label_sv() && l.params.is_empty() => TermLabel::Schema(sv),
                        _ => TermLabel::with_params(l.name.clone(), l.params.iter().cloned()),
                    };
                    resolved.push(label);
                }
                tb.labeled(&t, resolved).at(span)
            }
            Ast::Elementary { lhs, value } => {
                let value = self.term(value)?;
                if let Some(sv) = services.schema_variable(lhs) {
                    return match sv.kind() {
                        SvKind::ProgramVariable => tb.elementary_sv(&sv, value).at(span),
                        _ => diag(
                            span,
                            format!("schema variable `{lhs}` cannot be assigned by an update"),
                        ),
                    };
                }
                match services.program_variable(lhs) {
                    Some(pv) => tb.elementary(&pv, value).at(span),
                    None => diag(span, format!("unknown program variable `{lhs}`")),
                }
            }
            Ast::Parallel(a, b) => {
                let (a, b) = (self.term(a)?, self.term(b)?);
                tb.parallel(a, b).at(span)
            }
            Ast::Skip => tb.skip().at(span),
            Ast::SortDependent { sort, name, args } => {
                let sort = self.sort(sort, span)?;
                let f = services.parametric_function(name, &[sort]).at(span)?;
                let args = self.terms(args)?;
                tb.parametric(&f, args).at(span)
            }
            Ast::Call {
                name,
                sort_args: Some(sorts),
                args,
            } => {
                let sorts = sorts
                    .iter()
                    .map(|s| self.sort(s, span))
                    .collect::<Resolved<Vec<_>>>()?;
                let f = services.parametric_function(name, &sorts).at(span)?;
                let args = self.terms(args)?;
                tb.parametric(&f, args).at(span)
            }
            Ast::Call {
                name,
                sort_args: None,
                args,
            } => {
                if args.is_empty() {
                    if let Some(bv) = self.scope.iter().rev().find(|b| b.name() == name) {
                        return match bv {
                            BoundVariable::Logic(v) => tb.var(v),
                            BoundVariable::Schema(sv) => tb.sv(sv),
                        }
                        .at(span);
                    }
                    if let Some(sv) = services.schema_variable(name) {
                        if !sv.is_term_position() {
                            return diag(span, format!("schema variable `{name}` cannot occur as a term"));
                        }
                        return tb.sv(&sv).at(span);
                    }
                    if let Some(pv) = services.program_variable(name) {
                        return tb.pv(&pv).at(span);
                    }
                }
                match services.function(name) {
                    Some(f) => {
                        let args = self.terms(args)?;
                        tb.func(&f, args).at(span)
                    }
                    None => diag(span, format!("unknown symbol `{name}`")),
                }
            }
        }
    }

    fn terms(&mut self, nodes: &[&Node<'_>]) -> Resolved<Vec<Term>> {
        nodes.iter().map(|n| self.term(n)).collect()
    }

    fn statement(&self, s: &PNode<'_>) -> Resolved<ProgramElement> {
        let span = s.span;
        Ok(match &s.kind {
            PAst::Block(stmts) => ProgramElement::Block(
                stmts
                    .iter()
                    .map(|s| self.statement(s))
                    .collect::<Resolved<Vec<_>>>()?,
            ),
            PAst::Assign(lhs, rhs) => {
                let lhs = self.expression(lhs)?;
                let assignable = match &lhs {
                    ProgramElement::Variable(_) => true,
                    ProgramElement::Schema(sv) => sv.kind().is_program_variable(),
                    _ => false,
                };
                if !assignable {
                    return diag(span, format!("`{lhs}` is not assignable"));
                }
                ProgramElement::Assign {
                    lhs: Box::new(lhs),
                    rhs: Box::new(self.expression(rhs)?),
                }
            }
            PAst::If(cond, then, otherwise) => ProgramElement::If {
                cond: Box::new(self.expression(cond)?),
                then_branch: Box::new(self.statement(then)?),
                else_branch: match otherwise {
                    Some(o) => Some(Box::new(self.statement(o)?)),
                    None => None,
                },
            },
            PAst::While(cond, body) => ProgramElement::While {
                cond: Box::new(self.expression(cond)?),
                body: Box::new(self.statement(body)?),
            },
            PAst::Skip => ProgramElement::Skip,
            PAst::Placeholder(name) => match self.services.schema_variable(name) {
                Some(sv) if matches!(sv.kind(), SvKind::Statement | SvKind::StatementList) => {
                    ProgramElement::Schema(sv)
                }
                _ => return diag(span, format!("`{name}` is not a statement schema variable")),
            },
            _ => return diag(span, "expected a statement"),
        })
    }

    fn expression(&self, e: &PNode<'_>) -> Resolved<ProgramElement> {
        let span = e.span;
        Ok(match &e.kind {
            PAst::Int(i) => ProgramElement::IntLiteral(*i),
            PAst::Bool(b) => ProgramElement::BoolLiteral(*b),
            PAst::Ident(name) => {
                if let Some(sv) = self.services.schema_variable(name) {
                    if !sv.is_program_sv() {
                        return diag(span, format!("`{name}` is not a program schema variable"));
                    }
                    ProgramElement::Schema(sv)
                } else if let Some(pv) = self.services.program_variable(name) {
                    ProgramElement::Variable(pv)
                } else {
                    return diag(span, format!("unknown program variable `{name}`"));
                }
            }
            PAst::Unary(op, operand) => ProgramElement::Unary {
                op: *op,
                operand: Box::new(self.expression(operand)?),
            },
            PAst::Binary(op, lhs, rhs) => ProgramElement::Binary {
                op: *op,
                lhs: Box::new(self.expression(lhs)?),
                rhs: Box::new(self.expression(rhs)?),
            },
            _ => return diag(span, "expected an expression"),
        })
    }
}

// ---------------- public API ----------------

fn lex(src: &str) -> Result<Vec<Spanned<Token>>> {
    let (tokens, errors) = lexer().parse(src).into_output_errors();
    if !errors.is_empty() {
        return Err(Error::Parse {
            messages: errors
                .into_iter()
                .map(|e| format!("lexing error: {e}"))
                .collect(),
        });
    }
    tokens.ok_or_else(|| Error::Parse {
        messages: vec!["lexing error: no input".into()],
    })
}

/// Maps a span over token indices back to byte offsets in the source.
fn source_span(tokens: &[Spanned<Token>], span: Span) -> Span {
    let eof = tokens.last().map_or(0, |(_, s)| s.end);
    let start = tokens.get(span.start).map_or(eof, |(_, s)| s.start);
    let end = span
        .end
        .checked_sub(1)
        .and_then(|i| tokens.get(i))
        .map_or(start, |(_, s)| s.end)
        .max(start);
    (start..end).into()
}

fn syntax_errors(tokens: &[Spanned<Token>], errors: Vec<Rich<'_, Token, Span>>) -> Error {
    Error::Parse {
        messages: errors
            .into_iter()
            .map(|e| {
                let at = source_span(tokens, *e.span());
                format!("parse error at {}..{}: {}", at.start, at.end, e.reason())
            })
            .collect(),
    }
}

fn resolution_error(tokens: &[Spanned<Token>], d: Diagnostic) -> Error {
    let at = source_span(tokens, d.span);
    Error::Parse {
        messages: vec![format!("at {}..{}: {}", at.start, at.end, d.message)],
    }
}

/// Runs `$parser` over the lexed `$tokens` and resolves the output with `$resolve`.
macro_rules! parse_with {
    ($tokens:expr, |$nodes:ident, $programs:ident| $parser:expr, |$out:ident| $resolve:expr) => {{
        let tokens = $tokens;
        let plain: Vec<Token> = tokens.iter().map(|(t, _)| t.clone()).collect();
        let $nodes: Arena<Node<'_>> = Arena::new();
        let $programs: Arena<PNode<'_>> = Arena::new();
        let (output, errors) = $parser
            .then_ignore(end())
            .parse(plain.as_slice())
            .into_output_errors();
        if !errors.is_empty() {
            return Err(syntax_errors(&tokens, errors));
        }
        let Some($out) = output else {
            return Err(Error::Parse {
                messages: vec!["parse error: empty input".into()],
            });
        };
        let resolve = || -> Resolved<_> { $resolve };
        resolve().map_err(|d| resolution_error(&tokens, d))
    }};
}

/// Parses a term or formula.
///
/// ```
/// use sqlogic::{parser::parse_term, services::Services};
/// let services = Services::default();
/// let t = parse_term(&services, "true & !false").unwrap();
/// assert!(t.is_formula());
/// ```
pub fn parse_term(services: &Services, src: &str) -> Result<Term> {
    parse_with!(lex(src)?, |nodes, programs| term_parsers(&nodes, &programs).0, |ast| {
        Resolver::new(services).term(ast)
    })
}

/// Parses a formula; terms of other sorts are rejected.
pub fn parse_formula(services: &Services, src: &str) -> Result<Term> {
    let t = parse_term(services, src)?;
    if !t.is_formula() {
        return Err(Error::Parse {
            messages: vec![format!("`{src}` is not a formula (sort `{}`)", t.sort())],
        });
    }
    Ok(t)
}

/// Parses an update such as `x := 1 || y := x`.
pub fn parse_update(services: &Services, src: &str) -> Result<Term> {
    let t = parse_with!(lex(src)?, |nodes, programs| term_parsers(&nodes, &programs).1, |ast| {
        Resolver::new(services).term(ast)
    })?;
    if !t.sort().is_update() {
        return Err(Error::Parse {
            messages: vec![format!("`{src}` is not an update")],
        });
    }
    Ok(t)
}

/// Parses a sequent `a, b ==> c`.
pub fn parse_sequent(services: &Services, src: &str) -> Result<Sequent> {
    parse_with!(
        lex(src)?,
        |nodes, programs| {
            let (term, _) = term_parsers(&nodes, &programs);
            let formulas = term.separated_by(just(Token::Comma)).collect::<Vec<_>>();
            formulas
                .clone()
                .then_ignore(just(Token::SeqArrow))
                .then(formulas)
        },
        |sides| {
            let (antecedent, succedent) = sides;
            let mut resolver = Resolver::new(services);
            let mut side = |nodes: &[&Node<'_>]| -> Resolved<Semisequent> {
                let mut semi = Semisequent::new();
                for n in nodes {
                    let f = resolver.term(n)?;
                    let f = SequentFormula::new(f).at(n.span)?;
                    let len = semi.len();
                    semi = semi.insert(len, f).result;
                }
                Ok(semi)
            };
            let antecedent = side(&antecedent)?;
            let succedent = side(&succedent)?;
            Ok(Sequent::new(antecedent, succedent))
        }
    )
}

/// Parses a statement sequence into a [`ProgramElement::Block`].
pub fn parse_program(services: &Services, src: &str) -> Result<ProgramElement> {
    parse_with!(lex(src)?, |_nodes, programs| program_parser(&programs), |stmts| {
        let resolver = Resolver::new(services);
        stmts
            .iter()
            .map(|s| resolver.statement(s))
            .collect::<Resolved<Vec<_>>>()
            .map(ProgramElement::Block)
    })
}

/// Parses a sort expression such as `int` or `Seq<[int]>`.
pub fn parse_sort(services: &Services, src: &str) -> Result<Sort> {
    parse_with!(lex(src)?, |_nodes, _programs| sort_parser().map_with(|s, e| (s, e.span())), |sort| {
        let (sort, span) = sort;
        Resolver::new(services).sort(&sort, span)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexed(src: &str) -> Vec<Token> {
        lex(src).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn lexer_prefers_longest_tokens() {
        assert_eq!(
            lexed("a ==> b <-> c -> d <= e"),
            vec![
                Token::Ident("a".into()),
                Token::SeqArrow,
                Token::Ident("b".into()),
                Token::Equiv,
                Token::Ident("c".into()),
                Token::Imp,
                Token::Ident("d".into()),
                Token::Le,
                Token::Ident("e".into()),
            ]
        );
        assert_eq!(
            lexed("<{ x = 1; }> [{ }] f<<l>>"),
            vec![
                Token::DiamondOpen,
                Token::Ident("x".into()),
                Token::Eq,
                Token::Int(1),
                Token::Semi,
                Token::DiamondClose,
                Token::BoxOpen,
                Token::BoxClose,
                Token::Ident("f".into()),
                Token::LabelOpen,
                Token::Ident("l".into()),
                Token::LabelClose,
            ]
        );
    }

    #[test]
    fn lexer_handles_keywords_and_comments() {
        assert_eq!(
            lexed("\\forall x; // trailing\n #v"),
            vec![
                Token::Forall,
                Token::Ident("x".into()),
                Token::Semi,
                Token::Ident("#v".into()),
            ]
        );
        assert!(lex("\\nonsense").is_err());
    }

    #[test]
    fn source_spans_cover_tokens() {
        let tokens = lex("ab  cd").unwrap();
        let span = source_span(&tokens, (1..2).into());
        assert_eq!((span.start, span.end), (4, 6));
        let eof = source_span(&tokens, (2..2).into());
        assert_eq!((eof.start, eof.end), (6, 6));
    }

    #[test]
    fn unknown_symbols_report_their_position() {
        let services = Services::default();
        let err = parse_term(&services, "true & mystery").unwrap_err();
        let Error::Parse { messages } = err else {
            panic!("expected a parse error");
        };
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("7..14"), "{}", messages[0]);
        assert!(messages[0].contains("mystery"));
    }

    #[test]
    fn unknown_symbols_in_sequents_report_their_position() {
        let services = Services::default();
        let err = parse_sequent(&services, "true ==> false, mystery").unwrap_err();
        let Error::Parse { messages } = err else {
            panic!("expected a parse error");
        };
        assert!(messages[0].contains("16..23"), "{}", messages[0]);
        let seq = parse_sequent(&services, "true ==> false").unwrap();
        assert_eq!(seq.to_string(), "true ==> false");
    }

    #[test]
    fn implication_is_right_associative() {
        let services = Services::default();
        let t = parse_term(&services, "true -> false -> true").unwrap();
        assert_eq!(t.sub(0), &services.tb().tt().unwrap());
        assert!(t.sub(1).op().is_junctor());
    }
}
