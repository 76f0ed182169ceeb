use strum::EnumIs;
use thiserror::Error;

use crate::name::Name;

/// Errors raised while building or instantiating logic objects.
///
/// A failed *match* is never an error: the matcher answers `None`. The variants
/// below describe ill-formed constructions, instantiations that contradict a
/// schema variable's declaration, and front-end (parse) failures.
#[derive(Debug, Clone, PartialEq, Eq, EnumIs, Error)]
pub enum Error {
    #[error("Sort `{name}` is not declared in the sort registry.")]
    UnknownSort { name: Name },

    #[error("Symbol `{name}` is already declared in the {namespace} namespace.")]
    DuplicateSymbol { name: Name, namespace: &'static str },

    #[error("Symbol `{name}` is not declared in the {namespace} namespace.")]
    UnknownSymbol { name: Name, namespace: &'static str },

    #[error("Sort `{name}` is already declared. Sort names must be unique within a registry.")]
    DuplicateSort { name: Name },

    #[error(
        "Parametric sort `{decl}` expects {expected} sort arguments, but {found} were provided."
    )]
    ParametricArity {
        decl: Name,
        expected: usize,
        found: usize,
    },

    #[error("Operator `{op}` expects {expected} sub-terms, but {found} were provided.")]
    ArityMismatch {
        op: String,
        expected: usize,
        found: usize,
    },

    #[error(
        "Argument {index} of operator `{op}` has sort `{found}`, which does not extend the expected sort `{expected}`."
    )]
    IllSortedArgument {
        op: String,
        index: usize,
        expected: Name,
        found: Name,
    },

    #[error(
        "Operator `{op}` binds {found} variables in its sub-terms, but its declaration allows {expected}."
    )]
    BoundVariableMismatch {
        op: String,
        expected: usize,
        found: usize,
    },

    #[error("Schema variable `{sv}` cannot be instantiated with `{value}`: {reason}.")]
    IllegalInstantiation {
        sv: Name,
        value: String,
        reason: String,
    },

    #[error(
        "Schema variable `{sv}` is already instantiated with `{existing}`, refusing the conflicting instantiation `{value}`."
    )]
    ConflictingInstantiation {
        sv: Name,
        existing: String,
        value: String,
    },

    #[error("Schema variable `{sv}` has no instantiation; the pattern cannot be grounded.")]
    Uninstantiated { sv: Name },

    #[error(
        "Generic sort `{sort}` admits several incomparable instantiations {candidates:?}; a forcing condition is required."
    )]
    AmbiguousGenericSort { sort: Name, candidates: Vec<Name> },

    #[error("Generic sort `{sort}` has no instantiation satisfying its conditions.")]
    UnresolvableGenericSort { sort: Name },

    #[error("Program fragment `{fragment}` has no counterpart in the term language.")]
    ProgramConversion { fragment: String },

    #[error("Position {path} does not exist in term `{term}`.")]
    InvalidPosition { path: String, term: String },

    #[error("Failed to parse input:\n{}", messages.join("\n"))]
    Parse { messages: Vec<String> },
}

pub type Result<T> = std::result::Result<T, Error>;
