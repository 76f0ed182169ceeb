//! Sqlogic: sorted first-order dynamic logic for sequent-calculus provers.
//!
//! The crate holds everything a rule engine needs to talk about formulas:
//! sorts with generic and parametric sorts, operators and schema variables,
//! immutable interned terms, sequents with change tracking, and the compiled
//! matcher that instantiates rule patterns against concrete terms.
//!
//! Layout
//!  - [`sort`], [`op`], [`term`], [`program`]: the data model.
//!  - [`sequent`]: semisequents, sequents and positions of sub-terms in them.
//!  - [`namespace`], [`services`]: symbol tables and the per-proof environment.
//!  - [`inst`], [`matching`]: schema variable instantiations and the matcher.
//!  - [`update`]: helpers used by update simplification rules.
//!  - [`parser`], [`pretty`]: concrete syntax, both directions.
//!
//! Example
//! ```
//! use sqlogic::{parser::parse_term, services::Services, sort::SortDeclaration};
//! use sqlogic::op::{Function, SchemaVariable};
//! use sqlogic::matching::match_term;
//!
//! let services = Services::default();
//! let int = services.sorts().declare(SortDeclaration::new("int")).unwrap();
//! services.declare_function(Function::new("c", int.clone(), [])).unwrap();
//! services.declare_schema_variable(SchemaVariable::formula("phi")).unwrap();
//! services.declare_schema_variable(SchemaVariable::term("t", int)).unwrap();
//!
//! let pattern = parse_term(&services, "phi & t = t").unwrap();
//! let term = parse_term(&services, "true & c = c").unwrap();
//! let found = match_term(&pattern, &term, &services).unwrap();
//! assert_eq!(found.instantiations().term("phi").unwrap().to_string(), "true");
//! ```

pub mod inst;
pub mod matching;
pub mod name;
pub mod namespace;
pub mod op;
pub mod parser;
pub mod pretty;
pub mod program;
pub mod sequent;
pub mod services;
pub mod sort;
pub mod term;
pub mod update;
pub mod utils;

pub use name::Name;
pub use utils::{Error, Result};
