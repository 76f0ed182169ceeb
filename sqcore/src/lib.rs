//! Rule engine and proof search for sequent-calculus proofs over `sqlogic`.
//!
//! The crate turns declarative rules (taclets) into applications on proof
//! goals, keeps the proof tree, and drives a cost-guided search over it.
//! Most consumers load a rule base with [`loader::RuleLoader`], open a
//! [`proof::Proof`] and hand it to a [`prover::Prover`].
//!
//! Layout
//!  - [`rules`]: taclets, their applications, variable conditions and the
//!    executor building new goals; built-in rules and the solver seam.
//!  - [`proof`]: the proof tree, goals, change journal, events and scripts.
//!  - [`strategy`]: costs, features, the per-goal application queue and
//!    goal choosers.
//!  - [`prover`]: the automatic search loop and parallel side proofs.
//!  - [`loader`], [`settings`]: rule files and run configuration.

pub mod loader;
pub mod magic;
pub mod proof;
pub mod prover;
pub mod rules;
pub mod settings;
pub mod strategy;
#[cfg(any(test, feature = "test-utils"))]
pub mod tests_utils;
pub mod utils;

pub extern crate inventory;
pub extern crate sqlogic;
