#![allow(dead_code)]

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sqlogic::{
    op::{Function, LogicVariable, ModalityKind, SchemaVariable, SvKind},
    services::Services,
    sort::{Sort, SortDeclaration},
    term::Term,
};

/// Integers with a little arithmetic, two program variables and the schema
/// variables the tests use in patterns.
pub fn services() -> Services {
    let services = Services::default();
    let sorts = services.sorts();
    let int = sorts.declare(SortDeclaration::new("int")).unwrap();
    sorts.declare(SortDeclaration::new("boolean")).unwrap();

    for (name, arity) in [("add", 2), ("sub", 2), ("mul", 2), ("neg", 1), ("c", 0), ("d", 0)] {
        services
            .declare_function(Function::new(name, int.clone(), vec![int.clone(); arity]))
            .unwrap();
    }
    for name in ["lt", "leq", "gt", "geq"] {
        services
            .declare_function(Function::new(name, Sort::formula(), [int.clone(), int.clone()]))
            .unwrap();
    }
    services
        .declare_function(Function::new("p", Sort::formula(), [int.clone()]))
        .unwrap();
    services
        .declare_function(Function::new("q", Sort::formula(), []))
        .unwrap();

    services.declare_program_variable("i", int.clone()).unwrap();
    services.declare_program_variable("j", int.clone()).unwrap();

    for sv in [
        SchemaVariable::formula("phi"),
        SchemaVariable::formula("psi"),
        SchemaVariable::term("t", int.clone()),
        SchemaVariable::term("s", int.clone()),
        SchemaVariable::variable("x", int.clone()),
        SchemaVariable::update("u"),
        SchemaVariable::new("#v", SvKind::ProgramVariable, int.clone()),
        SchemaVariable::new("#se", SvKind::Expression, int.clone()),
        SchemaVariable::new("#slist", SvKind::StatementList, Sort::any()),
        SchemaVariable::modality("#m", [ModalityKind::Diamond, ModalityKind::Box]),
    ] {
        services.declare_schema_variable(sv).unwrap();
    }
    services
}

pub fn int(services: &Services) -> Sort {
    services.sort("int").unwrap()
}

/// Seeded generator of well-sorted, closed formulas over [`services`].
///
/// Quantifiers reuse the names `x` and `y`, so nested binders regularly
/// shadow or clash by name with each other.
pub struct TermGen<'a> {
    rng: ChaCha8Rng,
    services: &'a Services,
    scope: Vec<LogicVariable>,
}

impl<'a> TermGen<'a> {
    pub fn new(services: &'a Services, seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            services,
            scope: Vec::new(),
        }
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    fn function(&self, name: &str) -> Arc<Function> {
        self.services.function(name).unwrap()
    }

    pub fn formula(&mut self, depth: u32) -> Term {
        let services = self.services;
        let tb = services.tb();
        let choice = if depth == 0 {
            self.rng.random_range(0..3)
        } else {
            self.rng.random_range(0..11)
        };
        match choice {
            0 => {
                if self.rng.random_bool(0.5) {
                    tb.tt().unwrap()
                } else {
                    tb.func(&self.function("q"), []).unwrap()
                }
            }
            1 => {
                let a = self.int_term(depth.saturating_sub(1));
                tb.func(&self.function("p"), [a]).unwrap()
            }
            2 => {
                let a = self.int_term(depth.saturating_sub(1));
                let b = self.int_term(depth.saturating_sub(1));
                tb.equals(a, b).unwrap()
            }
            3 => {
                let a = self.formula(depth - 1);
                tb.not(a).unwrap()
            }
            4..=7 => {
                let a = self.formula(depth - 1);
                let b = self.formula(depth - 1);
                match choice {
                    4 => tb.and(a, b),
                    5 => tb.or(a, b),
                    6 => tb.imp(a, b),
                    _ => tb.equiv(a, b),
                }
                .unwrap()
            }
            8 => {
                let name = if self.rng.random_bool(0.5) { "x" } else { "y" };
                let v = LogicVariable::new(name, int(self.services));
                self.scope.push(v.clone());
                let body = self.formula(depth - 1);
                self.scope.pop();
                if self.rng.random_bool(0.5) {
                    tb.all(&v, body).unwrap()
                } else {
                    tb.ex(&v, body).unwrap()
                }
            }
            9 => {
                let u = self.update(depth - 1);
                let target = self.formula(depth - 1);
                tb.apply(u, target).unwrap()
            }
            _ => {
                let lt = self.function("lt");
                let a = self.int_term(depth - 1);
                let b = self.int_term(depth - 1);
                tb.func(&lt, [a, b]).unwrap()
            }
        }
    }

    pub fn int_term(&mut self, depth: u32) -> Term {
        let services = self.services;
        let tb = services.tb();
        let choice = if depth == 0 {
            self.rng.random_range(0..4)
        } else {
            self.rng.random_range(0..8)
        };
        match choice {
            0 => {
                let name = if self.rng.random_bool(0.5) { "c" } else { "d" };
                tb.func(&self.function(name), []).unwrap()
            }
            1 => {
                let value = self.rng.random_range(-3..4);
                self.services.int_literal(value).unwrap()
            }
            2 => {
                let name = if self.rng.random_bool(0.5) { "i" } else { "j" };
                tb.pv(&self.services.program_variable(name).unwrap()).unwrap()
            }
            3 => match self.scope.len() {
                0 => self.services.int_literal(0).unwrap(),
                n => {
                    let v = self.scope[self.rng.random_range(0..n)].clone();
                    tb.var(&v).unwrap()
                }
            },
            4 | 5 => {
                let f = if choice == 4 { "add" } else { "mul" };
                let a = self.int_term(depth - 1);
                let b = self.int_term(depth - 1);
                tb.func(&self.function(f), [a, b]).unwrap()
            }
            6 => {
                let cond = self.formula(depth - 1);
                let a = self.int_term(depth - 1);
                let b = self.int_term(depth - 1);
                tb.ite(cond, a, b).unwrap()
            }
            _ => {
                let u = self.update(depth - 1);
                let a = self.int_term(depth - 1);
                tb.apply(u, a).unwrap()
            }
        }
    }

    pub fn update(&mut self, depth: u32) -> Term {
        let services = self.services;
        let tb = services.tb();
        let elementary = |g: &mut Self| {
            let name = if g.rng.random_bool(0.5) { "i" } else { "j" };
            let lhs = g.services.program_variable(name).unwrap();
            let value = g.int_term(depth.saturating_sub(1));
            tb.elementary(&lhs, value).unwrap()
        };
        let first = elementary(self);
        if depth > 0 && self.rng.random_bool(0.4) {
            let second = elementary(self);
            tb.parallel(first, second).unwrap()
        } else {
            first
        }
    }
}
