//! Taclets: schematic sequent-calculus rules.
//!
//! Role
//! - A [`Taclet`] couples an optional find pattern with assumes formulas,
//!   variable conditions and goal templates. Zero goal templates close the
//!   goal; several split it.
//! - [`TacletBuilder`] validates the parts against the taclet kind,
//!   computes the prefixes of the schema variables and compiles the
//!   patterns into match programs once.
//!
//! Schema variables fall into four groups once a taclet is built: matched
//! by find or assumes, computed by variable conditions, generated at
//! execution (skolem constants, fresh variables, labels) and the rest,
//! which must be supplied from outside: term schema variables by the
//! heuristic instantiation of the rule discovery, the others interactively.
use std::{fmt, sync::Arc};

use bitflags::bitflags;
use smallvec::SmallVec;
use sqlogic::{
    Name,
    inst::{GenericSortInstantiations, SVInstantiations},
    matching::MatchProgram,
    op::{Operator, SchemaVariable, SvKind},
    sequent::{Semisequent, Sequent, SequentFormula, Side},
    services::Services,
    term::Term,
};
use strum::{Display, EnumIs};

use super::{
    instantiate::Instantiator,
    prefix::{Occurrence, TacletPrefixMap},
    varcond::VariableCondition,
};
use crate::utils::error::{ProofError, ProofResult};

bitflags! {
    /// Restrictions on the find position of a taclet.
    #[derive(Default, Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct ApplicationRestriction: u8 {
        /// The position may be below update applications only; the updates
        /// become the update context and wrap assumes and added formulas.
        const SAME_UPDATE_LEVEL = 1 << 0;

        /// The position is not in the scope of an update or a modality.
        const IN_SEQUENT_STATE = 1 << 1;

        /// The position has antecedent polarity.
        const ANTECEDENT_POLARITY = 1 << 2;

        /// The position has succedent polarity.
        const SUCCEDENT_POLARITY = 1 << 3;
    }
}

impl ApplicationRestriction {
    pub fn from_config_name(name: &str) -> Option<Self> {
        Some(match name {
            "same_update_level" => Self::SAME_UPDATE_LEVEL,
            "in_sequent_state" => Self::IN_SEQUENT_STATE,
            "antecedent_polarity" => Self::ANTECEDENT_POLARITY,
            "succedent_polarity" => Self::SUCCEDENT_POLARITY,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIs)]
#[strum(serialize_all = "snake_case")]
pub enum TacletKind {
    /// No find part; applies to the goal as a whole.
    NoFind,
    /// Find is a term or formula at any position.
    Rewrite,
    /// Find is a top-level antecedent formula.
    Antecedent,
    /// Find is a top-level succedent formula.
    Succedent,
}

#[derive(Debug, Clone)]
pub enum Replacement {
    /// Replaces the find occurrence (rewrite taclets).
    Term(Term),
    /// Replaces the find formula by formulas on either side.
    Sequent(Sequent),
}

#[derive(Debug, Clone, Default)]
pub struct GoalTemplate {
    pub label: Option<String>,
    pub replacewith: Option<Replacement>,
    pub add: Sequent,
    /// Rules made available on the new goal, specialised to the instantiation.
    pub addrules: Vec<Arc<Taclet>>,
}

impl GoalTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn replace_term(mut self, t: Term) -> Self {
        self.replacewith = Some(Replacement::Term(t));
        self
    }

    pub fn replace_sequent(mut self, s: Sequent) -> Self {
        self.replacewith = Some(Replacement::Sequent(s));
        self
    }

    pub fn add(mut self, s: Sequent) -> Self {
        self.add = s;
        self
    }

    pub fn add_rule(mut self, t: Arc<Taclet>) -> Self {
        self.addrules.push(t);
        self
    }

    fn terms(&self) -> impl Iterator<Item = (Occurrence, &Term)> {
        let replaced: Vec<(Occurrence, &Term)> = match &self.replacewith {
            Some(Replacement::Term(t)) => vec![(Occurrence::Rewrite, t)],
            Some(Replacement::Sequent(s)) => s.iter().map(|(_, _, f)| (Occurrence::TopLevel, f.formula())).collect(),
            None => Vec::new(),
        };
        replaced
            .into_iter()
            .chain(self.add.iter().map(|(_, _, f)| (Occurrence::TopLevel, f.formula())))
    }
}

/// A rule; immutable once built and shared between goals.
pub struct Taclet {
    name: Name,
    kind: TacletKind,
    find: Option<Term>,
    find_program: Option<MatchProgram>,
    assumes: Vec<(Side, Term)>,
    assumes_programs: Vec<MatchProgram>,
    goals: Vec<GoalTemplate>,
    varconds: Vec<VariableCondition>,
    restriction: ApplicationRestriction,
    rule_sets: SmallVec<Name, 2>,
    prefix: TacletPrefixMap,
    generated: Vec<Arc<SchemaVariable>>,
    heuristic: Vec<Arc<SchemaVariable>>,
    interactive: Vec<Arc<SchemaVariable>>,
    all_svs: Vec<Arc<SchemaVariable>>,
    doc: Option<String>,
}

impl fmt::Debug for Taclet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Taclet")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("goals", &self.goals.len())
            .finish()
    }
}

impl fmt::Display for Taclet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {{", self.name)?;
        if !self.assumes.is_empty() {
            let (ante, succ): (Vec<_>, Vec<_>) = self.assumes.iter().partition(|(s, _)| s.is_antecedent());
            let join = |v: &[&(Side, Term)]| v.iter().map(|(_, t)| t.to_string()).collect::<Vec<_>>().join(", ");
            writeln!(f, "  \\assumes({} ==> {})", join(&ante), join(&succ))?;
        }
        match (&self.find, self.kind) {
            (Some(t), TacletKind::Antecedent) => writeln!(f, "  \\find({t} ==>)")?,
            (Some(t), TacletKind::Succedent) => writeln!(f, "  \\find(==> {t})")?,
            (Some(t), _) => writeln!(f, "  \\find({t})")?,
            (None, _) => {}
        }
        if self.goals.is_empty() {
            writeln!(f, "  \\closegoal")?;
        }
        for g in &self.goals {
            match &g.replacewith {
                Some(Replacement::Term(t)) => writeln!(f, "  \\replacewith({t})")?,
                Some(Replacement::Sequent(s)) => writeln!(f, "  \\replacewith({s})")?,
                None => {}
            }
            if !g.add.is_empty() {
                writeln!(f, "  \\add({})", g.add)?;
            }
        }
        write!(f, "}}")
    }
}

impl Taclet {
    pub fn builder(name: impl Into<Name>) -> TacletBuilder {
        TacletBuilder::new(name)
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn kind(&self) -> TacletKind {
        self.kind
    }

    pub fn find(&self) -> Option<&Term> {
        self.find.as_ref()
    }

    pub(crate) fn find_program(&self) -> Option<&MatchProgram> {
        self.find_program.as_ref()
    }

    pub fn assumes(&self) -> &[(Side, Term)] {
        &self.assumes
    }

    pub(crate) fn assumes_programs(&self) -> &[MatchProgram] {
        &self.assumes_programs
    }

    pub fn goals(&self) -> &[GoalTemplate] {
        &self.goals
    }

    pub fn is_closing(&self) -> bool {
        self.goals.is_empty()
    }

    pub fn varconds(&self) -> &[VariableCondition] {
        &self.varconds
    }

    pub fn restriction(&self) -> ApplicationRestriction {
        self.restriction
    }

    pub fn rule_sets(&self) -> &[Name] {
        &self.rule_sets
    }

    pub fn in_rule_set(&self, set: &str) -> bool {
        self.rule_sets.iter().any(|s| s.as_str() == set)
    }

    pub fn prefix(&self) -> &TacletPrefixMap {
        &self.prefix
    }

    /// Schema variables instantiated at execution time.
    pub fn generated_svs(&self) -> &[Arc<SchemaVariable>] {
        &self.generated
    }

    /// Term schema variables instantiated from ground terms of the goal.
    pub fn heuristic_svs(&self) -> &[Arc<SchemaVariable>] {
        &self.heuristic
    }

    /// Schema variables only a user can instantiate.
    pub fn interactive_svs(&self) -> &[Arc<SchemaVariable>] {
        &self.interactive
    }

    pub fn schema_variable(&self, name: &str) -> Option<&Arc<SchemaVariable>> {
        self.all_svs.iter().find(|sv| sv.name().as_str() == name)
    }

    pub fn schema_variables(&self) -> &[Arc<SchemaVariable>] {
        &self.all_svs
    }

    /// Applications depend on more than the find formula: they must be
    /// recomputed whenever the sequent changes.
    pub fn is_volatile(&self) -> bool {
        !self.assumes.is_empty() || !self.heuristic.is_empty()
    }

    pub fn documentation(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Cheap pre-check that the find pattern may match `t` at its top.
    pub fn may_match(&self, t: &Term) -> bool {
        let Some(find) = &self.find else { return false };
        match (find.op(), t.op()) {
            (Operator::SchemaVariable(_), _) => true,
            (Operator::Junctor(a), Operator::Junctor(b)) => a == b,
            (Operator::Quantifier(a), Operator::Quantifier(b)) => a == b,
            (Operator::Function(f), Operator::Function(g)) => f == g,
            (Operator::Parametric(f), Operator::Parametric(g)) => f.is_similar(g),
            (Operator::Modality(_), Operator::Modality(_)) => true,
            (Operator::ElementaryUpdate(_), Operator::ElementaryUpdate(_)) => true,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }

    /// A copy of this taclet under `name` with the instantiated schema
    /// variables of `inst` replaced.
    pub fn specialize(&self, name: Name, inst: &SVInstantiations, services: &Services) -> ProofResult<Taclet> {
        let generic = GenericSortInstantiations::new();
        let grounder = Instantiator::new(inst, &generic, services).partial();
        let sequent = |s: &Sequent| -> ProofResult<Sequent> {
            let side = |semi: &Semisequent| -> ProofResult<Semisequent> {
                semi.iter()
                    .map(|f| SequentFormula::new(grounder.term(f.formula())?).map_err(ProofError::from))
                    .collect()
            };
            Ok(Sequent::new(side(s.antecedent())?, side(s.succedent())?))
        };

        let mut b = TacletBuilder::new(name);
        b.kind = Some(self.kind);
        b.find = self.find.as_ref().map(|t| grounder.term(t)).transpose()?;
        let mut ante = Semisequent::new();
        let mut succ = Semisequent::new();
        for (side, t) in &self.assumes {
            let f = SequentFormula::new(grounder.term(t)?)?;
            match side {
                Side::Antecedent => ante = ante.insert_last(f).result,
                Side::Succedent => succ = succ.insert_last(f).result,
            }
        }
        b.assumes = Sequent::new(ante, succ);
        for g in &self.goals {
            b.goals.push(GoalTemplate {
                label: g.label.clone(),
                replacewith: match &g.replacewith {
                    Some(Replacement::Term(t)) => Some(Replacement::Term(grounder.term(t)?)),
                    Some(Replacement::Sequent(s)) => Some(Replacement::Sequent(sequent(s)?)),
                    None => None,
                },
                add: sequent(&g.add)?,
                addrules: g.addrules.clone(),
            });
        }
        b.varconds = self.varconds.clone();
        b.restriction = self.restriction;
        b.rule_sets = self.rule_sets.clone();
        b.doc = self.doc.clone();
        b.build()
    }
}

#[derive(Debug, Clone)]
pub struct TacletBuilder {
    name: Name,
    kind: Option<TacletKind>,
    find: Option<Term>,
    assumes: Sequent,
    goals: Vec<GoalTemplate>,
    varconds: Vec<VariableCondition>,
    restriction: ApplicationRestriction,
    rule_sets: SmallVec<Name, 2>,
    doc: Option<String>,
}

impl TacletBuilder {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            find: None,
            assumes: Sequent::empty(),
            goals: Vec::new(),
            varconds: Vec::new(),
            restriction: ApplicationRestriction::empty(),
            rule_sets: SmallVec::new(),
            doc: None,
        }
    }

    pub fn find_term(mut self, t: Term) -> Self {
        self.kind = Some(TacletKind::Rewrite);
        self.find = Some(t);
        self
    }

    pub fn find_formula(mut self, side: Side, t: Term) -> Self {
        self.kind = Some(match side {
            Side::Antecedent => TacletKind::Antecedent,
            Side::Succedent => TacletKind::Succedent,
        });
        self.find = Some(t);
        self
    }

    pub fn assumes(mut self, s: Sequent) -> Self {
        self.assumes = s;
        self
    }

    pub fn goal(mut self, g: GoalTemplate) -> Self {
        self.goals.push(g);
        self
    }

    pub fn varcond(mut self, c: VariableCondition) -> Self {
        self.varconds.push(c);
        self
    }

    pub fn restriction(mut self, r: ApplicationRestriction) -> Self {
        self.restriction |= r;
        self
    }

    pub fn rule_set(mut self, set: impl Into<Name>) -> Self {
        self.rule_sets.push(set.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    fn fail(&self, message: impl fmt::Display) -> ProofError {
        ProofError::InvariantViolation(format!("taclet `{}`: {message}", self.name))
    }

    pub fn build(self) -> ProofResult<Taclet> {
        let kind = self.kind.unwrap_or(TacletKind::NoFind);
        if let Some(find) = &self.find {
            if !kind.is_rewrite() && !find.is_formula() {
                return Err(self.fail("find of an antecedent or succedent taclet must be a formula"));
            }
        }
        for g in &self.goals {
            match (&g.replacewith, kind) {
                (None, _) => {}
                (Some(Replacement::Term(r)), TacletKind::Rewrite) => {
                    let find = self.find.as_ref().is_some_and(|f| f.is_formula());
                    if r.is_formula() != find {
                        return Err(self.fail("replacement and find must both be formulas or both be terms"));
                    }
                }
                (Some(Replacement::Sequent(_)), TacletKind::Antecedent | TacletKind::Succedent) => {}
                _ => return Err(self.fail(format!("replacewith does not fit a {kind} taclet"))),
            }
        }
        if self.restriction.contains(ApplicationRestriction::SAME_UPDATE_LEVEL | ApplicationRestriction::IN_SEQUENT_STATE) {
            return Err(self.fail("same_update_level and in_sequent_state exclude each other"));
        }

        let assumes: Vec<(Side, Term)> = self
            .assumes
            .iter()
            .map(|(side, _, f)| (side, f.formula().clone()))
            .collect();

        let mut parts: Vec<(Occurrence, &Term)> = Vec::new();
        if let Some(f) = &self.find {
            parts.push((Occurrence::Find, f));
        }
        parts.extend(assumes.iter().map(|(_, t)| (Occurrence::Assumes, t)));
        for g in &self.goals {
            parts.extend(g.terms());
        }
        let prefix = TacletPrefixMap::compute(&self.name, parts.iter().copied())?;

        let mut matched: Vec<Arc<SchemaVariable>> = Vec::new();
        let push = |into: &mut Vec<Arc<SchemaVariable>>, svs: Vec<Arc<SchemaVariable>>| {
            for sv in svs {
                if !into.contains(&sv) {
                    into.push(sv);
                }
            }
        };
        if let Some(f) = &self.find {
            push(&mut matched, f.schema_variables());
        }
        for (_, t) in &assumes {
            push(&mut matched, t.schema_variables());
        }
        let mut computed = Vec::new();
        for c in &self.varconds {
            push(&mut computed, c.outputs());
        }
        let mut needed = Vec::new();
        for g in &self.goals {
            for (_, t) in g.terms() {
                push(&mut needed, t.schema_variables());
            }
        }

        let mut all_svs = matched.clone();
        push(&mut all_svs, computed.clone());
        push(&mut all_svs, needed.clone());

        let (mut generated, mut heuristic, mut interactive) = (Vec::new(), Vec::new(), Vec::new());
        for sv in needed {
            if matched.contains(&sv) || computed.contains(&sv) {
                continue;
            }
            match sv.kind() {
                SvKind::Skolem | SvKind::Variable | SvKind::Label => generated.push(sv),
                SvKind::Term { .. } => heuristic.push(sv),
                _ => interactive.push(sv),
            }
        }

        Ok(Taclet {
            find_program: self.find.as_ref().map(MatchProgram::compile),
            assumes_programs: assumes.iter().map(|(_, t)| MatchProgram::compile(t)).collect(),
            name: self.name,
            kind,
            find: self.find,
            assumes,
            goals: self.goals,
            varconds: self.varconds,
            restriction: self.restriction,
            rule_sets: self.rule_sets,
            prefix,
            generated,
            heuristic,
            interactive,
            all_svs,
            doc: self.doc,
        })
    }
}
