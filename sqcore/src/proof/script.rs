//! Saving and replaying the rule applications of a proof.
//!
//! A script is a TOML document: the problem sequent in concrete syntax and
//! one `[[step]]` per application, in application order.
//!
//! ```toml
//! name = "demo"
//! problem = "p(c) ==> p(c)"
//!
//! [[step]]
//! node = 0
//! rule = "close"
//! position = { side = "succedent", formula = 0 }
//! assumes = [{ side = "antecedent", formula = 0 }]
//!
//! [step.instantiations]
//! phi = "p(c)"
//! ```
//!
//! Replay applies every step at the node with the recorded serial, counted
//! as if the steps were applied to a fresh proof of the problem. Values
//! recorded for schema variables the match determines are checked against
//! the match; the others are parsed and added. Skolem constants get the
//! same names again because name generation is deterministic.
use std::{collections::BTreeMap, path::Path, sync::Arc};

use log::debug;
use serde::{Deserialize, Serialize};
use sqlogic::{
    parser::{parse_sequent, parse_term},
    sequent::{PosInOccurrence, Sequent, Side},
    services::Services,
    term::PosInTerm,
};
use strum::IntoEnumIterator;

use super::{NodeId, Proof};
use crate::{
    rules::{RuleApp, RuleBase, TacletApp, app::BuiltInRuleApp},
    utils::error::{ProofError, ProofResult},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptPosition {
    pub side: String,
    pub formula: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<u16>,
}

impl ScriptPosition {
    fn of(pos: &PosInOccurrence) -> Self {
        Self {
            side: pos.side().to_string(),
            formula: pos.index(),
            path: pos.pos_in_term().indices().to_vec(),
        }
    }

    fn resolve(&self, sequent: &Sequent) -> Result<PosInOccurrence, String> {
        let side = Side::iter()
            .find(|s| s.to_string() == self.side)
            .ok_or_else(|| format!("unknown side `{}`", self.side))?;
        let f = sequent
            .formula(side, self.formula)
            .ok_or_else(|| format!("no formula {} in the {side}", self.formula))?;
        let pos = PosInOccurrence::new(side, self.formula, f.clone(), PosInTerm::from_indices(self.path.iter().copied()));
        pos.subterm().map_err(|e| e.to_string())?;
        Ok(pos)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Serial the goal has when the script is replayed on a fresh proof.
    pub node: u32,
    pub rule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<ScriptPosition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assumes: Vec<ScriptPosition>,
    /// Printed instantiations by schema variable name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub instantiations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofScript {
    pub name: String,
    pub problem: String,
    #[serde(default, rename = "step")]
    pub steps: Vec<ScriptStep>,
    /// File the script was read from; replay errors name it.
    #[serde(skip)]
    pub source: Option<String>,
}

impl ProofScript {
    pub fn from_proof(proof: &Proof) -> ProofResult<Self> {
        let problem = proof.node(proof.root())?.sequent().to_string();
        let mut steps = Vec::with_capacity(proof.history().len());
        // Serials the nodes get when the steps are replayed on a fresh proof;
        // pruning leaves gaps in the live serials.
        let mut replayed: BTreeMap<NodeId, u32> = BTreeMap::from([(proof.root(), 0)]);
        for id in proof.history() {
            let node = proof.node(*id)?;
            let Some(applied) = node.applied() else {
                return Err(ProofError::InvariantViolation(format!("{id} is in the history but was not expanded")));
            };
            let serial = *replayed
                .get(id)
                .ok_or_else(|| ProofError::InvariantViolation(format!("{id} was expanded before its parent")))?;
            for child in node.children() {
                let next = replayed.len() as u32;
                replayed.insert(*child, next);
            }
            let mut step = ScriptStep {
                node: serial,
                rule: applied.app.rule_name().to_string(),
                position: applied.app.pos().map(ScriptPosition::of),
                assumes: Vec::new(),
                instantiations: BTreeMap::new(),
            };
            if let RuleApp::Taclet(app) = &applied.app {
                step.assumes = app.assumes_positions().iter().map(ScriptPosition::of).collect();
                step.instantiations = app
                    .instantiations()
                    .iter()
                    .map(|e| (e.sv.name().to_string(), e.value.to_string()))
                    .collect();
            }
            steps.push(step);
        }
        Ok(Self {
            name: proof.name().to_string(),
            problem,
            steps,
            source: None,
        })
    }

    pub fn from_toml_str(text: &str, file: &str) -> ProofResult<Self> {
        let script: Self = toml::from_str(text).map_err(|e| ProofError::input(file, "script", e))?;
        Ok(Self {
            source: Some(file.to_string()),
            ..script
        })
    }

    /// Where errors found while replaying point: the source file, or the
    /// script's name for scripts built in memory.
    fn origin(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.name)
    }

    pub fn load_from_toml(path: &Path) -> ProofResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    pub fn to_toml_string(&self) -> ProofResult<String> {
        toml::to_string(self).map_err(|e| ProofError::Serialize {
            source: e,
            what: format!("proof script `{}`", self.name),
        })
    }

    pub fn save_to_toml(&self, path: &Path) -> ProofResult<()> {
        let text = self.to_toml_string()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Parses the problem into a fresh proof and applies every step.
    pub fn replay(&self, rules: Arc<RuleBase>, services: Services) -> ProofResult<Proof> {
        let problem = parse_sequent(&services, &self.problem).map_err(|e| ProofError::input(self.origin(), "problem", e))?;
        let mut proof = Proof::new(self.name.clone(), services, rules, problem);
        for (i, step) in self.steps.iter().enumerate() {
            let app = self.step_app(&proof, i, step)?;
            proof.apply(NodeId(step.node), app).map_err(|e| {
                if e.is_fatal() {
                    e
                } else {
                    ProofError::input(self.origin(), format!("step {i} ({})", step.rule), e)
                }
            })?;
        }
        debug!("Replayed {} steps of `{}`.", self.steps.len(), self.name);
        Ok(proof)
    }

    fn step_app(&self, proof: &Proof, i: usize, step: &ScriptStep) -> ProofResult<RuleApp> {
        let fail = |message: String| ProofError::input(self.origin(), format!("step {i} ({})", step.rule), message);
        let goal = NodeId(step.node);
        if proof.goal(goal).is_none() {
            return Err(fail(format!("{goal} is not an open goal")));
        }
        let sequent = proof.node(goal)?.sequent();
        let services = proof.services();
        let pos = step.position.as_ref().map(|p| p.resolve(sequent)).transpose().map_err(fail)?;

        let Some(taclet) = proof.find_taclet(goal, &step.rule) else {
            let rule = proof
                .rules()
                .builtin(&step.rule)
                .ok_or_else(|| fail("unknown rule".to_string()))?;
            return Ok(RuleApp::BuiltIn(BuiltInRuleApp { rule: rule.clone(), pos }));
        };

        let mut app = TacletApp::at(&taclet, pos, services)?.ok_or_else(|| fail("the find pattern does not match".to_string()))?;
        let assumes = step
            .assumes
            .iter()
            .map(|p| p.resolve(sequent))
            .collect::<Result<Vec<_>, _>>()
            .map_err(fail)?;
        if !taclet.assumes().is_empty() {
            app = app
                .with_assumes(&assumes, services)?
                .ok_or_else(|| fail("the assumes formulas do not match".to_string()))?;
        }
        for (name, text) in &step.instantiations {
            match app.instantiations().get(name) {
                Some(found) if found.to_string() == *text => {}
                Some(found) => return Err(fail(format!("`{name}` is `{found}` here, the script says `{text}`"))),
                None => {
                    let t = parse_term(services, text).map_err(|e| fail(e.to_string()))?;
                    app = app.with_term(name, t, services).map_err(|e| fail(e.to_string()))?;
                }
            }
        }
        Ok(RuleApp::Taclet(app))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_utils::{first_order_env, proof_for};

    #[test]
    fn steps_survive_toml() {
        let script = ProofScript {
            name: "demo".into(),
            problem: "p(c) ==> p(c)".into(),
            steps: vec![ScriptStep {
                node: 0,
                rule: "close".into(),
                position: Some(ScriptPosition {
                    side: "succedent".into(),
                    formula: 0,
                    path: Vec::new(),
                }),
                assumes: vec![ScriptPosition {
                    side: "antecedent".into(),
                    formula: 0,
                    path: Vec::new(),
                }],
                instantiations: BTreeMap::from([("phi".to_string(), "p(c)".to_string())]),
            }],
            source: None,
        };
        let text = script.to_toml_string().unwrap();
        let read = ProofScript::from_toml_str(&text, "inline").unwrap();
        assert_eq!(read.source.as_deref(), Some("inline"));
        assert_eq!(read.steps, script.steps);
        assert_eq!(read.problem, script.problem);
    }

    #[test]
    fn replay_reports_the_failing_step() {
        let (services, rules) = first_order_env();
        let proof = proof_for(&services, &rules, "p(c) ==> p(d)");
        let mut script = ProofScript::from_proof(&proof).unwrap();
        script.steps.push(ScriptStep {
            node: 0,
            rule: "close".into(),
            position: Some(ScriptPosition {
                side: "succedent".into(),
                formula: 0,
                path: Vec::new(),
            }),
            assumes: vec![ScriptPosition {
                side: "antecedent".into(),
                formula: 0,
                path: Vec::new(),
            }],
            instantiations: BTreeMap::new(),
        });
        let err = script.replay(rules.clone(), services.for_proof()).unwrap_err();
        let ProofError::ProofInput { item, .. } = err else {
            panic!("expected an input error, got {err:?}");
        };
        assert_eq!(item, "step 0 (close)");
    }
}
