//! The rule base of a proof environment.
use std::{collections::HashMap, sync::Arc};

use log::debug;
use sqlogic::Name;

use super::{builtin::BuiltInRule, taclet::Taclet};
use crate::utils::error::{ProofError, ProofResult};

/// Taclets and built-in rules by name, in registration order.
///
/// Templates are taclets only reachable through `addrules` or scripts
/// (e.g. the rules a `\template` entry of a rule file declares); they are
/// not offered by rule discovery.
#[derive(Debug, Default, Clone)]
pub struct RuleBase {
    taclets: Vec<Arc<Taclet>>,
    by_name: HashMap<Name, Arc<Taclet>>,
    templates: HashMap<Name, Arc<Taclet>>,
    builtins: Vec<Arc<dyn BuiltInRule>>,
}

impl RuleBase {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_fresh(&self, name: &Name) -> ProofResult<()> {
        let taken = self.by_name.contains_key(name)
            || self.templates.contains_key(name)
            || self.builtins.iter().any(|b| b.name() == name);
        if taken {
            return Err(ProofError::InvariantViolation(format!("rule `{name}` is declared twice")));
        }
        Ok(())
    }

    pub fn add_taclet(&mut self, taclet: Taclet) -> ProofResult<Arc<Taclet>> {
        self.check_fresh(taclet.name())?;
        let taclet = Arc::new(taclet);
        debug!("Registered taclet `{}`.", taclet.name());
        self.by_name.insert(taclet.name().clone(), taclet.clone());
        self.taclets.push(taclet.clone());
        Ok(taclet)
    }

    pub fn add_template(&mut self, taclet: Taclet) -> ProofResult<Arc<Taclet>> {
        self.check_fresh(taclet.name())?;
        let taclet = Arc::new(taclet);
        self.templates.insert(taclet.name().clone(), taclet.clone());
        Ok(taclet)
    }

    pub fn add_builtin(&mut self, rule: Arc<dyn BuiltInRule>) -> ProofResult<()> {
        self.check_fresh(rule.name())?;
        debug!("Registered built-in rule `{}`.", rule.name());
        self.builtins.push(rule);
        Ok(())
    }

    pub fn taclet(&self, name: &str) -> Option<&Arc<Taclet>> {
        self.by_name.get(name)
    }

    pub fn template(&self, name: &str) -> Option<&Arc<Taclet>> {
        self.templates.get(name)
    }

    pub fn builtin(&self, name: &str) -> Option<&Arc<dyn BuiltInRule>> {
        self.builtins.iter().find(|b| b.name().as_str() == name)
    }

    pub fn taclets(&self) -> &[Arc<Taclet>] {
        &self.taclets
    }

    pub fn builtins(&self) -> &[Arc<dyn BuiltInRule>] {
        &self.builtins
    }

    pub fn len(&self) -> usize {
        self.taclets.len() + self.builtins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
