//! The proof tree.
//!
//! Role
//! - [`Proof`] owns its nodes in an arena indexed by [`NodeId`]; a node id
//!   is the node's serial number, assigned in creation order and never
//!   reused. Pruned nodes leave an empty slot.
//! - Goals are the open leaves. [`Proof::apply`] replaces a goal by the
//!   goals an application produces, or closes it; closing propagates to
//!   ancestors whose children are all closed. The set of goals is exactly
//!   the set of childless nodes that are not closed.
//! - Applications are computed completely before anything is committed;
//!   an error leaves the tree as it was.
//!
//! Sub-modules: [`journal`] (per-branch change records), [`events`]
//! (notifications) and [`script`] (saving and replaying applications).
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

use crossbeam::channel::Receiver;
use im::Vector;
use log::{debug, info};
use sqlogic::{
    Name,
    inst::SVInstantiations,
    op::Function,
    sequent::{PosInOccurrence, Sequent},
    services::Services,
};
use uuid::Uuid;

use crate::{
    rules::{
        RuleApp, RuleBase, Taclet, TacletApp,
        app::BuiltInRuleApp,
        executor::execute,
    },
    utils::error::{ProofError, ProofResult},
};

pub mod events;
pub mod journal;
pub mod script;

pub use events::{ProofEvent, RuleAppInfo};
pub use journal::NodeChangeJournal;
pub use script::{ProofScript, ScriptStep};

use events::EventBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn serial(self) -> u32 {
        self.0
    }

    pub fn from_serial(serial: u32) -> Self {
        NodeId(serial)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The rule application that expanded a node.
#[derive(Debug, Clone)]
pub struct AppliedRule {
    pub app: RuleApp,
    /// Instantiations after execution, generated values included.
    pub instantiations: Option<SVInstantiations>,
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    sequent: Sequent,
    applied: Option<AppliedRule>,
    branch_label: Option<String>,
    introduced: Vec<Name>,
    local_rules: Vector<Arc<Taclet>>,
    closed: bool,
    /// Whether the strategy may work on this node while it is a goal.
    automatic: bool,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn sequent(&self) -> &Sequent {
        &self.sequent
    }

    pub fn applied(&self) -> Option<&AppliedRule> {
        self.applied.as_ref()
    }

    pub fn branch_label(&self) -> Option<&str> {
        self.branch_label.as_deref()
    }

    /// Names of the symbols introduced by the application at this node.
    pub fn introduced(&self) -> &[Name] {
        &self.introduced
    }

    /// Taclets added on the branch leading to this node, oldest first.
    pub fn local_rules(&self) -> &Vector<Arc<Taclet>> {
        &self.local_rules
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Goal {
    node: NodeId,
    automatic: bool,
}

impl Goal {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn is_automatic(&self) -> bool {
        self.automatic
    }
}

pub struct Proof {
    id: Uuid,
    name: String,
    services: Services,
    rules: Arc<RuleBase>,
    nodes: Vec<Option<Node>>,
    goals: BTreeMap<NodeId, Goal>,
    history: Vec<NodeId>,
    events: EventBus,
}

impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proof")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("nodes", &self.nodes.iter().flatten().count())
            .field("goals", &self.goals.len())
            .finish()
    }
}

impl Proof {
    pub fn new(name: impl Into<String>, services: Services, rules: Arc<RuleBase>, problem: Sequent) -> Self {
        let root = Node {
            id: NodeId(0),
            parent: None,
            children: Vec::new(),
            sequent: problem,
            applied: None,
            branch_label: None,
            introduced: Vec::new(),
            local_rules: Vector::new(),
            closed: false,
            automatic: true,
        };
        let mut goals = BTreeMap::new();
        goals.insert(
            root.id,
            Goal {
                node: root.id,
                automatic: true,
            },
        );
        let proof = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            services,
            rules,
            nodes: vec![Some(root)],
            goals,
            history: Vec::new(),
            events: EventBus::default(),
        };
        info!("Opened proof `{}` ({}).", proof.name, proof.id);
        proof
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn rules(&self) -> &Arc<RuleBase> {
        &self.rules
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> ProofResult<&Node> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| ProofError::InvariantViolation(format!("proof `{}` has no node {id}", self.name)))
    }

    fn node_mut(&mut self, id: NodeId) -> ProofResult<&mut Node> {
        let name = &self.name;
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| ProofError::InvariantViolation(format!("proof `{name}` has no node {id}")))
    }

    /// Live nodes in serial order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    pub fn goal(&self, node: NodeId) -> Option<&Goal> {
        self.goals.get(&node)
    }

    pub fn goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals.values()
    }

    /// Open goals in serial order.
    pub fn open_goals(&self) -> Vec<NodeId> {
        self.goals.keys().copied().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.goals.is_empty()
    }

    /// Nodes expanded so far, in application order.
    pub fn history(&self) -> &[NodeId] {
        &self.history
    }

    pub fn subscribe(&mut self) -> Receiver<ProofEvent> {
        self.events.subscribe()
    }

    pub fn set_automatic(&mut self, goal: NodeId, automatic: bool) -> ProofResult<()> {
        let name = &self.name;
        let g = self
            .goals
            .get_mut(&goal)
            .ok_or_else(|| ProofError::InvariantViolation(format!("proof `{name}` has no goal {goal}")))?;
        g.automatic = automatic;
        self.node_mut(goal)?.automatic = automatic;
        Ok(())
    }

    /// Declares `functions` in the proof's namespaces, all or none.
    fn adopt_all(&self, functions: &[Arc<Function>]) -> ProofResult<()> {
        let mut adopted: Vec<Name> = Vec::with_capacity(functions.len());
        for f in functions {
            if let Err(e) = self.services.adopt_function(f.clone()) {
                self.forget_functions(&adopted);
                return Err(e.into());
            }
            adopted.push(f.name().clone());
        }
        Ok(())
    }

    /// Removes skolem constants from the proof's namespaces.
    fn forget_functions<'n>(&self, names: impl IntoIterator<Item = &'n Name>) {
        let mut namespaces = self.services.namespaces_mut();
        for n in names {
            namespaces.functions.remove(n.as_str());
        }
    }

    /// The path from the root to `node`, root first.
    pub fn branch(&self, node: NodeId) -> ProofResult<Vec<&Node>> {
        let mut out = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let n = self.node(id)?;
            out.push(n);
            current = n.parent;
        }
        out.reverse();
        Ok(out)
    }

    /// Taclet called `name` as seen from `goal`: rules added on the branch
    /// shadow the rule base, newest first.
    pub fn find_taclet(&self, goal: NodeId, name: &str) -> Option<Arc<Taclet>> {
        let local = self.node(goal).ok()?.local_rules();
        local
            .iter()
            .rev()
            .find(|t| t.name().as_str() == name)
            .or_else(|| self.rules.taclet(name).or_else(|| self.rules.template(name)))
            .cloned()
    }

    fn name_taken(&self, goal: NodeId) -> impl Fn(&str) -> bool + '_ {
        let local = self.node(goal).ok().map(|n| n.local_rules.clone()).unwrap_or_default();
        move |n: &str| {
            self.rules.taclet(n).is_some()
                || self.rules.template(n).is_some()
                || self.rules.builtin(n).is_some()
                || local.iter().any(|t| t.name().as_str() == n)
        }
    }

    /// Applications available at `pos` of `goal` (goal-wide ones for `None`).
    ///
    /// Applications still missing instantiations only a user can provide
    /// are included unfinished.
    pub fn applicable_at(&self, goal: NodeId, pos: Option<PosInOccurrence>) -> ProofResult<Vec<RuleApp>> {
        let node = self.node(goal)?;
        if !self.goals.contains_key(&goal) {
            return Err(ProofError::InvariantViolation(format!("{goal} is not an open goal")));
        }
        let mut out = Vec::new();
        let taclets = self.rules.taclets().iter().chain(node.local_rules.iter());
        for taclet in taclets {
            if let Some(p) = &pos {
                if !taclet.may_match(p.subterm()?) {
                    continue;
                }
            }
            let Some(app) = TacletApp::at(taclet, pos.clone(), &self.services)? else {
                continue;
            };
            for app in app.match_assumes(&node.sequent, &self.services)? {
                if !app.is_complete() {
                    out.push(RuleApp::Taclet(app));
                } else if let Some(done) = app.finish(&self.services)? {
                    out.push(RuleApp::Taclet(done));
                }
            }
        }
        for rule in self.rules.builtins() {
            if rule.applies_at_positions() == pos.is_some() && rule.is_applicable(&node.sequent, pos.as_ref(), &self.services) {
                out.push(RuleApp::BuiltIn(BuiltInRuleApp {
                    rule: rule.clone(),
                    pos: pos.clone(),
                }));
            }
        }
        Ok(out)
    }

    /// Applies `app` to `goal`.
    ///
    /// Unfinished taclet applications are finished first. Nothing changes
    /// if any part of the application fails.
    pub fn apply(&mut self, goal: NodeId, app: RuleApp) -> ProofResult<RuleAppInfo> {
        if !self.goals.contains_key(&goal) {
            return Err(ProofError::InvariantViolation(format!("{goal} is not an open goal")));
        }
        let app = match app {
            RuleApp::Taclet(t) if !t.is_finished() => {
                let rule = t.taclet().name().clone();
                match t.finish(&self.services)? {
                    Some(done) => RuleApp::Taclet(done),
                    None => return Err(ProofError::illegal(&rule, "the instantiation does not satisfy the rule's conditions")),
                }
            }
            other => other,
        };
        let (sequent, local_rules) = {
            let node = self.node(goal)?;
            (node.sequent.clone(), node.local_rules.clone())
        };
        let execution = {
            let taken = self.name_taken(goal);
            execute(&app, &sequent, &self.services, &taken)?
        };

        // Commit. Declaring the constants is the only step that can fail.
        self.adopt_all(&execution.introduced)?;
        let rule = app.rule_name().clone();
        let automatic = self.goals.get(&goal).is_some_and(|g| g.automatic);
        let mut journal = NodeChangeJournal::new(goal, &sequent);
        let mut events = Vec::new();
        let mut new_goals = Vec::with_capacity(execution.goals.len());
        let first_serial = self.nodes.len() as u32;
        let children: Vec<NodeId> = (0..execution.goals.len() as u32).map(|i| NodeId(first_serial + i)).collect();
        journal.split(goal, &children);

        for (id, new_goal) in children.iter().zip(execution.goals) {
            let mut rules = local_rules.clone();
            rules.extend(new_goal.added_rules.iter().cloned());
            journal.record(*id, new_goal.change.clone());
            events.push(ProofEvent::NodeAdded {
                node: *id,
                parent: Some(goal),
            });
            events.push(ProofEvent::SequentChanged {
                node: *id,
                change: new_goal.change.clone(),
            });
            self.nodes.push(Some(Node {
                id: *id,
                parent: Some(goal),
                children: Vec::new(),
                sequent: new_goal.change.result,
                applied: None,
                branch_label: new_goal.label,
                introduced: Vec::new(),
                local_rules: rules,
                closed: false,
                automatic,
            }));
            self.goals.insert(*id, Goal { node: *id, automatic });
            new_goals.push(*id);
        }

        self.goals.remove(&goal);
        self.history.push(goal);
        let introduced = execution.introduced.iter().map(|f| f.name().clone()).collect();
        {
            let node = self.node_mut(goal)?;
            node.children = children.clone();
            node.introduced = introduced;
            node.applied = Some(AppliedRule {
                app,
                instantiations: execution.instantiations,
            });
        }
        events.push(ProofEvent::GoalReplaced {
            goal,
            by: children,
        });
        if new_goals.is_empty() {
            events.push(ProofEvent::GoalClosed { goal });
            self.close_upwards(goal)?;
        }
        if self.is_closed() {
            info!("Proof `{}` is closed.", self.name);
            events.push(ProofEvent::ProofClosed { proof: self.id });
        }
        debug!("Applied `{rule}` on {goal}, {} new goals.", new_goals.len());
        self.events.publish(&events);
        Ok(RuleAppInfo {
            node: goal,
            rule,
            new_goals,
            journal,
            events,
        })
    }

    fn close_upwards(&mut self, node: NodeId) -> ProofResult<()> {
        self.node_mut(node)?.closed = true;
        let mut current = self.node(node)?.parent;
        while let Some(id) = current {
            let all_closed = self
                .node(id)?
                .children
                .iter()
                .map(|c| self.node(*c).map(Node::is_closed))
                .collect::<ProofResult<Vec<_>>>()?
                .into_iter()
                .all(|c| c);
            if !all_closed {
                break;
            }
            let n = self.node_mut(id)?;
            n.closed = true;
            current = n.parent;
        }
        Ok(())
    }

    /// Removes everything below `node` and makes it an open goal again.
    /// Returns the removed nodes.
    pub fn prune(&mut self, node: NodeId) -> ProofResult<Vec<NodeId>> {
        let mut removed = Vec::new();
        let mut introduced: Vec<Name> = self.node(node)?.introduced.clone();
        let mut stack: Vec<NodeId> = self.node(node)?.children.clone();
        while let Some(id) = stack.pop() {
            let n = self
                .nodes
                .get_mut(id.0 as usize)
                .and_then(Option::take)
                .ok_or_else(|| ProofError::InvariantViolation(format!("{id} was already pruned")))?;
            stack.extend(n.children.iter().copied());
            introduced.extend(n.introduced);
            self.goals.remove(&id);
            removed.push(id);
        }
        // Names become available again, so a replay of the remaining
        // steps generates the same ones.
        self.forget_functions(&introduced);
        removed.sort();
        let gone: BTreeSet<NodeId> = removed.iter().copied().chain([node]).collect();
        self.history.retain(|id| !gone.contains(id));

        {
            let n = self.node_mut(node)?;
            n.children.clear();
            n.applied = None;
            n.introduced.clear();
            n.closed = false;
        }
        let mut current = self.node(node)?.parent;
        while let Some(id) = current {
            let n = self.node_mut(id)?;
            n.closed = false;
            current = n.parent;
        }
        let automatic = self.node(node)?.automatic;
        self.goals.insert(node, Goal { node, automatic });
        debug!("Pruned {} nodes below {node}.", removed.len());
        let events = [ProofEvent::Pruned {
            node,
            removed: removed.clone(),
        }];
        self.events.publish(&events);
        Ok(removed)
    }

    /// Rule applications on the branch above `goal`, oldest first.
    pub fn applied_on_branch(&self, goal: NodeId) -> ProofResult<Vec<&RuleApp>> {
        Ok(self
            .branch(goal)?
            .into_iter()
            .filter_map(|n| n.applied.as_ref().map(|a| &a.app))
            .collect())
    }
}
