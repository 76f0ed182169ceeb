//! Sequent changes of one rule application, per resulting goal.
use std::collections::BTreeMap;

use sqlogic::sequent::{Sequent, SequentChangeInfo};

use super::NodeId;

/// Change journal of a single rule application.
///
/// Recording starts on the goal the rule is applied to. When that goal is
/// replaced by several goals, [`Self::split`] hands a copy of the pending
/// record to each of them, so every branch ends up with the complete
/// change from the parent sequent to its own.
#[derive(Debug, Clone)]
pub struct NodeChangeJournal {
    node: NodeId,
    changes: BTreeMap<NodeId, SequentChangeInfo>,
}

impl NodeChangeJournal {
    pub fn new(node: NodeId, sequent: &Sequent) -> Self {
        let mut changes = BTreeMap::new();
        changes.insert(node, SequentChangeInfo::unchanged(sequent));
        Self { node, changes }
    }

    /// Node the recorded rule was applied to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Appends `change` to the record of `goal`.
    pub fn record(&mut self, goal: NodeId, change: SequentChangeInfo) {
        let merged = match self.changes.remove(&goal) {
            Some(earlier) => earlier.combine(change),
            None => change,
        };
        self.changes.insert(goal, merged);
    }

    /// Replaces the record of `goal` by one copy per new goal.
    pub fn split(&mut self, goal: NodeId, into: &[NodeId]) {
        let Some(pending) = self.changes.remove(&goal) else {
            return;
        };
        for id in into {
            self.changes.insert(*id, pending.clone());
        }
    }

    pub fn change(&self, goal: NodeId) -> Option<&SequentChangeInfo> {
        self.changes.get(&goal)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SequentChangeInfo)> {
        self.changes.iter().map(|(id, c)| (*id, c))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use sqlogic::{
        sequent::{SequentFormula, Side},
        services::Services,
    };

    use super::*;

    #[test]
    fn split_records_continue_independently() {
        let services = Services::default();
        let tb = services.tb();
        let start = Sequent::empty();
        let mut journal = NodeChangeJournal::new(NodeId(0), &start);

        let first = start.insert_last(Side::Succedent, SequentFormula::new(tb.tt().unwrap()).unwrap());
        let after_first = first.result.clone();
        journal.record(NodeId(0), first);
        journal.split(NodeId(0), &[NodeId(1), NodeId(2)]);
        assert!(journal.change(NodeId(0)).is_none());

        let second = after_first.insert_last(Side::Antecedent, SequentFormula::new(tb.ff().unwrap()).unwrap());
        journal.record(NodeId(2), second);

        let left = journal.change(NodeId(1)).unwrap();
        let right = journal.change(NodeId(2)).unwrap();
        assert_eq!(left.added(Side::Succedent).len(), 1);
        assert!(left.added(Side::Antecedent).is_empty());
        assert_eq!(right.added(Side::Succedent).len(), 1);
        assert_eq!(right.added(Side::Antecedent).len(), 1);
        assert_eq!(right.original, start);
        assert_eq!(journal.len(), 2);
    }
}
