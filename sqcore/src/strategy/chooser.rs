//! Which goal the prover works on next.
use super::cost::RuleAppCost;
use crate::{proof::NodeId, settings::GoalChooserKind};

pub trait GoalChooser: Send + Sync {
    fn name(&self) -> &str;

    /// Picks among automatic goals paired with the cost of their best
    /// application; all costs are finite. Candidates come in serial order.
    fn choose(&self, candidates: &[(NodeId, RuleAppCost)]) -> Option<NodeId>;
}

/// Cheapest best application; the lower serial on ties.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultGoalChooser;

impl GoalChooser for DefaultGoalChooser {
    fn name(&self) -> &str {
        "default"
    }

    fn choose(&self, candidates: &[(NodeId, RuleAppCost)]) -> Option<NodeId> {
        candidates.iter().min_by_key(|(id, cost)| (*cost, *id)).map(|(id, _)| *id)
    }
}

/// Newest goal first.
#[derive(Debug, Default, Clone, Copy)]
pub struct DepthFirstGoalChooser;

impl GoalChooser for DepthFirstGoalChooser {
    fn name(&self) -> &str {
        "depth_first"
    }

    fn choose(&self, candidates: &[(NodeId, RuleAppCost)]) -> Option<NodeId> {
        candidates.iter().map(|(id, _)| *id).max()
    }
}

pub fn goal_chooser(kind: GoalChooserKind) -> Box<dyn GoalChooser> {
    match kind {
        GoalChooserKind::Default => Box::new(DefaultGoalChooser),
        GoalChooserKind::DepthFirst => Box::new(DepthFirstGoalChooser),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choosers_break_ties_by_serial() {
        let candidates = [
            (NodeId(3), RuleAppCost::Number(10)),
            (NodeId(5), RuleAppCost::Number(2)),
            (NodeId(7), RuleAppCost::Number(2)),
        ];
        assert_eq!(DefaultGoalChooser.choose(&candidates), Some(NodeId(5)));
        assert_eq!(DepthFirstGoalChooser.choose(&candidates), Some(NodeId(7)));
        assert_eq!(DefaultGoalChooser.choose(&[]), None);
    }
}
