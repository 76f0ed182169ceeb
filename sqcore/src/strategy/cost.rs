use std::{cmp::Ordering, fmt, ops::Add};

/// Cost of a rule application; lower is applied first.
///
/// [`RuleAppCost::Top`] is larger than every number and means "never apply
/// automatically". Addition saturates and `Top` absorbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleAppCost {
    Number(i64),
    Top,
}

impl RuleAppCost {
    pub const ZERO: RuleAppCost = RuleAppCost::Number(0);

    pub fn is_top(self) -> bool {
        matches!(self, RuleAppCost::Top)
    }

    pub fn number(self) -> Option<i64> {
        match self {
            RuleAppCost::Number(n) => Some(n),
            RuleAppCost::Top => None,
        }
    }

    /// `self * factor`; `Top` stays `Top`.
    pub fn scale(self, factor: i64) -> RuleAppCost {
        match self {
            RuleAppCost::Number(n) => RuleAppCost::Number(n.saturating_mul(factor)),
            RuleAppCost::Top => RuleAppCost::Top,
        }
    }
}

impl From<i64> for RuleAppCost {
    fn from(n: i64) -> Self {
        RuleAppCost::Number(n)
    }
}

impl Add for RuleAppCost {
    type Output = RuleAppCost;

    fn add(self, rhs: RuleAppCost) -> RuleAppCost {
        match (self, rhs) {
            (RuleAppCost::Number(a), RuleAppCost::Number(b)) => RuleAppCost::Number(a.saturating_add(b)),
            _ => RuleAppCost::Top,
        }
    }
}

impl Ord for RuleAppCost {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (RuleAppCost::Number(a), RuleAppCost::Number(b)) => a.cmp(b),
            (RuleAppCost::Number(_), RuleAppCost::Top) => Ordering::Less,
            (RuleAppCost::Top, RuleAppCost::Number(_)) => Ordering::Greater,
            (RuleAppCost::Top, RuleAppCost::Top) => Ordering::Equal,
        }
    }
}

impl PartialOrd for RuleAppCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RuleAppCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAppCost::Number(n) => write!(f, "{n}"),
            RuleAppCost::Top => write!(f, "top"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_absorbs_and_sorts_last() {
        let a = RuleAppCost::from(5);
        assert_eq!(a + RuleAppCost::from(-2), RuleAppCost::Number(3));
        assert_eq!(a + RuleAppCost::Top, RuleAppCost::Top);
        assert_eq!(RuleAppCost::Number(i64::MAX) + a, RuleAppCost::Number(i64::MAX));
        assert!(RuleAppCost::Number(i64::MAX) < RuleAppCost::Top);
        let mut costs = vec![RuleAppCost::Top, a, RuleAppCost::ZERO];
        costs.sort();
        assert_eq!(costs, vec![RuleAppCost::ZERO, a, RuleAppCost::Top]);
    }
}
