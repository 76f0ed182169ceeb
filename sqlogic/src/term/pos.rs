use std::fmt;

use smallvec::SmallVec;

/// Path of sub-term indices from the root of a formula.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PosInTerm(SmallVec<u16, 8>);

impl PosInTerm {
    pub fn top() -> Self {
        PosInTerm(SmallVec::new())
    }

    pub fn from_indices(indices: impl IntoIterator<Item = u16>) -> Self {
        PosInTerm(indices.into_iter().collect())
    }

    pub fn is_top(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn indices(&self) -> &[u16] {
        &self.0
    }

    /// Position of the `i`-th sub-term below this one.
    pub fn down(&self, i: usize) -> Self {
        let mut p = self.0.clone();
        p.push(i as u16);
        PosInTerm(p)
    }

    /// Parent position; the top position is its own parent.
    pub fn up(&self) -> Self {
        let mut p = self.0.clone();
        p.pop();
        PosInTerm(p)
    }

    pub fn last_index(&self) -> Option<usize> {
        self.0.last().map(|i| *i as usize)
    }

    /// Whether `self` lies on the path to (or equals) `other`.
    pub fn is_prefix_of(&self, other: &PosInTerm) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }
}

impl fmt::Display for PosInTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "top");
        }
        for (i, idx) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{idx}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PosInTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PosInTerm({self})")
    }
}
