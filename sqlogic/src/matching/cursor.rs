use smallvec::SmallVec;

use crate::term::Term;

/// Pre-order walk over a concrete term, driven by the match instructions.
pub(crate) struct TermCursor<'t> {
    current: Option<&'t Term>,
    /// `(parent, index of the child currently visited)` for every ancestor.
    stack: SmallVec<(&'t Term, usize), 16>,
}

impl<'t> TermCursor<'t> {
    pub fn new(root: &'t Term) -> Self {
        Self {
            current: Some(root),
            stack: SmallVec::new(),
        }
    }

    #[inline]
    pub fn current(&self) -> Option<&'t Term> {
        self.current
    }

    /// Term whose sub-term is currently visited.
    #[inline]
    pub fn parent(&self) -> Option<&'t Term> {
        self.stack.last().map(|(p, _)| *p)
    }

    /// First sub-term of the current term, or the next sibling if it has none.
    pub fn goto_next(&mut self) {
        match self.current {
            Some(t) if t.arity() > 0 => {
                self.stack.push((t, 0));
                self.current = Some(t.sub(0));
            }
            Some(_) => self.goto_next_sibling(),
            None => {}
        }
    }

    /// Skips the subtree of the current term.
    pub fn goto_next_sibling(&mut self) {
        while let Some((parent, i)) = self.stack.pop() {
            if i + 1 < parent.arity() {
                self.stack.push((parent, i + 1));
                self.current = Some(parent.sub(i + 1));
                return;
            }
        }
        self.current = None;
    }
}
