use std::{borrow::Borrow, fmt, ops::Deref, sync::Arc};

/// Identifier of sorts, operators, schema variables, rules and rule sets.
///
/// Cloning is a reference-count bump; comparisons go through the string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Arc<str>);

impl Name {
    pub fn new(s: impl AsRef<str>) -> Self {
        Name(Arc::from(s.as_ref()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Schema variables for program constructs are conventionally prefixed with `#`.
    pub fn is_hash_prefixed(&self) -> bool {
        self.0.starts_with('#')
    }

    /// Derives a name `base_N` with the smallest `N` for which `taken` answers false.
    pub fn fresh_variant(base: &str, mut taken: impl FnMut(&str) -> bool) -> Name {
        let base = base.trim_start_matches('#');
        if !taken(base) {
            return Name::new(base);
        }
        let mut counter = 0usize;
        loop {
            let candidate = format!("{base}_{counter}");
            if !taken(&candidate) {
                return Name::new(candidate);
            }
            counter += 1;
        }
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::new(s)
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name(Arc::from(s))
    }
}

impl From<&Name> for Name {
    fn from(n: &Name) -> Self {
        n.clone()
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for Name {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_variant_skips_taken_names() {
        let taken = ["sk", "sk_0", "sk_1"];
        let n = Name::fresh_variant("#sk", |c| taken.contains(&c));
        assert_eq!(n.as_str(), "sk_2");
        let n = Name::fresh_variant("x", |_| false);
        assert_eq!(n.as_str(), "x");
    }
}
