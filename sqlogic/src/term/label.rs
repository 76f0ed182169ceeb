use std::{fmt, sync::Arc};

use smallvec::SmallVec;
use strum::EnumIs;

use crate::{name::Name, op::SchemaVariable};

/// Annotation attached to a term without changing its meaning.
///
/// Patterns may carry label schema variables, which capture the labels of
/// the matched term that are not explicitly named by the pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum TermLabel {
    Named {
        name: Name,
        params: SmallVec<Name, 1>,
    },
    Schema(Arc<SchemaVariable>),
}

impl TermLabel {
    pub fn named(name: impl Into<Name>) -> Self {
        TermLabel::Named {
            name: name.into(),
            params: SmallVec::new(),
        }
    }

    pub fn with_params(name: impl Into<Name>, params: impl IntoIterator<Item = Name>) -> Self {
        TermLabel::Named {
            name: name.into(),
            params: params.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &Name {
        match self {
            TermLabel::Named { name, .. } => name,
            TermLabel::Schema(sv) => sv.name(),
        }
    }
}

impl fmt::Display for TermLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermLabel::Named { name, params } if params.is_empty() => write!(f, "{name}"),
            TermLabel::Named { name, params } => {
                write!(f, "{name}(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
            TermLabel::Schema(sv) => write!(f, "{}", sv.name()),
        }
    }
}
