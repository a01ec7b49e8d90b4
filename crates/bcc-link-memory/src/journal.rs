//! Record of every call made against the in-memory backend

use bcc_link::{AssociationId, AssociationKind, LockTarget, ParentRef};
use std::fmt;

/// A single `LinkApi` call, recorded whether it succeeded or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchAssociations {
        parent: ParentRef,
        kind: AssociationKind,
    },
    Attach {
        parent: ParentRef,
        kind: AssociationKind,
        id: AssociationId,
    },
    Detach {
        parent: ParentRef,
        kind: AssociationKind,
        id: AssociationId,
    },
    FetchOwner {
        kind: AssociationKind,
        id: AssociationId,
    },
    IsLocked(LockTarget),
}

impl Call {
    pub fn attach(parent: &ParentRef, kind: AssociationKind, id: &str) -> Self {
        Call::Attach {
            parent: parent.clone(),
            kind,
            id: id.into(),
        }
    }

    pub fn detach(parent: &ParentRef, kind: AssociationKind, id: &str) -> Self {
        Call::Detach {
            parent: parent.clone(),
            kind,
            id: id.into(),
        }
    }

    /// Attach and detach are the only calls that change state
    pub fn is_mutation(&self) -> bool {
        matches!(self, Call::Attach { .. } | Call::Detach { .. })
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::FetchAssociations { parent, kind } => {
                write!(f, "fetch-associations {} {}", parent, kind)
            }
            Call::Attach { parent, kind, id } => write!(f, "attach {}/{} -> {}", kind, id, parent),
            Call::Detach { parent, kind, id } => write!(f, "detach {}/{} <- {}", kind, id, parent),
            Call::FetchOwner { kind, id } => write!(f, "fetch-owner {}/{}", kind, id),
            Call::IsLocked(target) => write!(f, "is-locked {}", target),
        }
    }
}
