//! Association data model
//!
//! An association is a sub-resource (port, disk, route, pool member) that is
//! linked to at most one parent resource (VM, router, load balancer) at a time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of an association on the external system
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssociationId(String);

impl AssociationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssociationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssociationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AssociationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Kind of sub-resource being linked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    Port,
    Disk,
    Route,
    PoolMember,
}

impl AssociationKind {
    /// Whether an association of this kind can be linked to a parent of `parent` kind
    pub fn accepts(&self, parent: ParentKind) -> bool {
        matches!(
            (self, parent),
            (AssociationKind::Port, ParentKind::Vm)
                | (AssociationKind::Port, ParentKind::Router)
                | (AssociationKind::Disk, ParentKind::Vm)
                | (AssociationKind::Route, ParentKind::Router)
                | (AssociationKind::PoolMember, ParentKind::LoadBalancer)
        )
    }
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssociationKind::Port => write!(f, "port"),
            AssociationKind::Disk => write!(f, "disk"),
            AssociationKind::Route => write!(f, "route"),
            AssociationKind::PoolMember => write!(f, "pool-member"),
        }
    }
}

/// Kind of owning resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentKind {
    Vm,
    Router,
    LoadBalancer,
}

impl fmt::Display for ParentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentKind::Vm => write!(f, "vm"),
            ParentKind::Router => write!(f, "router"),
            ParentKind::LoadBalancer => write!(f, "lbaas"),
        }
    }
}

/// Reference to a parent resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    pub id: String,
    pub kind: ParentKind,
}

impl ParentRef {
    pub fn new(kind: ParentKind, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn vm(id: impl Into<String>) -> Self {
        Self::new(ParentKind::Vm, id)
    }

    pub fn router(id: impl Into<String>) -> Self {
        Self::new(ParentKind::Router, id)
    }

    pub fn load_balancer(id: impl Into<String>) -> Self {
        Self::new(ParentKind::LoadBalancer, id)
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Current holder of an association as reported by the external API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub parent: ParentRef,

    /// `false` when the owner is being torn down or no longer exists
    pub live: bool,
}

impl Owner {
    pub fn live(parent: ParentRef) -> Self {
        Self { parent, live: true }
    }

    pub fn stale(parent: ParentRef) -> Self {
        Self {
            parent,
            live: false,
        }
    }
}

/// A resource whose lock status can be polled
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockTarget {
    Parent(ParentRef),
    Association(AssociationKind, AssociationId),
}

impl fmt::Display for LockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockTarget::Parent(parent) => write!(f, "{}", parent),
            LockTarget::Association(kind, id) => write!(f, "{}/{}", kind, id),
        }
    }
}

impl From<ParentRef> for LockTarget {
    fn from(parent: ParentRef) -> Self {
        LockTarget::Parent(parent)
    }
}
