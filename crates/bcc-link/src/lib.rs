//! BCC association reconciliation
//!
//! Brings the set of sub-resources linked to a parent resource (ports and
//! disks on a VM, ports and routes on a router, members of a load balancer
//! pool) from what the cloud API reports to what the configuration asks for.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │        resource Update / Delete phases           │
//! │     (VmLinks, RouterLinks, PoolLinks)            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                  bcc-link                        │
//! │  ┌──────────────┐  ┌──────────────────────┐     │
//! │  │   LinkPlan   │  │  Reconciler          │     │
//! │  │ (diff only)  │  │  detach → attach     │     │
//! │  └──────────────┘  └──────────┬───────────┘     │
//! │                    ┌──────────▼───────────┐     │
//! │                    │  retry_on_lock       │     │
//! │                    └──────────┬───────────┘     │
//! └───────────────────────────────┼─────────────────┘
//!                                 │
//!                   ┌─────────────▼─────────────┐
//!                   │   trait LinkApi { ... }    │
//!                   │ (cloud API / in-memory)    │
//!                   └───────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use bcc_link::{AssociationKind, ParentRef, Reconciler};
//!
//! let vm = ParentRef::vm("vm-1");
//! Reconciler::new(&api, AssociationKind::Port)
//!     .sync(&vm, &["port-a".into(), "port-b".into()])
//!     .await?;
//! ```

pub mod api;
pub mod association;
pub mod config;
pub mod error;
pub mod plan;
pub mod reconcile;
pub mod resource;
pub mod retry;

// Re-exports
pub use api::LinkApi;
pub use association::{AssociationId, AssociationKind, LockTarget, Owner, ParentKind, ParentRef};
pub use config::LinkSettings;
pub use error::{LinkError, Result};
pub use plan::{LinkAction, LinkActionType, LinkPlan, PlanSummary};
pub use reconcile::{MissingPolicy, ReconcileOptions, ReconcilePhase, Reconciler};
pub use resource::{
    NetworkLink, PoolLinks, PoolMember, ResourceSync, RouteLink, RouterLinks, VmLinks,
};
pub use retry::{Backoff, retry_on_lock, wait_unlocked};
