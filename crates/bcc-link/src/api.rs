//! External API collaborator trait

use crate::association::{AssociationId, AssociationKind, LockTarget, Owner, ParentRef};
use crate::error::Result;
use async_trait::async_trait;

/// Capability set the reconciler needs from the cloud management API
///
/// Backends report failures as `LinkError` kinds: `ResourceLocked` for
/// transient lock contention, `AssociationNotFound`/`ParentNotFound` for
/// identifiers that no longer resolve, `Transport`/`Timeout` for everything
/// on the wire.
#[async_trait]
pub trait LinkApi: Send + Sync {
    /// Associations of `kind` currently linked to `parent`
    async fn fetch_associations(
        &self,
        parent: &ParentRef,
        kind: AssociationKind,
    ) -> Result<Vec<AssociationId>>;

    /// Link `id` to `parent`. With `exclusive`, the backend refuses to share it.
    async fn attach(
        &self,
        parent: &ParentRef,
        kind: AssociationKind,
        id: &AssociationId,
        exclusive: bool,
    ) -> Result<()>;

    /// Unlink `id` from `parent`
    async fn detach(&self, parent: &ParentRef, kind: AssociationKind, id: &AssociationId)
    -> Result<()>;

    /// Current owner of `id`, `None` when it is not linked anywhere
    async fn fetch_owner(&self, kind: AssociationKind, id: &AssociationId)
    -> Result<Option<Owner>>;

    /// Whether an asynchronous operation currently holds `target`
    async fn is_locked(&self, target: &LockTarget) -> Result<bool>;
}
