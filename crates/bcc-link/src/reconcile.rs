//! Desired-vs-actual association reconciliation
//!
//! One reconciler instance handles one association kind. Each call walks
//! `FetchingActual → Removing → Adding → Done` and stops at the first
//! unrecoverable error; nothing is kept between calls.

use crate::api::LinkApi;
use crate::association::{AssociationId, AssociationKind, LockTarget, Owner, ParentRef};
use crate::error::{LinkError, Result};
use crate::plan::LinkPlan;
use crate::retry::{Backoff, retry_on_lock, wait_unlocked};
use serde::{Deserialize, Serialize};

/// What to do with an association that vanished before it could be detached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Surface `AssociationNotFound`
    #[default]
    Fail,
    /// Treat it as already detached
    Skip,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub missing: MissingPolicy,

    /// Take associations away from live owners of a different parent kind
    pub force_foreign: bool,
}

/// Phase of a single reconciliation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePhase {
    FetchingActual,
    Removing,
    Adding,
    Done,
    Failed,
}

impl std::fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcilePhase::FetchingActual => write!(f, "fetching-actual"),
            ReconcilePhase::Removing => write!(f, "removing"),
            ReconcilePhase::Adding => write!(f, "adding"),
            ReconcilePhase::Done => write!(f, "done"),
            ReconcilePhase::Failed => write!(f, "failed"),
        }
    }
}

/// Brings the associations of one kind on a parent to a desired set
pub struct Reconciler<'a, A: LinkApi + ?Sized> {
    api: &'a A,
    kind: AssociationKind,
    backoff: Backoff,
    options: ReconcileOptions,
}

impl<'a, A: LinkApi + ?Sized> Reconciler<'a, A> {
    pub fn new(api: &'a A, kind: AssociationKind) -> Self {
        Self {
            api,
            kind,
            backoff: Backoff::default(),
            options: ReconcileOptions::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn kind(&self) -> AssociationKind {
        self.kind
    }

    /// Diff without touching the API
    pub fn plan(&self, desired: &[AssociationId], actual: &[AssociationId]) -> Result<LinkPlan> {
        LinkPlan::compute(self.kind, desired, actual)
    }

    /// Fetch the actual set from the API, then reconcile against it
    pub async fn sync(&self, parent: &ParentRef, desired: &[AssociationId]) -> Result<()> {
        self.check_parent(parent)?;
        self.enter(parent, ReconcilePhase::FetchingActual);
        let actual = self
            .api
            .fetch_associations(parent, self.kind)
            .await
            .map_err(|e| self.fail(parent, e))?;
        self.reconcile(parent, desired, &actual).await
    }

    /// Detach everything not in `desired`, then attach everything missing.
    ///
    /// Already-applied steps stay in effect when a later step fails; calling
    /// again computes a fresh diff against whatever the API reports then.
    pub async fn reconcile(
        &self,
        parent: &ParentRef,
        desired: &[AssociationId],
        actual: &[AssociationId],
    ) -> Result<()> {
        self.check_parent(parent)?;
        let plan = self.plan(desired, actual)?;
        self.apply(parent, &plan, self.options.missing).await
    }

    /// Detach every association currently linked to `parent`.
    ///
    /// Used before the parent itself is deleted. Associations that are
    /// already gone are skipped regardless of the configured policy.
    pub async fn release_all(&self, parent: &ParentRef) -> Result<()> {
        self.check_parent(parent)?;
        self.enter(parent, ReconcilePhase::FetchingActual);
        let actual = self
            .api
            .fetch_associations(parent, self.kind)
            .await
            .map_err(|e| self.fail(parent, e))?;
        let plan = self.plan(&[], &actual)?;
        self.apply(parent, &plan, MissingPolicy::Skip).await?;

        wait_unlocked(self.api, &LockTarget::Parent(parent.clone()), &self.backoff).await
    }

    async fn apply(
        &self,
        parent: &ParentRef,
        plan: &LinkPlan,
        missing: MissingPolicy,
    ) -> Result<()> {
        if !plan.has_changes {
            tracing::debug!(%parent, kind = %self.kind, "Associations already in sync");
            self.enter(parent, ReconcilePhase::Done);
            return Ok(());
        }
        tracing::info!(%parent, kind = %self.kind, "{}", plan.summary());

        self.enter(parent, ReconcilePhase::Removing);
        for id in plan.detaches() {
            self.detach_owned(parent, id, missing)
                .await
                .map_err(|e| self.fail(parent, e))?;
        }

        self.enter(parent, ReconcilePhase::Adding);
        for id in plan.attaches() {
            self.attach_exclusive(parent, id)
                .await
                .map_err(|e| self.fail(parent, e))?;
        }

        self.enter(parent, ReconcilePhase::Done);
        Ok(())
    }

    async fn detach_owned(
        &self,
        parent: &ParentRef,
        id: &AssociationId,
        missing: MissingPolicy,
    ) -> Result<()> {
        let owner = match self.api.fetch_owner(self.kind, id).await {
            Ok(owner) => owner,
            Err(LinkError::AssociationNotFound(_)) if missing == MissingPolicy::Skip => {
                tracing::debug!(%parent, association = %id, "Association already gone");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match owner {
            Some(owner) if owner.parent == *parent => {
                tracing::info!(%parent, kind = %self.kind, association = %id, "Detaching");
                self.detach_from(parent, id).await
            }
            Some(owner) => {
                tracing::debug!(
                    %parent,
                    association = %id,
                    owner = %owner.parent,
                    "Association moved to another parent, skipping detach"
                );
                Ok(())
            }
            None => {
                tracing::debug!(%parent, association = %id, "Association already detached");
                Ok(())
            }
        }
    }

    async fn attach_exclusive(&self, parent: &ParentRef, id: &AssociationId) -> Result<()> {
        match self.api.fetch_owner(self.kind, id).await? {
            Some(owner) if owner.parent == *parent => {
                tracing::debug!(%parent, association = %id, "Association already attached");
                return Ok(());
            }
            Some(owner) => {
                if !self.may_take_over(parent, &owner) {
                    return Err(LinkError::ForeignAttachConflict {
                        association: format!("{}/{}", self.kind, id),
                        owner: owner.parent.to_string(),
                        parent: parent.to_string(),
                    });
                }
                tracing::info!(
                    %parent,
                    association = %id,
                    owner = %owner.parent,
                    "Detaching association from previous owner"
                );
                self.release_foreign(&owner, id).await?;
            }
            None => {}
        }

        tracing::info!(%parent, kind = %self.kind, association = %id, "Attaching");
        let target = LockTarget::Parent(parent.clone());
        retry_on_lock(self.api, &target, &self.backoff, || {
            self.api.attach(parent, self.kind, id, true)
        })
        .await
    }

    /// Detach `id` from a foreign owner and wait until the association
    /// itself is unlocked.
    ///
    /// An owner that is no longer live may already be deleted, in which case
    /// the association counts as freed.
    async fn release_foreign(&self, owner: &Owner, id: &AssociationId) -> Result<()> {
        match self.detach_from(&owner.parent, id).await {
            Ok(()) => {}
            Err(LinkError::ParentNotFound(_) | LinkError::AssociationNotFound(_))
                if !owner.live =>
            {
                tracing::debug!(
                    association = %id,
                    owner = %owner.parent,
                    "Previous owner no longer exists"
                );
            }
            Err(e) => return Err(e),
        }

        let target = LockTarget::Association(self.kind, id.clone());
        wait_unlocked(self.api, &target, &self.backoff).await
    }

    async fn detach_from(&self, parent: &ParentRef, id: &AssociationId) -> Result<()> {
        let target = LockTarget::Parent(parent.clone());
        retry_on_lock(self.api, &target, &self.backoff, || {
            self.api.detach(parent, self.kind, id)
        })
        .await
    }

    /// Same-kind owners and owners without a live parent can be displaced.
    /// Anything else needs `force_foreign`.
    fn may_take_over(&self, parent: &ParentRef, owner: &Owner) -> bool {
        self.options.force_foreign || !owner.live || owner.parent.kind == parent.kind
    }

    fn check_parent(&self, parent: &ParentRef) -> Result<()> {
        if self.kind.accepts(parent.kind) {
            Ok(())
        } else {
            Err(LinkError::InvalidConfig(format!(
                "{} associations cannot be linked to {}",
                self.kind, parent
            )))
        }
    }

    fn enter(&self, parent: &ParentRef, phase: ReconcilePhase) {
        tracing::debug!(%parent, kind = %self.kind, %phase, "Reconcile phase");
    }

    fn fail(&self, parent: &ParentRef, err: LinkError) -> LinkError {
        tracing::debug!(
            %parent,
            kind = %self.kind,
            phase = %ReconcilePhase::Failed,
            error = %err,
            "Reconcile phase"
        );
        err
    }
}
