//! In-memory cloud backend

use crate::fixture::Fixture;
use crate::journal::Call;
use async_trait::async_trait;
use bcc_link::{
    AssociationId, AssociationKind, LinkApi, LinkError, LockTarget, Owner, ParentRef, Result,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Which call an injected failure applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FetchAssociations,
    Attach,
    Detach,
    FetchOwner,
    IsLocked,
}

#[derive(Debug)]
struct AssociationRecord {
    kind: AssociationKind,
    id: AssociationId,
    owner: Option<ParentRef>,
}

#[derive(Debug, Default)]
struct CloudState {
    /// Parent and whether it is live
    parents: Vec<(ParentRef, bool)>,
    associations: Vec<AssociationRecord>,
    /// Remaining interactions each lock holds out for
    locks: HashMap<LockTarget, u32>,
    failures: VecDeque<(Operation, LinkError)>,
    journal: Vec<Call>,
}

impl CloudState {
    fn parent_live(&self, parent: &ParentRef) -> Option<bool> {
        self.parents
            .iter()
            .find(|(p, _)| p == parent)
            .map(|(_, live)| *live)
    }

    fn require_parent(&self, parent: &ParentRef) -> Result<()> {
        match self.parent_live(parent) {
            Some(_) => Ok(()),
            None => Err(LinkError::ParentNotFound(parent.to_string())),
        }
    }

    fn record_mut(
        &mut self,
        kind: AssociationKind,
        id: &AssociationId,
    ) -> Result<&mut AssociationRecord> {
        self.associations
            .iter_mut()
            .find(|r| r.kind == kind && r.id == *id)
            .ok_or_else(|| LinkError::AssociationNotFound(format!("{}/{}", kind, id)))
    }

    fn take_failure(&mut self, op: Operation) -> Option<LinkError> {
        let pos = self.failures.iter().position(|(o, _)| *o == op)?;
        self.failures.remove(pos).map(|(_, err)| err)
    }

    /// Consumes one interaction of the lock on `target`, if any
    fn touch_lock(&mut self, target: &LockTarget) -> bool {
        match self.locks.get_mut(target) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

/// `LinkApi` implementation holding the whole topology in memory.
///
/// Locks are counted in interactions rather than time: a target locked for
/// `n` answers the next `n` mutating calls with `ResourceLocked` and the next
/// `n` lock polls with `true`, whichever come first.
#[derive(Debug, Default)]
pub struct InMemoryCloud {
    state: Mutex<CloudState>,
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: &Fixture) -> Self {
        let cloud = Self::new();
        for parent in &fixture.parents {
            cloud.add_parent(parent.parent.clone(), parent.live);
        }
        for assoc in &fixture.associations {
            cloud.add_association(assoc.kind, assoc.id.as_str(), assoc.owner.clone());
        }
        cloud
    }

    fn state(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_parent(&self, parent: ParentRef, live: bool) {
        let mut state = self.state();
        state.parents.retain(|(p, _)| *p != parent);
        state.parents.push((parent, live));
    }

    pub fn with_parent(self, parent: ParentRef) -> Self {
        self.add_parent(parent, true);
        self
    }

    /// Mark a parent as being torn down, or bring it back
    pub fn set_live(&self, parent: &ParentRef, live: bool) {
        let mut state = self.state();
        if let Some(entry) = state.parents.iter_mut().find(|(p, _)| p == parent) {
            entry.1 = live;
        }
    }

    pub fn add_association(&self, kind: AssociationKind, id: &str, owner: Option<ParentRef>) {
        let id = AssociationId::from(id);
        let mut state = self.state();
        state.associations.retain(|r| !(r.kind == kind && r.id == id));
        state.associations.push(AssociationRecord { kind, id, owner });
    }

    pub fn with_association(
        self,
        kind: AssociationKind,
        id: &str,
        owner: Option<&ParentRef>,
    ) -> Self {
        self.add_association(kind, id, owner.cloned());
        self
    }

    /// Delete an association behind the reconciler's back
    pub fn remove_association(&self, kind: AssociationKind, id: &str) {
        let id = AssociationId::from(id);
        self.state()
            .associations
            .retain(|r| !(r.kind == kind && r.id == id));
    }

    /// Hold `target` locked for the next `interactions` calls touching it
    pub fn lock(&self, target: impl Into<LockTarget>, interactions: u32) {
        self.state().locks.insert(target.into(), interactions);
    }

    /// Fail the next call of `op` with `error`
    pub fn fail_next(&self, op: Operation, error: LinkError) {
        self.state().failures.push_back((op, error));
    }

    /// Current owner of an association, bypassing the journal
    pub fn owner_of(&self, kind: AssociationKind, id: &str) -> Option<ParentRef> {
        let id = AssociationId::from(id);
        self.state()
            .associations
            .iter()
            .find(|r| r.kind == kind && r.id == id)
            .and_then(|r| r.owner.clone())
    }

    /// Associations linked to `parent`, bypassing the journal
    pub fn linked(&self, parent: &ParentRef, kind: AssociationKind) -> Vec<AssociationId> {
        self.state()
            .associations
            .iter()
            .filter(|r| r.kind == kind && r.owner.as_ref() == Some(parent))
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn journal(&self) -> Vec<Call> {
        self.state().journal.clone()
    }

    /// Attach and detach calls only
    pub fn mutations(&self) -> Vec<Call> {
        self.state()
            .journal
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_journal(&self) {
        self.state().journal.clear();
    }
}

#[async_trait]
impl LinkApi for InMemoryCloud {
    async fn fetch_associations(
        &self,
        parent: &ParentRef,
        kind: AssociationKind,
    ) -> Result<Vec<AssociationId>> {
        let mut state = self.state();
        state.journal.push(Call::FetchAssociations {
            parent: parent.clone(),
            kind,
        });
        if let Some(err) = state.take_failure(Operation::FetchAssociations) {
            return Err(err);
        }
        state.require_parent(parent)?;

        Ok(state
            .associations
            .iter()
            .filter(|r| r.kind == kind && r.owner.as_ref() == Some(parent))
            .map(|r| r.id.clone())
            .collect())
    }

    async fn attach(
        &self,
        parent: &ParentRef,
        kind: AssociationKind,
        id: &AssociationId,
        exclusive: bool,
    ) -> Result<()> {
        let mut state = self.state();
        state.journal.push(Call::Attach {
            parent: parent.clone(),
            kind,
            id: id.clone(),
        });
        if let Some(err) = state.take_failure(Operation::Attach) {
            return Err(err);
        }
        state.require_parent(parent)?;
        if state.touch_lock(&LockTarget::Parent(parent.clone())) {
            return Err(LinkError::ResourceLocked(parent.to_string()));
        }
        if !kind.accepts(parent.kind) {
            return Err(LinkError::InvalidConfig(format!(
                "{} cannot be attached to {}",
                kind, parent
            )));
        }

        // a deleted owner no longer holds anything
        let current = state.record_mut(kind, id)?.owner.clone();
        let dangling = current
            .as_ref()
            .is_some_and(|owner| state.parent_live(owner).is_none());
        let record = state.record_mut(kind, id)?;
        if let Some(owner) = &record.owner {
            if owner != parent && exclusive && !dangling {
                return Err(LinkError::ForeignAttachConflict {
                    association: format!("{}/{}", kind, id),
                    owner: owner.to_string(),
                    parent: parent.to_string(),
                });
            }
        }
        record.owner = Some(parent.clone());
        tracing::debug!(%parent, association = %id, "attached");
        Ok(())
    }

    async fn detach(
        &self,
        parent: &ParentRef,
        kind: AssociationKind,
        id: &AssociationId,
    ) -> Result<()> {
        let mut state = self.state();
        state.journal.push(Call::Detach {
            parent: parent.clone(),
            kind,
            id: id.clone(),
        });
        if let Some(err) = state.take_failure(Operation::Detach) {
            return Err(err);
        }
        state.require_parent(parent)?;
        if state.touch_lock(&LockTarget::Parent(parent.clone())) {
            return Err(LinkError::ResourceLocked(parent.to_string()));
        }

        let record = state.record_mut(kind, id)?;
        if record.owner.as_ref() != Some(parent) {
            return Err(LinkError::Transport(format!(
                "{}/{} is not attached to {}",
                kind, id, parent
            )));
        }
        record.owner = None;
        tracing::debug!(%parent, association = %id, "detached");
        Ok(())
    }

    async fn fetch_owner(
        &self,
        kind: AssociationKind,
        id: &AssociationId,
    ) -> Result<Option<Owner>> {
        let mut state = self.state();
        state.journal.push(Call::FetchOwner {
            kind,
            id: id.clone(),
        });
        if let Some(err) = state.take_failure(Operation::FetchOwner) {
            return Err(err);
        }

        let owner = state.record_mut(kind, id)?.owner.clone();
        Ok(owner.map(|parent| {
            // an owner missing from the parent table is a dangling reference
            let live = state.parent_live(&parent).unwrap_or(false);
            Owner { parent, live }
        }))
    }

    async fn is_locked(&self, target: &LockTarget) -> Result<bool> {
        let mut state = self.state();
        state.journal.push(Call::IsLocked(target.clone()));
        if let Some(err) = state.take_failure(Operation::IsLocked) {
            return Err(err);
        }
        Ok(state.touch_lock(target))
    }
}
