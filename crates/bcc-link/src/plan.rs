//! Attach/detach plans computed from desired and actual association sets

use crate::association::{AssociationId, AssociationKind};
use crate::error::{LinkError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single planned step for one association
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkAction {
    pub action_type: LinkActionType,
    pub association: AssociationId,
}

/// Type of step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkActionType {
    /// Link a desired association that is not linked yet
    Attach,
    /// Unlink an association that is no longer desired
    Detach,
    /// Present in both sets, nothing to do
    Keep,
}

impl std::fmt::Display for LinkActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkActionType::Attach => write!(f, "attach"),
            LinkActionType::Detach => write!(f, "detach"),
            LinkActionType::Keep => write!(f, "keep"),
        }
    }
}

/// Ordered plan: every detach precedes every attach
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkPlan {
    pub kind: AssociationKind,

    pub actions: Vec<LinkAction>,

    /// Whether the plan contains anything besides `Keep`
    pub has_changes: bool,
}

impl LinkPlan {
    /// Diff `actual` against `desired`.
    ///
    /// Detaches follow the order of `actual`, attaches the order of `desired`,
    /// keeps are listed last. Either list containing a duplicate is rejected.
    pub fn compute(
        kind: AssociationKind,
        desired: &[AssociationId],
        actual: &[AssociationId],
    ) -> Result<Self> {
        let desired_set = unique_set(desired, "desired")?;
        let actual_set = unique_set(actual, "actual")?;

        let detaches = actual
            .iter()
            .filter(|id| !desired_set.contains(id))
            .map(|id| LinkAction {
                action_type: LinkActionType::Detach,
                association: id.clone(),
            });

        let attaches = desired
            .iter()
            .filter(|id| !actual_set.contains(id))
            .map(|id| LinkAction {
                action_type: LinkActionType::Attach,
                association: id.clone(),
            });

        let keeps = desired
            .iter()
            .filter(|id| actual_set.contains(id))
            .map(|id| LinkAction {
                action_type: LinkActionType::Keep,
                association: id.clone(),
            });

        let actions: Vec<LinkAction> = detaches.chain(attaches).chain(keeps).collect();
        let has_changes = actions
            .iter()
            .any(|a| a.action_type != LinkActionType::Keep);

        Ok(Self {
            kind,
            actions,
            has_changes,
        })
    }

    /// Associations to unlink, in execution order
    pub fn detaches(&self) -> impl Iterator<Item = &AssociationId> {
        self.ids_of(LinkActionType::Detach)
    }

    /// Associations to link, in execution order
    pub fn attaches(&self) -> impl Iterator<Item = &AssociationId> {
        self.ids_of(LinkActionType::Attach)
    }

    fn ids_of(&self, action_type: LinkActionType) -> impl Iterator<Item = &AssociationId> {
        self.actions
            .iter()
            .filter(move |a| a.action_type == action_type)
            .map(|a| &a.association)
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            attach: self.attaches().count(),
            detach: self.detaches().count(),
            unchanged: self.ids_of(LinkActionType::Keep).count(),
        }
    }
}

fn unique_set<'a>(
    ids: &'a [AssociationId],
    set: &'static str,
) -> Result<HashSet<&'a AssociationId>> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id) {
            return Err(LinkError::DuplicateAssociation {
                id: id.to_string(),
                set,
            });
        }
    }
    Ok(seen)
}

/// Counts of planned steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub attach: usize,
    pub detach: usize,
    pub unchanged: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to attach, {} to detach, {} unchanged",
            self.attach, self.detach, self.unchanged
        )
    }
}
