use bcc_link::{AssociationId, AssociationKind, ParentRef};
use bcc_link_memory::{Call, InMemoryCloud};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn ids(raw: &[&str]) -> Vec<AssociationId> {
    raw.iter().map(|s| AssociationId::from(*s)).collect()
}

/// A cloud with the given parents and ports `A`..`F`, none attached
#[allow(dead_code)]
pub fn cloud_with_ports(parents: &[&ParentRef]) -> InMemoryCloud {
    let cloud = InMemoryCloud::new();
    for parent in parents {
        cloud.add_parent((*parent).clone(), true);
    }
    for id in ["A", "B", "C", "D", "E", "F"] {
        cloud.add_association(AssociationKind::Port, id, None);
    }
    cloud
}

/// Attach `ids` to `parent` directly in the table and clear the journal
#[allow(dead_code)]
pub fn seed(cloud: &InMemoryCloud, parent: &ParentRef, kind: AssociationKind, ids: &[&str]) {
    for id in ids {
        cloud.add_association(kind, id, Some(parent.clone()));
    }
    cloud.clear_journal();
}

#[allow(dead_code)]
pub fn count_attaches(calls: &[Call]) -> usize {
    calls
        .iter()
        .filter(|c| matches!(c, Call::Attach { .. }))
        .count()
}

#[allow(dead_code)]
pub fn count_detaches(calls: &[Call]) -> usize {
    calls
        .iter()
        .filter(|c| matches!(c, Call::Detach { .. }))
        .count()
}
