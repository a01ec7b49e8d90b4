mod common;

use bcc_link::{
    AssociationKind, LinkError, LinkSettings, NetworkLink, ParentRef, PoolLinks, PoolMember,
    ResourceSync, RouteLink, RouterLinks, VmLinks,
};
use bcc_link_memory::{Call, Fixture, InMemoryCloud};
use common::{count_attaches, count_detaches, ids, init_tracing};

const TOPOLOGY: &str = r#"{
    "parents": [
        { "id": "vm-1", "kind": "vm" },
        { "id": "vm-2", "kind": "vm" },
        { "id": "r-1", "kind": "router" },
        { "id": "lb-1", "kind": "load_balancer" }
    ],
    "associations": [
        { "kind": "port", "id": "p1", "owner": { "id": "vm-1", "kind": "vm" } },
        { "kind": "port", "id": "p2" },
        { "kind": "port", "id": "p3", "owner": { "id": "vm-2", "kind": "vm" } },
        { "kind": "port", "id": "rp1", "owner": { "id": "r-1", "kind": "router" } },
        { "kind": "port", "id": "rp2" },
        { "kind": "disk", "id": "sys-1", "owner": { "id": "vm-1", "kind": "vm" } },
        { "kind": "disk", "id": "d1", "owner": { "id": "vm-1", "kind": "vm" } },
        { "kind": "disk", "id": "d2", "owner": { "id": "vm-2", "kind": "vm" } },
        { "kind": "route", "id": "172.16.0.0/16@10.0.0.1" },
        { "kind": "route", "id": "172.16.0.0/16@10.0.0.2", "owner": { "id": "r-1", "kind": "router" } },
        { "kind": "route", "id": "172.17.0.0/16@10.0.0.2" },
        { "kind": "pool_member", "id": "vm-1:80:50", "owner": { "id": "lb-1", "kind": "load_balancer" } },
        { "kind": "pool_member", "id": "vm-1:80:10" },
        { "kind": "pool_member", "id": "vm-2:80:50" }
    ]
}"#;

fn cloud() -> InMemoryCloud {
    InMemoryCloud::from_fixture(&Fixture::from_json(TOPOLOGY).unwrap())
}

fn vm_links() -> VmLinks {
    VmLinks {
        ports: vec!["p1".to_string()],
        networks: Vec::new(),
        disks: vec!["d1".to_string()],
        system_disk: "sys-1".to_string(),
    }
}

#[tokio::test]
async fn test_sync_vm_in_sync() {
    init_tracing();
    let cloud = cloud();

    ResourceSync::new(&cloud)
        .sync_vm("vm-1", &vm_links())
        .await
        .unwrap();

    assert!(cloud.mutations().is_empty());
}

#[tokio::test]
async fn test_sync_vm_moves_disk_and_swaps_port() {
    init_tracing();
    let cloud = cloud();
    let vm1 = ParentRef::vm("vm-1");
    let links = VmLinks {
        networks: vec![NetworkLink {
            id: "p2".to_string(),
        }],
        disks: vec!["d2".to_string()],
        ..vm_links()
    };

    ResourceSync::new(&cloud).sync_vm("vm-1", &links).await.unwrap();

    assert_eq!(cloud.linked(&vm1, AssociationKind::Port), ids(&["p2"]));
    let mut disks = cloud.linked(&vm1, AssociationKind::Disk);
    disks.sort();
    assert_eq!(disks, ids(&["d2", "sys-1"]));
    assert!(cloud.linked(&ParentRef::vm("vm-2"), AssociationKind::Disk).is_empty());

    // p1 out, p2 in, d1 out, d2 off vm-2 and onto vm-1
    let mutations = cloud.mutations();
    assert_eq!(count_detaches(&mutations), 3);
    assert_eq!(count_attaches(&mutations), 2);
    assert_eq!(mutations[0], Call::detach(&vm1, AssociationKind::Port, "p1"));
}

#[tokio::test]
async fn test_sync_vm_rejects_invalid_links_before_any_call() {
    init_tracing();
    let cloud = cloud();
    let links = VmLinks {
        disks: vec!["sys-1".to_string()],
        ..vm_links()
    };

    let err = ResourceSync::new(&cloud)
        .sync_vm("vm-1", &links)
        .await
        .unwrap_err();

    assert!(matches!(err, LinkError::InvalidConfig(_)));
    assert!(cloud.journal().is_empty());
}

#[tokio::test]
async fn test_sync_router_ports_and_routes() {
    init_tracing();
    let cloud = cloud();
    let router = ParentRef::router("r-1");
    let links = RouterLinks {
        ports: vec!["rp2".to_string()],
        routes: vec![RouteLink {
            destination: "172.16.0.0/16".to_string(),
            next_hop: "10.0.0.1".to_string(),
        }],
        hypervisor: "VMware".to_string(),
    };

    ResourceSync::new(&cloud)
        .sync_router("r-1", &links)
        .await
        .unwrap();

    assert_eq!(cloud.linked(&router, AssociationKind::Port), ids(&["rp2"]));
    assert_eq!(
        cloud.linked(&router, AssociationKind::Route),
        ids(&["172.16.0.0/16@10.0.0.1"])
    );
}

#[tokio::test]
async fn test_sync_router_routes_sharing_a_gateway() {
    init_tracing();
    let cloud = cloud();
    let router = ParentRef::router("r-1");
    let route = |destination: &str| RouteLink {
        destination: destination.to_string(),
        next_hop: "10.0.0.2".to_string(),
    };
    let links = RouterLinks {
        ports: vec!["rp1".to_string()],
        routes: vec![route("172.16.0.0/16"), route("172.17.0.0/16")],
        hypervisor: "VMware".to_string(),
    };

    ResourceSync::new(&cloud)
        .sync_router("r-1", &links)
        .await
        .unwrap();

    let mut routes = cloud.linked(&router, AssociationKind::Route);
    routes.sort();
    assert_eq!(routes, ids(&["172.16.0.0/16@10.0.0.2", "172.17.0.0/16@10.0.0.2"]));
    assert_eq!(
        cloud.mutations(),
        vec![Call::attach(&router, AssociationKind::Route, "172.17.0.0/16@10.0.0.2")]
    );
}

#[tokio::test]
async fn test_router_cannot_take_vm_port_unless_forced() {
    init_tracing();
    let cloud = cloud();
    let links = RouterLinks {
        ports: vec!["rp1".to_string(), "p3".to_string()],
        routes: Vec::new(),
        hypervisor: "KVM".to_string(),
    };

    let err = ResourceSync::new(&cloud)
        .sync_router("r-1", &links)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::ForeignAttachConflict { .. }));

    let settings = LinkSettings {
        force_foreign: true,
        ..LinkSettings::default()
    };
    ResourceSync::new(&cloud)
        .with_backoff(settings.backoff())
        .with_options(settings.reconcile_options())
        .sync_router("r-1", &links)
        .await
        .unwrap();

    assert_eq!(
        cloud.owner_of(AssociationKind::Port, "p3"),
        Some(ParentRef::router("r-1"))
    );
}

#[tokio::test]
async fn test_sync_pool_members() {
    init_tracing();
    let cloud = cloud();
    let lb = ParentRef::load_balancer("lb-1");
    let links = PoolLinks {
        members: vec![PoolMember {
            vm_id: "vm-2".to_string(),
            port: 80,
            weight: 50,
        }],
    };

    ResourceSync::new(&cloud)
        .sync_pool("lb-1", &links)
        .await
        .unwrap();

    assert_eq!(
        cloud.linked(&lb, AssociationKind::PoolMember),
        ids(&["vm-2:80:50"])
    );
}

#[tokio::test]
async fn test_pool_member_weight_change_replaces_member() {
    init_tracing();
    let cloud = cloud();
    let lb = ParentRef::load_balancer("lb-1");
    let links = PoolLinks {
        members: vec![PoolMember {
            vm_id: "vm-1".to_string(),
            port: 80,
            weight: 10,
        }],
    };

    ResourceSync::new(&cloud)
        .sync_pool("lb-1", &links)
        .await
        .unwrap();

    assert_eq!(
        cloud.mutations(),
        vec![
            Call::detach(&lb, AssociationKind::PoolMember, "vm-1:80:50"),
            Call::attach(&lb, AssociationKind::PoolMember, "vm-1:80:10"),
        ]
    );
}

#[tokio::test]
async fn test_release_vm_keeps_system_disk() {
    init_tracing();
    let cloud = cloud();
    let vm1 = ParentRef::vm("vm-1");
    // d1 deleted and d9 attached outside of the configuration
    cloud.remove_association(AssociationKind::Disk, "d1");
    cloud.add_association(AssociationKind::Disk, "d9", Some(vm1.clone()));

    ResourceSync::new(&cloud)
        .release_vm("vm-1", "sys-1")
        .await
        .unwrap();

    assert_eq!(cloud.linked(&vm1, AssociationKind::Disk), ids(&["sys-1"]));
    assert!(cloud.linked(&vm1, AssociationKind::Port).is_empty());
}

#[tokio::test]
async fn test_release_router_and_pool() {
    init_tracing();
    let cloud = cloud();
    let router = ParentRef::router("r-1");
    let lb = ParentRef::load_balancer("lb-1");

    let sync = ResourceSync::new(&cloud);
    sync.release_router("r-1").await.unwrap();
    sync.release_pool("lb-1").await.unwrap();

    assert!(cloud.linked(&router, AssociationKind::Port).is_empty());
    assert!(cloud.linked(&lb, AssociationKind::PoolMember).is_empty());
    // the last call of each release waits for the parent lock
    assert_eq!(cloud.journal().last(), Some(&Call::IsLocked(lb.into())));
}
