//! Typed link configurations for the resources that own associations
//!
//! These replace the untyped attribute maps handed over by the provider
//! framework. Each is validated before anything reaches the reconciler.

use crate::api::LinkApi;
use crate::association::{AssociationId, AssociationKind, ParentRef};
use crate::error::{LinkError, Result};
use crate::reconcile::{MissingPolicy, ReconcileOptions, Reconciler};
use crate::retry::Backoff;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Entry of the `networks` block of a VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLink {
    /// Port ID created for this network
    pub id: String,
}

/// Ports and disks attached to a VM
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmLinks {
    #[serde(default)]
    pub ports: Vec<String>,

    #[serde(default)]
    pub networks: Vec<NetworkLink>,

    #[serde(default)]
    pub disks: Vec<String>,

    pub system_disk: String,
}

impl VmLinks {
    pub fn validate(&self) -> Result<()> {
        if self.system_disk.trim().is_empty() {
            return Err(LinkError::InvalidConfig(
                "vm: system_disk must be set".to_string(),
            ));
        }
        check_unique("vm ports", self.ports.iter())?;
        check_unique("vm networks", self.networks.iter().map(|n| &n.id))?;
        check_unique("vm disks", self.disks.iter())?;

        if self.disks.contains(&self.system_disk) {
            return Err(LinkError::InvalidConfig(format!(
                "vm: system disk {} must not be listed in disks",
                self.system_disk
            )));
        }
        Ok(())
    }

    /// `networks` wins when both blocks are present
    pub fn desired_ports(&self) -> Vec<AssociationId> {
        if self.networks.is_empty() {
            self.ports.iter().map(|p| AssociationId::from(p.as_str())).collect()
        } else {
            self.networks
                .iter()
                .map(|n| AssociationId::from(n.id.as_str()))
                .collect()
        }
    }

    /// Data disks plus the system disk, which is never detached
    pub fn desired_disks(&self) -> Vec<AssociationId> {
        self.disks
            .iter()
            .chain(std::iter::once(&self.system_disk))
            .map(|d| AssociationId::from(d.as_str()))
            .collect()
    }
}

/// Static route of a router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteLink {
    pub destination: String,
    pub next_hop: String,
}

impl RouteLink {
    /// `destination@next_hop`, so a changed gateway or prefix replaces the route
    pub fn key(&self) -> AssociationId {
        AssociationId::from(format!("{}@{}", self.destination, self.next_hop))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterLinks {
    #[serde(default)]
    pub ports: Vec<String>,

    #[serde(default)]
    pub routes: Vec<RouteLink>,

    /// Hypervisor type of the router's VDC
    #[serde(default)]
    pub hypervisor: String,
}

impl RouterLinks {
    pub fn validate(&self) -> Result<()> {
        check_unique("router ports", self.ports.iter())?;
        check_unique("router routes", self.routes.iter().map(|r| &r.destination))?;

        if !self.routes.is_empty() && !self.supports_routes() {
            return Err(LinkError::InvalidConfig(format!(
                "router: routes are not supported for {} hypervisor",
                self.hypervisor
            )));
        }
        Ok(())
    }

    pub fn supports_routes(&self) -> bool {
        self.hypervisor.eq_ignore_ascii_case("vmware")
    }

    pub fn desired_ports(&self) -> Vec<AssociationId> {
        self.ports.iter().map(|p| AssociationId::from(p.as_str())).collect()
    }

    pub fn desired_routes(&self) -> Vec<AssociationId> {
        self.routes.iter().map(RouteLink::key).collect()
    }
}

/// Backend VM of a load balancer pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMember {
    pub vm_id: String,
    pub port: u16,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    50
}

impl PoolMember {
    /// `vm_id:port`, unique within a pool
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.vm_id, self.port)
    }

    /// `vm_id:port:weight`, so a weight change replaces the member
    pub fn key(&self) -> AssociationId {
        AssociationId::from(format!("{}:{}", self.endpoint(), self.weight))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolLinks {
    #[serde(default)]
    pub members: Vec<PoolMember>,
}

impl PoolLinks {
    pub fn validate(&self) -> Result<()> {
        if let Some(member) = self.members.iter().find(|m| m.port == 0) {
            return Err(LinkError::InvalidConfig(format!(
                "lbaas pool: member {} has port 0",
                member.vm_id
            )));
        }
        let endpoints: Vec<String> = self.members.iter().map(PoolMember::endpoint).collect();
        check_unique("lbaas pool members", endpoints.iter())
    }

    pub fn desired_members(&self) -> Vec<AssociationId> {
        self.members.iter().map(PoolMember::key).collect()
    }
}

fn check_unique<I, T>(what: &str, items: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: std::fmt::Display + Eq + std::hash::Hash,
{
    let mut seen = HashSet::new();
    for item in items {
        if seen.contains(&item) {
            return Err(LinkError::InvalidConfig(format!(
                "{}: duplicate entry {}",
                what, item
            )));
        }
        seen.insert(item);
    }
    Ok(())
}

/// Runs the association part of a resource's Update and Delete phases
pub struct ResourceSync<'a, A: LinkApi + ?Sized> {
    api: &'a A,
    backoff: Backoff,
    options: ReconcileOptions,
}

impl<'a, A: LinkApi + ?Sized> ResourceSync<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
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

    fn reconciler(&self, kind: AssociationKind) -> Reconciler<'a, A> {
        Reconciler::new(self.api, kind)
            .with_backoff(self.backoff.clone())
            .with_options(self.options.clone())
    }

    /// Ports first, then disks
    pub async fn sync_vm(&self, vm_id: &str, links: &VmLinks) -> Result<()> {
        links.validate()?;
        let vm = ParentRef::vm(vm_id);

        self.reconciler(AssociationKind::Port)
            .sync(&vm, &links.desired_ports())
            .await?;
        self.reconciler(AssociationKind::Disk)
            .sync(&vm, &links.desired_disks())
            .await
    }

    /// Ports first, then routes
    pub async fn sync_router(&self, router_id: &str, links: &RouterLinks) -> Result<()> {
        links.validate()?;
        let router = ParentRef::router(router_id);

        self.reconciler(AssociationKind::Port)
            .sync(&router, &links.desired_ports())
            .await?;
        if links.supports_routes() {
            self.reconciler(AssociationKind::Route)
                .sync(&router, &links.desired_routes())
                .await?;
        }
        Ok(())
    }

    pub async fn sync_pool(&self, lbaas_id: &str, links: &PoolLinks) -> Result<()> {
        links.validate()?;
        self.reconciler(AssociationKind::PoolMember)
            .sync(&ParentRef::load_balancer(lbaas_id), &links.desired_members())
            .await
    }

    /// Detach data disks and ports before the VM is deleted.
    ///
    /// The system disk stays with the VM.
    pub async fn release_vm(&self, vm_id: &str, system_disk: &str) -> Result<()> {
        let vm = ParentRef::vm(vm_id);
        let system_disk = AssociationId::from(system_disk);

        let attached = self
            .api
            .fetch_associations(&vm, AssociationKind::Disk)
            .await?;
        let keep: Vec<AssociationId> = attached
            .iter()
            .filter(|id| **id == system_disk)
            .cloned()
            .collect();

        let disks = self.reconciler(AssociationKind::Disk).with_options(ReconcileOptions {
            missing: MissingPolicy::Skip,
            ..self.options.clone()
        });
        disks.reconcile(&vm, &keep, &attached).await?;

        self.reconciler(AssociationKind::Port).release_all(&vm).await
    }

    pub async fn release_router(&self, router_id: &str) -> Result<()> {
        let router = ParentRef::router(router_id);
        self.reconciler(AssociationKind::Port).release_all(&router).await
    }

    pub async fn release_pool(&self, lbaas_id: &str) -> Result<()> {
        let lbaas = ParentRef::load_balancer(lbaas_id);
        self.reconciler(AssociationKind::PoolMember)
            .release_all(&lbaas)
            .await
    }
}
