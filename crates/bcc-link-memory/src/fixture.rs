//! JSON description of an initial cloud topology
//!
//! ```json
//! {
//!   "parents": [{ "id": "vm-1", "kind": "vm" }],
//!   "associations": [
//!     { "kind": "port", "id": "port-a", "owner": { "id": "vm-1", "kind": "vm" } },
//!     { "kind": "disk", "id": "disk-a" }
//!   ]
//! }
//! ```

use bcc_link::{AssociationId, AssociationKind, ParentRef, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub parents: Vec<ParentFixture>,

    #[serde(default)]
    pub associations: Vec<AssociationFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentFixture {
    #[serde(flatten)]
    pub parent: ParentRef,

    #[serde(default = "default_live")]
    pub live: bool,
}

fn default_live() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationFixture {
    pub kind: AssociationKind,
    pub id: AssociationId,

    #[serde(default)]
    pub owner: Option<ParentRef>,
}

impl Fixture {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
