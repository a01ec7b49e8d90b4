//! In-memory backend for bcc-link
//!
//! This crate implements the `LinkApi` trait without a network: parents,
//! associations, ownership and transient locks live in a mutex-guarded table,
//! and every call is appended to a journal that tests and dry runs can
//! inspect afterwards.
//!
//! # Example
//!
//! ```ignore
//! use bcc_link::{AssociationKind, ParentRef, Reconciler};
//! use bcc_link_memory::InMemoryCloud;
//!
//! let vm = ParentRef::vm("vm-1");
//! let cloud = InMemoryCloud::new()
//!     .with_parent(vm.clone())
//!     .with_association(AssociationKind::Port, "port-a", None);
//!
//! Reconciler::new(&cloud, AssociationKind::Port)
//!     .sync(&vm, &["port-a".into()])
//!     .await?;
//!
//! for call in cloud.journal() {
//!     println!("{call}");
//! }
//! ```

pub mod cloud;
pub mod fixture;
pub mod journal;

pub use cloud::{InMemoryCloud, Operation};
pub use fixture::{AssociationFixture, Fixture, ParentFixture};
pub use journal::Call;
