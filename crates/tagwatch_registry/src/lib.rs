//! Registry inspectors.
//!
//! An inspector turns a repository reference into a [`Snapshot`]: the
//! registry's current view of every tag, each classified as
//! `Found(metadata)`, `Deleted`, or `Failed(reason)`. Two implementations
//! ship: a skopeo subprocess for generic registries and the Quay REST API
//! for quay.io. A whole-repository failure surfaces as
//! [`RegistryError::Unavailable`] and is handled fail-open by the caller.

mod error;
mod inspector;
mod quay;
mod skopeo;

pub use error::RegistryError;
pub use inspector::{inspector_for, RegistryInspector};
pub use quay::QuayInspector;
pub use skopeo::SkopeoInspector;
