//! # Registry Credentials Controller
//!
//! Keeps a Kubernetes pull-secret refreshed with short-lived container
//! registry credentials for the lifetime of the process.
//!
//! The crate is built from four parts:
//!
//! 1. **Registry providers** ([`registry`]) fetch authorization tokens from
//!    a container-registry service. ECR is the implemented kind; the
//!    [`registry::RegistryProvider`] trait keeps the refresh loop unaware of
//!    the concrete registry.
//! 2. **Secret compiler** ([`secret`]) turns a token into the Kubernetes
//!    secret that persists it: a `kubernetes.io/dockerconfigjson` pull-secret
//!    when a registry URI is bound, a single opaque key otherwise.
//! 3. **Secret store** ([`store`]) is the narrow get/create/update gateway
//!    to the cluster.
//! 4. **Refresher** ([`refresher`]) runs one cycle at startup and one per
//!    tick until cancelled.

pub mod errors;
pub mod refresher;
pub mod registry;
pub mod secret;
pub mod store;

pub use errors::{Error, Result};
