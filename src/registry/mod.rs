//! # Registry Providers
//!
//! A registry provider authenticates against a container-registry service
//! and returns a short-lived authorization token.
//!
//! Each provider implements the [`RegistryProvider`] capability trait; the
//! refresh loop only ever sees the trait object, so new registry kinds plug
//! in through [`create_registry`] without touching the loop.

use async_trait::async_trait;

use crate::errors::{Error, Result};

// Common helpers shared across providers
pub mod common;

// Provider implementations
pub mod ecr;

// Scriptable provider used by the scheduler tests
pub mod mock;

/// Registry kind selector for the ECR provider
pub const ECR_REGISTRY_KIND: &str = "ecr";

/// Target of the refreshed pull-secret, fixed for the process lifetime once
/// validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Name of the secret to create or update
    pub secret_name: String,
    /// Namespace of the secret; empty resolves to `default` at validation
    pub namespace: String,
    /// Registry endpoint the credential authenticates against; without one
    /// the credential is persisted as an opaque secret
    pub registry_uri: Option<String>,
}

/// A freshly fetched registry authorization token.
///
/// Consumed immediately by the secret compiler, never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryToken {
    pub secret_name: String,
    pub namespace: String,
    /// Opaque base64 `user:password` credential returned by the registry
    pub auth: String,
    pub registry_uri: Option<String>,
}

/// Capability trait for registry providers
#[async_trait]
pub trait RegistryProvider: Send + Sync {
    /// Resolve and validate the provider configuration.
    ///
    /// Fields missing from the explicit credentials payload are filled from
    /// the environment; an explicit value always wins. Fails when a
    /// mandatory field is still empty after resolution.
    fn configure(&mut self) -> Result<()>;

    /// Fetch a fresh authorization token from the registry
    async fn fetch_token(&self) -> Result<RegistryToken>;
}

/// Create a configured registry provider for the requested kind
pub fn create_registry(
    registry_kind: &str,
    binding: Binding,
    raw_credentials: &str,
) -> Result<Box<dyn RegistryProvider>> {
    match registry_kind {
        ECR_REGISTRY_KIND => {
            let mut registry = ecr::EcrRegistry::new(binding, raw_credentials);
            registry.configure()?;
            Ok(Box::new(registry))
        }
        other => Err(Error::configuration(format!(
            "Unsupported registry kind: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_registry_rejects_unknown_kind() {
        let binding = Binding {
            secret_name: "reg-secret".to_string(),
            namespace: "ns".to_string(),
            registry_uri: None,
        };

        let result = create_registry("gcr", binding, "");
        match result {
            Err(Error::Configuration(message)) => {
                assert!(message.contains("gcr"), "unexpected message: {message}");
            }
            _ => panic!("expected a configuration error"),
        }
    }
}
