//! # Secret Store Gateway
//!
//! The refresh loop depends only on the [`SecretStore`] contract; the
//! kube-backed implementation lives alongside it.
//!
//! The get-then-create-or-update sequence is not atomic against concurrent
//! external writers: either write can win, and the next refresh cycle
//! rewrites the secret.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, PostParams};
use kube::Client;
use tracing::debug;

use crate::errors::Result;

/// External collaborator contract for the persisted secret
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret; `None` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    /// Create a secret
    async fn create(&self, secret: &Secret) -> Result<()>;

    /// Update an existing secret
    async fn update(&self, secret: &Secret) -> Result<()>;
}

/// Create the secret when absent, update it otherwise
pub async fn create_or_update(store: &dyn SecretStore, secret: &Secret) -> Result<()> {
    let namespace = secret.metadata.namespace.as_deref().unwrap_or_default();
    let name = secret.metadata.name.as_deref().unwrap_or_default();

    if store.get(namespace, name).await?.is_some() {
        store.update(secret).await
    } else {
        store.create(secret).await
    }
}

/// Secret store backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        match self.secrets(namespace).get(name).await {
            Ok(secret) => Ok(Some(secret)),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn create(&self, secret: &Secret) -> Result<()> {
        let namespace = secret.metadata.namespace.as_deref().unwrap_or_default();
        let name = secret.metadata.name.as_deref().unwrap_or_default();

        debug!(secret_name = %name, namespace = %namespace, "Creating secret");
        self.secrets(namespace)
            .create(&PostParams::default(), secret)
            .await?;
        Ok(())
    }

    async fn update(&self, secret: &Secret) -> Result<()> {
        let namespace = secret.metadata.namespace.as_deref().unwrap_or_default();
        let name = secret.metadata.name.as_deref().unwrap_or_default();

        debug!(secret_name = %name, namespace = %namespace, "Updating secret");
        self.secrets(namespace)
            .replace(name, &PostParams::default(), secret)
            .await?;
        Ok(())
    }
}
