//! # Secret Compiler
//!
//! Pure transformation from a fetched registry token into the Kubernetes
//! secret that persists it.
//!
//! A bound registry URI produces a `kubernetes.io/dockerconfigjson`
//! pull-secret; without one the credential is stored under a single opaque
//! key. Compilation is deterministic: identical tokens compile to
//! byte-identical secrets.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::registry::RegistryToken;

/// Data key holding the docker config document in a pull-secret
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

/// Data key holding the raw credential when no registry URI is bound
pub const ACCESS_TOKEN_KEY: &str = "ACCESS_TOKEN";

/// Secret type recognized by container runtimes for image pulls
pub const DOCKER_CONFIG_SECRET_TYPE: &str = "kubernetes.io/dockerconfigjson";

/// `{"auths": {"<registry-endpoint>": {"auth": "..."}}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct DockerConfigJson {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub auths: BTreeMap<String, RegistryAuth>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistryAuth {
    pub auth: String,
}

/// Compile a registry token into the secret object that persists it
pub fn compile_registry_auth_secret(token: &RegistryToken) -> Result<Secret> {
    if token.auth.is_empty() {
        return Err(Error::compile("Authorization token is empty"));
    }

    let mut secret = Secret {
        metadata: ObjectMeta {
            name: Some(token.secret_name.clone()),
            namespace: Some(token.namespace.clone()),
            ..ObjectMeta::default()
        },
        ..Secret::default()
    };

    let mut data = BTreeMap::new();
    match token.registry_uri.as_deref().filter(|uri| !uri.is_empty()) {
        Some(registry_uri) => {
            let mut auths = BTreeMap::new();
            auths.insert(
                registry_uri.to_string(),
                RegistryAuth {
                    auth: token.auth.clone(),
                },
            );

            let config_json = serde_json::to_vec(&DockerConfigJson { auths })
                .map_err(|err| Error::compile(format!("Failed to marshal docker config json: {err}")))?;

            data.insert(DOCKER_CONFIG_JSON_KEY.to_string(), ByteString(config_json));
            secret.type_ = Some(DOCKER_CONFIG_SECRET_TYPE.to_string());
        }
        None => {
            data.insert(
                ACCESS_TOKEN_KEY.to_string(),
                ByteString(token.auth.clone().into_bytes()),
            );
        }
    }
    secret.data = Some(data);

    Ok(secret)
}

/// Split a base64 `user:password` registry credential into its parts
pub fn parse_auth(auth: &str) -> Result<(String, String)> {
    let decoded = BASE64
        .decode(auth)
        .map_err(|err| Error::compile(format!("Failed to decode auth: {err}")))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|err| Error::compile(format!("Auth is not valid UTF-8: {err}")))?;

    match decoded.split_once(':') {
        Some((username, password)) => Ok((username.to_string(), password.to_string())),
        None => Err(Error::compile("Auth must be of the form `user:password`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(registry_uri: Option<&str>) -> RegistryToken {
        RegistryToken {
            secret_name: "reg-secret".to_string(),
            namespace: "ns".to_string(),
            auth: "QVdTOnRvazEyMw==".to_string(),
            registry_uri: registry_uri.map(ToString::to_string),
        }
    }

    #[test]
    fn compiles_pull_secret_when_registry_uri_is_bound() {
        let registry_uri = "123.dkr.ecr.us-east-1.amazonaws.com";
        let secret = compile_registry_auth_secret(&token(Some(registry_uri))).unwrap();

        assert_eq!(secret.metadata.name.as_deref(), Some("reg-secret"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("ns"));
        assert_eq!(secret.type_.as_deref(), Some(DOCKER_CONFIG_SECRET_TYPE));

        let data = secret.data.unwrap();
        let config_json = &data[DOCKER_CONFIG_JSON_KEY];
        let parsed: serde_json::Value = serde_json::from_slice(&config_json.0).unwrap();

        let auths = parsed["auths"].as_object().unwrap();
        assert_eq!(auths.len(), 1);
        assert_eq!(auths[registry_uri]["auth"], "QVdTOnRvazEyMw==");
    }

    #[test]
    fn compiles_opaque_secret_without_registry_uri() {
        let secret = compile_registry_auth_secret(&token(None)).unwrap();

        assert_eq!(secret.type_, None);
        let data = secret.data.unwrap();
        assert_eq!(data[ACCESS_TOKEN_KEY].0, b"QVdTOnRvazEyMw==");
        assert!(!data.contains_key(DOCKER_CONFIG_JSON_KEY));
    }

    #[test]
    fn empty_registry_uri_behaves_like_unbound() {
        let secret = compile_registry_auth_secret(&token(Some(""))).unwrap();
        assert_eq!(secret.type_, None);
        assert!(secret.data.unwrap().contains_key(ACCESS_TOKEN_KEY));
    }

    #[test]
    fn compilation_is_deterministic() {
        let token = token(Some("123.dkr.ecr.us-east-1.amazonaws.com"));
        let first = compile_registry_auth_secret(&token).unwrap();
        let second = compile_registry_auth_secret(&token).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_auth_is_a_compile_error() {
        let mut token = token(Some("123.dkr.ecr.us-east-1.amazonaws.com"));
        token.auth = String::new();

        assert!(matches!(
            compile_registry_auth_secret(&token),
            Err(Error::Compile(_))
        ));
    }

    #[test]
    fn parse_auth_splits_user_and_password() {
        let encoded = BASE64.encode("AWS:some-token");
        let (username, password) = parse_auth(&encoded).unwrap();
        assert_eq!(username, "AWS");
        assert_eq!(password, "some-token");
    }

    #[test]
    fn parse_auth_rejects_credentials_without_separator() {
        let encoded = BASE64.encode("no-separator");
        assert!(matches!(parse_auth(&encoded), Err(Error::Compile(_))));
    }
}
