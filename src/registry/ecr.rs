//! # ECR Registry Provider
//!
//! Authenticates against Amazon ECR and returns a short-lived authorization
//! token usable as an image pull credential.
//!
//! Credentials for the token endpoint are resolved at configure time from an
//! explicit JSON payload merged with the standard AWS environment variables,
//! optionally assuming an IAM role before requesting the token.

use std::env;

use async_trait::async_trait;
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::{Error, Result};

use super::common;
use super::{Binding, RegistryProvider, RegistryToken};

const REGION_ENV: &str = "AWS_DEFAULT_REGION";
const ACCESS_KEY_ID_ENV: &str = "AWS_ACCESS_KEY_ID";
const SECRET_ACCESS_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";
const ASSUME_ROLE_ENV: &str = "AWS_ROLE_ARN";

/// AWS credentials for the ECR token endpoint.
///
/// JSON entries are lowerCamelCase; any field left empty is filled from the
/// matching environment variable during configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AwsCredentials {
    pub region: String,
    #[serde(rename = "accessKeyID")]
    pub access_key_id: String,
    #[serde(rename = "secretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "assumeRole")]
    pub assume_role_arn: String,
}

/// ECR registry provider
pub struct EcrRegistry {
    binding: Binding,
    raw_credentials: String,
    credentials: AwsCredentials,
}

impl EcrRegistry {
    pub fn new(binding: Binding, raw_credentials: &str) -> Self {
        Self {
            binding,
            raw_credentials: raw_credentials.to_string(),
            credentials: AwsCredentials::default(),
        }
    }

    /// Build the AWS SDK config from the resolved static credentials,
    /// layering an STS assume-role provider on top when a role is set.
    async fn sdk_config(&self) -> SdkConfig {
        let region = Region::new(self.credentials.region.clone());
        let static_credentials = Credentials::new(
            self.credentials.access_key_id.clone(),
            self.credentials.secret_access_key.clone(),
            None,
            None,
            "registry-creds-controller",
        );

        let base = aws_config::defaults(BehaviorVersion::latest())
            .region(region.clone())
            .credentials_provider(static_credentials)
            .load()
            .await;

        if self.credentials.assume_role_arn.is_empty() {
            return base;
        }

        debug!(
            role = %self.credentials.assume_role_arn,
            "Assuming IAM role for the ECR token request"
        );
        let assumed = AssumeRoleProvider::builder(self.credentials.assume_role_arn.as_str())
            .region(region.clone())
            .session_name("registry-creds-controller")
            .configure(&base)
            .build()
            .await;

        aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .credentials_provider(assumed)
            .load()
            .await
    }
}

impl std::fmt::Debug for EcrRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcrRegistry")
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RegistryProvider for EcrRegistry {
    fn configure(&mut self) -> Result<()> {
        common::validate_binding(&mut self.binding)?;
        self.credentials =
            resolve_aws_credentials(&self.raw_credentials, &|name| env::var(name).ok())?;
        Ok(())
    }

    async fn fetch_token(&self) -> Result<RegistryToken> {
        let sdk_config = self.sdk_config().await;
        let client = aws_sdk_ecr::Client::new(&sdk_config);

        debug!(
            secret_name = %self.binding.secret_name,
            namespace = %self.binding.namespace,
            "Requesting ECR authorization token"
        );
        let response = client.get_authorization_token().send().await.map_err(|err| {
            warn!(error = %err, "Failed to get authorization token");
            Error::upstream(format!(
                "Failed to get authorization token from ECR: {err}"
            ))
        })?;

        // authorizationData is a list for legacy reasons (one token per
        // registry, since deprecated). The first entry is valid for every
        // registry the IAM principal is authorized for.
        let auth_data = response.authorization_data().first().ok_or(Error::NoToken)?;
        let auth = auth_data.authorization_token().ok_or(Error::NoToken)?;

        info!(expires_at = ?auth_data.expires_at(), "Got ECR authorization token");

        Ok(RegistryToken {
            secret_name: self.binding.secret_name.clone(),
            namespace: self.binding.namespace.clone(),
            auth: auth.to_string(),
            registry_uri: self.binding.registry_uri.clone(),
        })
    }
}

/// Resolve AWS credentials from the explicit payload merged with the
/// environment; the first non-empty of [explicit, env] wins per field.
///
/// A payload that fails to parse as JSON is logged and treated as empty, so
/// resolution continues from the environment alone. The environment lookup
/// is injected to keep resolution testable without process-global state.
fn resolve_aws_credentials(
    raw_credentials: &str,
    env_lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<AwsCredentials> {
    let payload = common::decode_credentials_payload(raw_credentials);

    let mut credentials: AwsCredentials = match serde_json::from_str(&payload) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "Failed to parse json AWS credentials, checking env");
            AwsCredentials::default()
        }
    };

    let from_env = |name: &str| {
        env_lookup(name)
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    };

    credentials.region = common::first_non_empty(&[&credentials.region, &from_env(REGION_ENV)]);
    credentials.access_key_id =
        common::first_non_empty(&[&credentials.access_key_id, &from_env(ACCESS_KEY_ID_ENV)]);
    credentials.secret_access_key = common::first_non_empty(&[
        &credentials.secret_access_key,
        &from_env(SECRET_ACCESS_KEY_ENV),
    ]);
    credentials.assume_role_arn =
        common::first_non_empty(&[&credentials.assume_role_arn, &from_env(ASSUME_ROLE_ENV)]);

    if credentials.region.is_empty() {
        return Err(Error::configuration("AWS Region is required"));
    }
    if credentials.access_key_id.is_empty() {
        return Err(Error::configuration("AWS Access Key ID is required"));
    }
    if credentials.secret_access_key.is_empty() {
        return Err(Error::configuration("AWS Secret Access Key is required"));
    }

    Ok(credentials)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn no_env(_name: &str) -> Option<String> {
        None
    }

    #[test]
    fn resolves_explicit_payload() {
        let payload = r#"{
            "region": "us-east-1",
            "accessKeyID": "some access key id",
            "secretAccessKey": "some secret access key"
        }"#;

        let credentials = resolve_aws_credentials(payload, &no_env).unwrap();
        assert_eq!(credentials.region, "us-east-1");
        assert_eq!(credentials.access_key_id, "some access key id");
        assert_eq!(credentials.secret_access_key, "some secret access key");
        assert_eq!(credentials.assume_role_arn, "");
    }

    #[test]
    fn resolves_base64_encoded_payload() {
        let payload = r#"{"region": "us-east-1", "accessKeyID": "ak", "secretAccessKey": "sk"}"#;
        let encoded = BASE64.encode(payload);

        let credentials = resolve_aws_credentials(&encoded, &no_env).unwrap();
        assert_eq!(credentials.region, "us-east-1");
        assert_eq!(credentials.access_key_id, "ak");
    }

    #[test]
    fn falls_back_to_environment() {
        let env = env_from(&[
            ("AWS_DEFAULT_REGION", "eu-west-1"),
            ("AWS_ACCESS_KEY_ID", "env access key id"),
            ("AWS_SECRET_ACCESS_KEY", "env secret access key"),
            ("AWS_ROLE_ARN", "some role arn"),
        ]);

        let credentials = resolve_aws_credentials("", &env).unwrap();
        assert_eq!(credentials.region, "eu-west-1");
        assert_eq!(credentials.access_key_id, "env access key id");
        assert_eq!(credentials.secret_access_key, "env secret access key");
        assert_eq!(credentials.assume_role_arn, "some role arn");
    }

    #[test]
    fn explicit_value_wins_over_environment() {
        let payload = r#"{"region": "us-east-1", "accessKeyID": "explicit", "secretAccessKey": "sk"}"#;
        let env = env_from(&[
            ("AWS_DEFAULT_REGION", "eu-west-1"),
            ("AWS_ACCESS_KEY_ID", "from env"),
        ]);

        let credentials = resolve_aws_credentials(payload, &env).unwrap();
        assert_eq!(credentials.region, "us-east-1");
        assert_eq!(credentials.access_key_id, "explicit");
    }

    #[test]
    fn environment_values_are_trimmed() {
        let payload = r#"{"accessKeyID": "ak", "secretAccessKey": "sk"}"#;
        let env = env_from(&[("AWS_DEFAULT_REGION", "  us-east-2  ")]);

        let credentials = resolve_aws_credentials(payload, &env).unwrap();
        assert_eq!(credentials.region, "us-east-2");
    }

    #[test]
    fn missing_region_is_a_configuration_error() {
        let payload = r#"{"accessKeyID": "ak", "secretAccessKey": "sk"}"#;
        assert!(matches!(
            resolve_aws_credentials(payload, &no_env),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn missing_access_key_is_a_configuration_error() {
        let payload = r#"{"region": "us-east-1", "secretAccessKey": "sk"}"#;
        assert!(matches!(
            resolve_aws_credentials(payload, &no_env),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn missing_secret_key_is_a_configuration_error() {
        let payload = r#"{"region": "us-east-1", "accessKeyID": "ak"}"#;
        assert!(matches!(
            resolve_aws_credentials(payload, &no_env),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn malformed_payload_still_resolves_from_environment() {
        let env = env_from(&[
            ("AWS_DEFAULT_REGION", "us-east-1"),
            ("AWS_ACCESS_KEY_ID", "ak"),
            ("AWS_SECRET_ACCESS_KEY", "sk"),
        ]);

        let credentials = resolve_aws_credentials("not json at all", &env).unwrap();
        assert_eq!(credentials.region, "us-east-1");
    }
}
