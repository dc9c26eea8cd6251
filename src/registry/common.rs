//! Helpers shared across registry providers.
//!
//! Binding validation is deliberately a standalone function invoked by each
//! concrete provider's `configure`, not an embedded base type.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::debug;

use crate::errors::{Error, Result};

use super::Binding;

/// First non-empty candidate, or empty when all are
pub fn first_non_empty(candidates: &[&str]) -> String {
    candidates
        .iter()
        .find(|candidate| !candidate.is_empty())
        .map(|candidate| (*candidate).to_owned())
        .unwrap_or_default()
}

/// Validate the binding fields every provider shares.
///
/// The secret name is mandatory. An empty namespace resolves to `default`;
/// this is a documented default, not a validation failure.
pub fn validate_binding(binding: &mut Binding) -> Result<()> {
    if binding.secret_name.is_empty() {
        return Err(Error::configuration("Secret name must not be empty"));
    }

    if binding.namespace.is_empty() {
        debug!("Did not receive namespace, using `default`");
        binding.namespace = "default".to_string();
    }

    Ok(())
}

/// Normalize the raw credentials payload.
///
/// The payload may arrive as plain JSON or base64-encoded JSON; the decoded
/// form is preferred when it decodes to valid UTF-8. Plain JSON never
/// decodes as base64 (it starts with `{`), so the two forms cannot collide.
pub fn decode_credentials_payload(raw: &str) -> String {
    let trimmed = raw.trim();
    match BASE64.decode(trimmed) {
        Ok(decoded) => String::from_utf8(decoded).unwrap_or_else(|_| trimmed.to_string()),
        Err(_) => trimmed.to_string(),
    }
}
