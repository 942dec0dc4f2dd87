//! Environment-provided settings.
//!
//! Secrets are only ever taken from the environment and never logged.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use delroute_core::Keypair;

use crate::error::CliError;

pub const IDENTITY_SEED_ENV: &str = "DELROUTE_IDENTITY_SEED";

/// Signing identity from `DELROUTE_IDENTITY_SEED`, if set.
pub fn identity_from_env() -> Result<Option<Keypair>, CliError> {
    match std::env::var(IDENTITY_SEED_ENV) {
        Ok(encoded) if encoded.trim().is_empty() => Ok(None),
        Ok(encoded) => identity_from_seed(&encoded).map(Some),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(CliError::Config(format!(
            "{IDENTITY_SEED_ENV} is not valid unicode"
        ))),
    }
}

/// Decodes a base64 32-byte ed25519 seed.
pub fn identity_from_seed(encoded: &str) -> Result<Keypair, CliError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| CliError::Config(format!("{IDENTITY_SEED_ENV} is not valid base64")))?;
    let mut seed: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        CliError::Config(format!(
            "{IDENTITY_SEED_ENV} must decode to 32 bytes, got {}",
            bytes.len()
        ))
    })?;
    Keypair::ed25519_from_bytes(&mut seed)
        .map_err(|error| CliError::Config(format!("{IDENTITY_SEED_ENV}: {error}")))
}
