//! Signing of provide records.
//!
//! The cryptography is behind [`RecordSigner`]; this module only frames what
//! gets signed. The payload is serialized once, the SHA-256 digest of those
//! bytes is signed, and the signature is stored as multibase base64 (`m`
//! prefix, no padding). The serialized bytes are kept and transmitted as-is so
//! the server verifies exactly what was signed.

use libp2p_identity::{Keypair, PeerId, PublicKey};
use multibase::Base;
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::records::WriteBitswapProviderRecord;

/// Signing capability of the local peer.
pub trait RecordSigner: Send + Sync {
    /// Peer id derived from the signing key.
    fn peer_id(&self) -> PeerId;

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignError>;
}

impl RecordSigner for Keypair {
    fn peer_id(&self) -> PeerId {
        self.public().to_peer_id()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignError> {
        Keypair::sign(self, message).map_err(|error| SignError::Signer(error.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum SignError {
    #[error("already signed")]
    AlreadySigned,
    #[error("not signed")]
    NotSigned,
    #[error("not the correct signing key")]
    KeyMismatch,
    #[error("record payload has no peer ID")]
    MissingPeerId,
    #[error("signing: {0}")]
    Signer(String),
    #[error("encoding payload: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("decoding signature: {0}")]
    MalformedSignature(String),
    #[error("signature failed to verify")]
    Invalid,
}

impl WriteBitswapProviderRecord {
    /// Signs the payload on behalf of `peer_id`.
    ///
    /// Fails without touching the record if it is already signed or if
    /// `signer` holds a key for a different peer.
    pub fn sign(&mut self, peer_id: &PeerId, signer: &dyn RecordSigner) -> Result<(), SignError> {
        if self.is_signed() {
            return Err(SignError::AlreadySigned);
        }
        if signer.peer_id() != *peer_id {
            return Err(SignError::KeyMismatch);
        }

        let payload = serde_json::to_string(&self.payload).map_err(SignError::Encode)?;
        let digest = Sha256::digest(payload.as_bytes());
        let signature = signer.sign(&digest)?;
        let raw = RawValue::from_string(payload).map_err(SignError::Encode)?;

        self.signature = multibase::encode(Base::Base64, signature);
        self.raw_payload = Some(raw);
        Ok(())
    }

    /// Checks the signature against `public_key`, which must belong to the
    /// peer named in the payload.
    pub fn verify(&self, public_key: &PublicKey) -> Result<(), SignError> {
        if !self.is_signed() {
            return Err(SignError::NotSigned);
        }
        let raw = self.raw_payload().ok_or(SignError::NotSigned)?;
        let payload_id = self.payload.id.as_ref().ok_or(SignError::MissingPeerId)?;
        if public_key.to_peer_id() != *payload_id {
            return Err(SignError::KeyMismatch);
        }

        let (_, signature) = multibase::decode(&self.signature)
            .map_err(|error| SignError::MalformedSignature(error.to_string()))?;

        let digest = Sha256::digest(raw.as_bytes());
        if public_key.verify(&digest, &signature) {
            Ok(())
        } else {
            Err(SignError::Invalid)
        }
    }
}
