//! [RFC9420 Sec.8](https://www.rfc-editor.org/rfc/rfc9420.html#section-8) Key Schedule
//!
//! Every epoch has an `init_secret` inherited from the previous epoch. A commit
//! contributes fresh entropy (the commit secret) which is mixed in to produce
//! the epoch's secrets:
//!
//! ```text
//!                  init_secret_[n-1]
//!                        |
//!                        V
//!   commit_secret --> KDF.Extract
//!                        |
//!                        V
//!                  joiner_secret
//!                        |
//!                        V
//!   GroupContext --> KDF.ExtractAndExpand(., "mls10 epoch")
//!       hash             |
//!                        V
//!                  epoch_secret
//!                        |
//!                        +--> DeriveSecret(., "sender data" | "handshake" | "application")
//!                        |
//!                        V
//!                  DeriveSecret(., "init")
//!                        |
//!                        V
//!                  init_secret_[n]
//! ```


use bytes::{Buf, BufMut, Bytes};

use crate::identifiers::GroupId;
use crate::mls::crypto::provider::{CryptoProvider, LABEL_PREFIX};
use crate::mls::crypto::Secret;
use crate::mls::utilities::error::{Error, Result};
use crate::mls::utilities::serde::{
    deserialize_fixed, deserialize_opaque_vec, deserialize_optional, deserialize_u64,
    serialize_opaque_vec, serialize_optional, Deserializer, Serializer,
};
use crate::mls::utilities::tree_math::LeafIndex;

/// Size of every epoch secret.
pub const SECRET_SIZE: usize = 32;
pub const AEAD_KEY_SIZE: u16 = 32;
pub const AEAD_NONCE_SIZE: u16 = 12;

pub const SECRET_LABEL_EPOCH: &[u8] = b"epoch";
pub const SECRET_LABEL_SENDER_DATA: &[u8] = b"sender data";
pub const SECRET_LABEL_HANDSHAKE: &[u8] = b"handshake";
pub const SECRET_LABEL_APPLICATION: &[u8] = b"application";
pub const SECRET_LABEL_INIT: &[u8] = b"init";
pub const SECRET_LABEL_COMMIT_KEY: &[u8] = b"commit key";
pub const SECRET_LABEL_KEY: &[u8] = b"key";
pub const SECRET_LABEL_NONCE: &[u8] = b"nonce";

/// Summary of a group's shared state for one epoch. Its hash feeds the key
/// schedule, so two members derive the same secrets only if they agree on
/// every field.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct GroupContext {
    pub group_id: GroupId,
    pub epoch: u64,
    pub tree_hash: Bytes,
    pub confirmed_transcript_hash: Bytes,
    pub extensions_hash: Option<Bytes>,
}

impl GroupContext {
    pub fn hash(&self, crypto_provider: &impl CryptoProvider) -> Result<Bytes> {
        let serialized = self.serialize_detached()?;
        Ok(crypto_provider.hash().digest(&serialized))
    }
}

impl Deserializer for GroupContext {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let group_id = GroupId::deserialize(buf)?;
        let epoch = deserialize_u64(buf)?;
        let tree_hash = deserialize_opaque_vec(buf)?;
        let confirmed_transcript_hash = deserialize_opaque_vec(buf)?;
        let extensions_hash = if deserialize_optional(buf)? {
            Some(deserialize_opaque_vec(buf)?)
        } else {
            None
        };

        Ok(Self {
            group_id,
            epoch,
            tree_hash,
            confirmed_transcript_hash,
            extensions_hash,
        })
    }
}

impl Serializer for GroupContext {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        self.group_id.serialize(buf)?;
        buf.put_u64(self.epoch);
        serialize_opaque_vec(&self.tree_hash, buf)?;
        serialize_opaque_vec(&self.confirmed_transcript_hash, buf)?;
        serialize_optional(self.extensions_hash.is_some(), buf)?;
        if let Some(extensions_hash) = &self.extensions_hash {
            serialize_opaque_vec(extensions_hash, buf)?;
        }
        Ok(())
    }
}

/// The four secrets of an epoch.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct EpochSecrets {
    pub epoch_secret: Secret,
    pub sender_data_secret: Secret,
    pub handshake_secret: Secret,
    pub application_secret: Secret,
}

impl Deserializer for EpochSecrets {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        Ok(Self {
            epoch_secret: deserialize_secret(buf)?,
            sender_data_secret: deserialize_secret(buf)?,
            handshake_secret: deserialize_secret(buf)?,
            application_secret: deserialize_secret(buf)?,
        })
    }
}

fn deserialize_secret<B: Buf>(buf: &mut B) -> Result<Secret> {
    let secret: [u8; SECRET_SIZE] = deserialize_fixed(buf)?;
    Ok(Secret::from(secret.to_vec()))
}

impl Serializer for EpochSecrets {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        for secret in [
            &self.epoch_secret,
            &self.sender_data_secret,
            &self.handshake_secret,
            &self.application_secret,
        ] {
            if secret.len() != SECRET_SIZE {
                return Err(Error::InvalidKeyLength);
            }
            buf.put_slice(secret);
        }
        Ok(())
    }
}

/// Derives the secrets of an epoch from its init secret and the hash of its
/// group context.
pub fn derive_epoch_secrets(
    crypto_provider: &impl CryptoProvider,
    init_secret: &[u8],
    group_context_hash: &[u8],
) -> Result<EpochSecrets> {
    let info = [LABEL_PREFIX, SECRET_LABEL_EPOCH].concat();
    #[allow(clippy::cast_possible_truncation)]
    let epoch_secret = crypto_provider.kdf().extract_and_expand(
        init_secret,
        group_context_hash,
        &info,
        SECRET_SIZE as u16,
    )?;

    let sender_data_secret =
        crypto_provider.derive_secret(&epoch_secret, SECRET_LABEL_SENDER_DATA)?;
    let handshake_secret = crypto_provider.derive_secret(&epoch_secret, SECRET_LABEL_HANDSHAKE)?;
    let application_secret =
        crypto_provider.derive_secret(&epoch_secret, SECRET_LABEL_APPLICATION)?;

    Ok(EpochSecrets {
        epoch_secret: epoch_secret.into(),
        sender_data_secret: sender_data_secret.into(),
        handshake_secret: handshake_secret.into(),
        application_secret: application_secret.into(),
    })
}

/// Mixes the commit secret of the new epoch into the previous epoch's init
/// secret. The result is the init secret handed to [`derive_epoch_secrets`].
pub fn joiner_secret(
    crypto_provider: &impl CryptoProvider,
    init_secret: &[u8],
    commit_secret: &[u8],
) -> Result<Secret> {
    Ok(crypto_provider
        .kdf()
        .extract(init_secret, commit_secret)?
        .into())
}

/// Secret chained into the next epoch.
pub fn next_init_secret(
    crypto_provider: &impl CryptoProvider,
    epoch_secrets: &EpochSecrets,
) -> Result<Secret> {
    Ok(crypto_provider
        .derive_secret(&epoch_secrets.epoch_secret, SECRET_LABEL_INIT)?
        .into())
}

/// Key and nonce for message `generation` of `sender`. Each pair is derived
/// directly from the application secret, so any generation can be computed
/// without walking through the earlier ones.
pub fn derive_application_keys(
    crypto_provider: &impl CryptoProvider,
    application_secret: &[u8],
    sender: LeafIndex,
    generation: u32,
) -> Result<(Secret, Bytes)> {
    let mut context = [0u8; 8];
    context[..4].copy_from_slice(&sender.0.to_be_bytes());
    context[4..].copy_from_slice(&generation.to_be_bytes());

    let key = crypto_provider.expand_with_label(
        application_secret,
        SECRET_LABEL_KEY,
        &context,
        AEAD_KEY_SIZE,
    )?;
    let nonce = crypto_provider.expand_with_label(
        application_secret,
        SECRET_LABEL_NONCE,
        &context,
        AEAD_NONCE_SIZE,
    )?;

    Ok((key.into(), nonce))
}

/// Key sealing the commits sent during the epoch owning `handshake_secret`.
pub fn commit_envelope_key(
    crypto_provider: &impl CryptoProvider,
    handshake_secret: &[u8],
) -> Result<Secret> {
    Ok(crypto_provider
        .expand_with_label(handshake_secret, SECRET_LABEL_COMMIT_KEY, &[], AEAD_KEY_SIZE)?
        .into())
}
