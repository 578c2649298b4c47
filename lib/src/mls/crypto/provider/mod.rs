//! Pluggable cryptographic primitives.
//!
//! A [`CryptoProvider`] hands out one implementation of each capability
//! ([`Kdf`], [`Aead`], [`Signature`], [`Hpke`], and the [`Hash`] used for tree
//! and transcript hashes). Each capability is its own trait object, so a
//! provider can swap one primitive without touching the others.
//!
//! The labeled helpers at the bottom of [`CryptoProvider`] follow
//! [RFC9420 Sec.5](https://www.rfc-editor.org/rfc/rfc9420.html#section-5) and
//! are what the rest of the crate uses; raw primitives are only called
//! directly where the protocol does so.

mod rust;

use bytes::{BufMut, Bytes, BytesMut};

pub use self::rust::RustCryptoProvider;
use super::cipher_suite::CipherSuite;
use super::key_pair::{HpkeKeyPair, SignatureKeyPair};
use super::{AeadId, KdfId, KemId};
use crate::mls::utilities::error::Result;
use crate::mls::utilities::serde::serialize_opaque_vec;

/// Prefix of every label fed to the labeled KDF, signature and HPKE helpers.
pub const LABEL_PREFIX: &[u8] = b"mls10 ";

#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub enum HashScheme {
    #[default]
    SHA256,
}

#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub enum SignatureScheme {
    #[default]
    ED25519,
}

#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub struct HpkeSuite {
    pub kem: KemId,
    pub kdf: KdfId,
    pub aead: AeadId,
}

pub trait Hash: Send + Sync {
    fn size(&self) -> usize;

    fn digest(&self, data: &[u8]) -> Bytes;
}

/// Extract-then-expand key derivation.
pub trait Kdf: Send + Sync {
    /// Size of the pseudorandom key produced by [`Kdf::extract`].
    fn extract_size(&self) -> u16;

    fn extract(&self, salt: &[u8], ikm: &[u8]) -> Result<Bytes>;

    fn expand(&self, prk: &[u8], info: &[u8], length: u16) -> Result<Bytes>;

    fn extract_and_expand(
        &self,
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        length: u16,
    ) -> Result<Bytes> {
        let prk = self.extract(salt, ikm)?;
        self.expand(&prk, info, length)
    }
}

pub trait Aead: Send + Sync {
    fn key_size(&self) -> u16;

    fn nonce_size(&self) -> u16;

    fn seal(&self, key: &[u8], nonce: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Bytes>;

    /// Fails with [`crate::mls::Error::Decryption`] when the ciphertext does
    /// not authenticate under `key`, `nonce` and `aad`.
    fn open(&self, key: &[u8], nonce: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Bytes>;
}

pub trait Signature: Send + Sync {
    fn signature_scheme(&self) -> SignatureScheme;

    fn generate_key_pair(&self) -> Result<SignatureKeyPair>;

    fn sign(&self, private_key: &[u8], message: &[u8]) -> Result<Bytes>;

    /// Malformed keys or signatures simply don't verify.
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool;
}

/// Sender half of an HPKE context. Each call to `seal` advances the context's
/// sequence number, so the recipient must open in the same order.
pub trait HpkeSealingContext {
    fn seal(&mut self, plaintext: &[u8], aad: &[u8]) -> Result<Bytes>;
}

/// Recipient half of an HPKE context.
pub trait HpkeOpeningContext {
    fn open(&mut self, ciphertext: &[u8], aad: &[u8]) -> Result<Bytes>;
}

/// [RFC9180](https://www.rfc-editor.org/rfc/rfc9180.html) base mode HPKE.
pub trait Hpke: Send + Sync {
    fn hpke_suite(&self) -> HpkeSuite;

    fn generate_key_pair(&self) -> Result<HpkeKeyPair>;

    /// Deterministically derives a key pair, so that an HPKE key can be
    /// recomputed from an existing 32-byte seed instead of being stored.
    fn derive_key_pair(&self, seed: &[u8; 32]) -> Result<HpkeKeyPair>;

    /// Returns the encapsulated key and the sealing context.
    fn setup_base_sender(
        &self,
        recipient_public_key: &[u8],
        info: &[u8],
    ) -> Result<(Bytes, Box<dyn HpkeSealingContext>)>;

    fn setup_base_recipient(
        &self,
        encapsulated_key: &[u8],
        recipient_private_key: &[u8],
        info: &[u8],
    ) -> Result<Box<dyn HpkeOpeningContext>>;
}

pub trait CryptoProvider: Send + Sync {
    fn cipher_suite(&self) -> CipherSuite;

    fn supports(&self, cipher_suite: CipherSuite) -> bool {
        self.cipher_suite() == cipher_suite
    }

    fn hash(&self) -> &dyn Hash;

    fn kdf(&self) -> &dyn Kdf;

    fn aead(&self) -> &dyn Aead;

    fn signature(&self) -> &dyn Signature;

    fn hpke(&self) -> &dyn Hpke;

    /// [RFC9420 Sec.8](https://www.rfc-editor.org/rfc/rfc9420.html#section-8)
    ///
    /// ```text
    /// ExpandWithLabel(Secret, Label, Context, Length) =
    ///     KDF.Expand(Secret, KDFLabel, Length)
    /// ```
    fn expand_with_label(
        &self,
        secret: &[u8],
        label: &[u8],
        context: &[u8],
        length: u16,
    ) -> Result<Bytes> {
        let mut kdf_label = BytesMut::new();
        kdf_label.put_u16(length);
        serialize_opaque_vec(&[LABEL_PREFIX, label].concat(), &mut kdf_label)?;
        serialize_opaque_vec(context, &mut kdf_label)?;

        self.kdf().expand(secret, &kdf_label, length)
    }

    /// ```text
    /// DeriveSecret(Secret, Label) =
    ///     ExpandWithLabel(Secret, Label, "", KDF.Nh)
    /// ```
    fn derive_secret(&self, secret: &[u8], label: &[u8]) -> Result<Bytes> {
        let length = self.kdf().extract_size();
        self.expand_with_label(secret, label, &[], length)
    }

    /// [RFC9420 Sec.5.1.2](https://www.rfc-editor.org/rfc/rfc9420.html#section-5.1.2)
    fn sign_with_label(&self, sign_key: &[u8], label: &[u8], content: &[u8]) -> Result<Bytes> {
        let sign_content = sign_content(label, content)?;
        self.signature().sign(sign_key, &sign_content)
    }

    fn verify_with_label(
        &self,
        verify_key: &[u8],
        label: &[u8],
        content: &[u8],
        signature: &[u8],
    ) -> bool {
        match sign_content(label, content) {
            Ok(sign_content) => self.signature().verify(verify_key, &sign_content, signature),
            Err(_) => false,
        }
    }

    /// [RFC9420 Sec.5.1.3](https://www.rfc-editor.org/rfc/rfc9420.html#section-5.1.3) One-shot HPKE
    /// encryption, returning `(kem_output, ciphertext)`.
    fn encrypt_with_label(
        &self,
        public_key: &[u8],
        label: &[u8],
        context: &[u8],
        plaintext: &[u8],
    ) -> Result<(Bytes, Bytes)> {
        let info = encrypt_context(label, context)?;
        let (kem_output, mut sealer) = self.hpke().setup_base_sender(public_key, &info)?;
        let ciphertext = sealer.seal(plaintext, &[])?;
        Ok((kem_output, ciphertext))
    }

    fn decrypt_with_label(
        &self,
        private_key: &[u8],
        label: &[u8],
        context: &[u8],
        kem_output: &[u8],
        ciphertext: &[u8],
    ) -> Result<Bytes> {
        let info = encrypt_context(label, context)?;
        let mut opener = self
            .hpke()
            .setup_base_recipient(kem_output, private_key, &info)?;
        opener.open(ciphertext, &[])
    }
}

fn sign_content(label: &[u8], content: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    serialize_opaque_vec(&[LABEL_PREFIX, label].concat(), &mut buf)?;
    serialize_opaque_vec(content, &mut buf)?;
    Ok(buf.freeze())
}

pub(crate) fn encrypt_context(label: &[u8], context: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    serialize_opaque_vec(&[LABEL_PREFIX, label].concat(), &mut buf)?;
    serialize_opaque_vec(context, &mut buf)?;
    Ok(buf.freeze())
}
