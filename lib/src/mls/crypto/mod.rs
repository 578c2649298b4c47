//! [RFC9420 Sec.5](https://www.rfc-editor.org/rfc/rfc9420.html#section-5) Cryptographic Objects

use bytes::{Buf, BufMut, Bytes};
use std::fmt::{Debug, Formatter};
use std::ops::Deref;

use crate::mls::utilities::{
    error::Result,
    serde::{deserialize_opaque_vec, serialize_opaque_vec, Deserializer, Serializer},
};
use crate::util::base64;

pub mod cipher_suite;
pub mod key_pair;
pub mod provider;
pub mod rng;

/// Public key material. Safe to log and to store in the public partition.
#[derive(Default, Clone, Eq, PartialEq, Hash)]
pub struct Key(Bytes);

impl Key {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }
}

impl Deref for Key {
    type Target = Bytes;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Bytes> for Key {
    fn from(value: Bytes) -> Self {
        Self(value)
    }
}

impl From<Vec<u8>> for Key {
    fn from(value: Vec<u8>) -> Self {
        Self(Bytes::from(value))
    }
}

impl Debug for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({})", base64::encode_abbreviated(&self.0))
    }
}

impl Deserializer for Key {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        Ok(Key(deserialize_opaque_vec(buf)?))
    }
}

impl Serializer for Key {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        serialize_opaque_vec(&self.0, buf)
    }
}

/// Private key or secret. Only ever written to the secure partition, and never
/// printed.
#[derive(Default, Clone, Eq, PartialEq)]
pub struct Secret(Bytes);

impl Secret {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }
}

impl Deref for Secret {
    type Target = Bytes;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Bytes> for Secret {
    fn from(value: Bytes) -> Self {
        Self(value)
    }
}

impl From<Vec<u8>> for Secret {
    fn from(value: Vec<u8>) -> Self {
        Self(Bytes::from(value))
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(<{} bytes>)", self.0.len())
    }
}

impl Deserializer for Secret {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        Ok(Secret(deserialize_opaque_vec(buf)?))
    }
}

impl Serializer for Secret {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        serialize_opaque_vec(&self.0, buf)
    }
}

/// [RFC9420 Sec.5.1.1](https://www.rfc-editor.org/rfc/rfc9420.html#section-5.1.1) HPKE public keys are
/// opaque values in a format defined by the underlying protocol (see Section 4 of
/// [RFC9180](https://www.rfc-editor.org/rfc/rfc9180.html) for more information).
pub type HpkePublicKey = Key;
pub type HpkePrivateKey = Secret;

/// [RFC9420 Sec.5.1.1](https://www.rfc-editor.org/rfc/rfc9420.html#section-5.1.1) Signature public keys
/// are likewise represented as opaque values in a format defined by the cipher suite's signature scheme.
pub type SignaturePublicKey = Key;
pub type SignaturePrivateKey = Secret;

/// [RFC9180 Sec.7.1](https://www.rfc-editor.org/rfc/rfc9180.html#section-7.1) Key Encapsulation
/// Mechanism (KEM) of HPKE parameters
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u16)]
pub enum KemId {
    #[default]
    /// DHKEM using X25519 Diffie-Hellman and HKDF with SHA-256.
    X25519HkdfSha256 = 0x20,
}

/// [RFC9180 Sec.7.2](https://www.rfc-editor.org/rfc/rfc9180.html#section-7.2) Key Derivation Function
/// (KDF) of HPKE parameters
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u16)]
pub enum KdfId {
    #[default]
    HkdfSha256 = 0x01,
}

/// [RFC9180 Sec.7.3](https://www.rfc-editor.org/rfc/rfc9180.html#section-7.3) Authenticated Encryption
/// with Associated Data (AEAD) encryption algorithm of HPKE parameters
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u16)]
pub enum AeadId {
    #[default]
    /// AES-256 block cipher in Galois Counter Mode (GCM).
    Aes256Gcm = 0x02,
}
