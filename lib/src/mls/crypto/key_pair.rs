use bytes::{Buf, BufMut};

use crate::mls::crypto::{HpkePrivateKey, HpkePublicKey, SignaturePrivateKey, SignaturePublicKey};
use crate::mls::utilities::error::Result;
use crate::mls::utilities::serde::{Deserializer, Serializer};

/// HPKE key pair used for encryption to a tree node or a member's leaf.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HpkeKeyPair {
    pub private_key: HpkePrivateKey,
    pub public_key: HpkePublicKey,
}

/// Identity key pair. The private key is the 32-byte Ed25519 seed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SignatureKeyPair {
    pub private_key: SignaturePrivateKey,
    pub public_key: SignaturePublicKey,
}

impl Deserializer for HpkeKeyPair {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let private_key = HpkePrivateKey::deserialize(buf)?;
        let public_key = HpkePublicKey::deserialize(buf)?;
        Ok(Self {
            private_key,
            public_key,
        })
    }
}

impl Serializer for HpkeKeyPair {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        self.private_key.serialize(buf)?;
        self.public_key.serialize(buf)
    }
}

impl Deserializer for SignatureKeyPair {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let private_key = SignaturePrivateKey::deserialize(buf)?;
        let public_key = SignaturePublicKey::deserialize(buf)?;
        Ok(Self {
            private_key,
            public_key,
        })
    }
}

impl Serializer for SignatureKeyPair {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        self.private_key.serialize(buf)?;
        self.public_key.serialize(buf)
    }
}
