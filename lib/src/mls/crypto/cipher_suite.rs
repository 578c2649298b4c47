//! [RFC9420 Sec.5.1](https://www.rfc-editor.org/rfc/rfc9420.html#section-5.1) Cipher Suite specifies
//! the cryptographic primitives to be used in group key computations.

use std::fmt::{Display, Formatter};

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::mls::utilities::error::{Error, Result};
use crate::mls::utilities::serde::{Deserializer, Serializer};

/// A cipher suite is the set of cryptographic algorithms used by a group.
///
/// The only suite is not one of the RFC9420 registered suites: it pairs X25519
/// and Ed25519 with AES-256-GCM, so it lives in the private use range.
#[allow(non_camel_case_types)]
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum CipherSuite {
    #[default]
    MLS_256_DHKEMX25519_AES256GCM_SHA256_Ed25519,
    Unknown(u16),
}

impl From<u16> for CipherSuite {
    fn from(v: u16) -> Self {
        match v {
            0xF001 => CipherSuite::MLS_256_DHKEMX25519_AES256GCM_SHA256_Ed25519,
            _ => CipherSuite::Unknown(v),
        }
    }
}

impl From<CipherSuite> for u16 {
    fn from(val: CipherSuite) -> u16 {
        match val {
            CipherSuite::MLS_256_DHKEMX25519_AES256GCM_SHA256_Ed25519 => 0xF001,
            CipherSuite::Unknown(v) => v,
        }
    }
}

impl Display for CipherSuite {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Deserializer for CipherSuite {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        if buf.remaining() < 2 {
            return Err(Error::BufferTooSmall);
        }
        Ok(buf.get_u16().into())
    }
}

impl Serializer for CipherSuite {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        buf.put_u16((*self).into());
        Ok(())
    }
}
