//! [RFC9420 Sec.6](https://www.rfc-editor.org/rfc/rfc9420.html#section-6) Message Framing
//!
//! Everything the engine hands to the transport: encrypted messages
//! ([`MlsCiphertext`]), the commits they carry, and the [`Welcome`] messages
//! that bring new members in.

#[cfg(test)]
mod framing_test;

pub mod ciphertext;
pub mod commit;
pub mod proposal;
pub mod welcome;

use bytes::{Buf, BufMut};

pub use self::ciphertext::MlsCiphertext;
pub use self::commit::{Commit, SignedCommit};
pub use self::proposal::{AddProposal, Proposal, RemoveProposal, UpdateProposal};
pub use self::welcome::{GroupInfo, GroupSecrets, Welcome};
use crate::mls::utilities::error::{Error, Result};
use crate::mls::utilities::serde::{Deserializer, Serializer};

/// What an [`MlsCiphertext`] carries.
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum ContentType {
    #[default]
    Application = 1,
    Commit = 2,
}

impl TryFrom<u8> for ContentType {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            1 => Ok(ContentType::Application),
            2 => Ok(ContentType::Commit),
            _ => Err(Error::InvalidEnumValue(u16::from(v))),
        }
    }
}

impl Deserializer for ContentType {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        if !buf.has_remaining() {
            return Err(Error::BufferTooSmall);
        }
        ContentType::try_from(buf.get_u8())
    }
}

impl Serializer for ContentType {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        buf.put_u8(*self as u8);
        Ok(())
    }
}
