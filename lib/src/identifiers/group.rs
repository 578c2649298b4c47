use bytes::{Buf, BufMut, Bytes};
use serde::{Deserialize, Serialize};

use crate::mls::utilities::error::Result;
use crate::mls::utilities::serde::{
    deserialize_opaque_vec, serialize_opaque_vec, Deserializer, Serializer,
};
use crate::util::base64::Base64String;
use crate::util::uuid::generate_uuid;

/// `GroupId` is the unique identifier of a group.
///
/// It is generated during group creation and never changes. The engine treats
/// it as opaque bytes; groups it creates itself use the 16 bytes of a random
/// UUID, which carries no metadata.
#[derive(Default, Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Hash, PartialOrd, Ord)]
pub struct GroupId(Bytes);

impl GroupId {
    pub fn generate() -> Self {
        GroupId(Bytes::copy_from_slice(generate_uuid().as_bytes()))
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Unpadded URL-safe base64, usable as a storage key.
    pub fn to_base64(&self) -> Base64String {
        Base64String::from_bytes(&self.0)
    }
}

impl AsRef<[u8]> for GroupId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Bytes> for GroupId {
    fn from(value: Bytes) -> Self {
        GroupId(value)
    }
}

impl From<&[u8]> for GroupId {
    fn from(value: &[u8]) -> Self {
        GroupId(Bytes::copy_from_slice(value))
    }
}

impl From<uuid::Uuid> for GroupId {
    fn from(value: uuid::Uuid) -> Self {
        GroupId(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Group({})", self.to_base64())
    }
}

impl Deserializer for GroupId {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        Ok(GroupId(deserialize_opaque_vec(buf)?))
    }
}

impl Serializer for GroupId {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        serialize_opaque_vec(&self.0, buf)
    }
}
