use bytes::{Buf, BufMut, Bytes};
use serde::{Deserialize, Serialize};

use crate::mls::utilities::error::{Error, Result};
use crate::mls::utilities::serde::{
    deserialize_opaque_vec, serialize_opaque_vec, Deserializer, Serializer,
};

/// Identifier of a member, as handed to the engine by the caller. The engine
/// only compares user ids, it never resolves them.
#[derive(Default, Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_owned())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        UserId(value)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deserializer for UserId {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let bytes: Bytes = deserialize_opaque_vec(buf)?;
        let id = String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidUtf8)?;
        Ok(UserId(id))
    }
}

impl Serializer for UserId {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        serialize_opaque_vec(self.0.as_bytes(), buf)
    }
}
