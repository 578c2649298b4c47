use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::identifiers::GroupId;
use crate::mls::framing::ContentType;
use crate::mls::key_schedule::GroupContext;
use crate::mls::utilities::error::Result;
use crate::mls::utilities::serde::{
    deserialize_opaque_vec, deserialize_u32, deserialize_u64, serialize_opaque_vec, Deserializer,
    Serializer,
};
use crate::mls::utilities::tree_math::LeafIndex;

/// An AEAD-protected message for one epoch of a group, either application
/// data or a commit moving the group to `epoch`.
///
/// `epoch` is a 64-bit big-endian field on the wire, matching the epoch in
/// [`GroupContext`], so a long-lived group never wraps.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct MlsCiphertext {
    pub group_id: GroupId,
    pub epoch: u64,
    pub sender_index: LeafIndex,
    pub nonce: Bytes,
    pub ciphertext: Bytes,
    pub content_type: ContentType,
}

impl MlsCiphertext {
    /// Additional data bound to the ciphertext: the group context of the
    /// epoch the key belongs to, the sender and the content type. A message
    /// replayed into another group or epoch, or attributed to another sender,
    /// fails to open.
    pub(crate) fn additional_data(
        context: &GroupContext,
        sender_index: LeafIndex,
        content_type: ContentType,
    ) -> Result<Bytes> {
        let mut aad = BytesMut::new();
        context.serialize(&mut aad)?;
        aad.put_u32(sender_index.0);
        content_type.serialize(&mut aad)?;
        Ok(aad.freeze())
    }
}

impl Deserializer for MlsCiphertext {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let group_id = GroupId::deserialize(buf)?;
        let epoch = deserialize_u64(buf)?;
        let sender_index = LeafIndex(deserialize_u32(buf)?);
        let nonce = deserialize_opaque_vec(buf)?;
        let ciphertext = deserialize_opaque_vec(buf)?;
        let content_type = ContentType::deserialize(buf)?;

        Ok(Self {
            group_id,
            epoch,
            sender_index,
            nonce,
            ciphertext,
            content_type,
        })
    }
}

impl Serializer for MlsCiphertext {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        self.group_id.serialize(buf)?;
        buf.put_u64(self.epoch);
        buf.put_u32(self.sender_index.0);
        serialize_opaque_vec(&self.nonce, buf)?;
        serialize_opaque_vec(&self.ciphertext, buf)?;
        self.content_type.serialize(buf)
    }
}
