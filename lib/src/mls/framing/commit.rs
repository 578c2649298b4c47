use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::mls::framing::proposal::Proposal;
use crate::mls::key_schedule::GroupContext;
use crate::mls::ratchet_tree::UpdatePath;
use crate::mls::utilities::error::Result;
use crate::mls::utilities::serde::{
    deserialize_opaque_vec, deserialize_optional, deserialize_vector, serialize_opaque_vec,
    serialize_optional, serialize_vector, Deserializer, Serializer,
};

pub const LABEL_COMMIT: &[u8] = b"CommitTBS";

/// A set of proposals applied together, moving the group to the next epoch.
///
/// Commits built by this engine always carry an update path, so every commit
/// refreshes the committer's keys.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    pub proposals: Vec<Proposal>,
    pub update_path: Option<UpdatePath>,
}

impl Deserializer for Commit {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let mut proposals = vec![];
        deserialize_vector(buf, |b: &mut Bytes| -> Result<()> {
            proposals.push(Proposal::deserialize(b)?);
            Ok(())
        })?;

        let has_path = deserialize_optional(buf)?;
        let update_path = if has_path {
            Some(UpdatePath::deserialize(buf)?)
        } else {
            None
        };

        Ok(Self {
            proposals,
            update_path,
        })
    }
}

impl Serializer for Commit {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        serialize_vector(
            self.proposals.len(),
            buf,
            |i: usize, b: &mut BytesMut| -> Result<()> { self.proposals[i].serialize(b) },
        )?;
        serialize_optional(self.update_path.is_some(), buf)?;
        if let Some(update_path) = &self.update_path {
            update_path.serialize(buf)?;
        }

        Ok(())
    }
}

/// Plaintext of a commit envelope: the commit and the committer's signature
/// over it.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct SignedCommit {
    pub commit: Commit,
    pub signature: Bytes,
}

impl SignedCommit {
    /// Bytes the committer signs: the context of the epoch the commit was
    /// made in, followed by the commit.
    pub fn to_be_signed(context: &GroupContext, commit: &Commit) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        context.serialize(&mut buf)?;
        commit.serialize(&mut buf)?;
        Ok(buf.freeze())
    }
}

impl Deserializer for SignedCommit {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let commit = Commit::deserialize(buf)?;
        let signature = deserialize_opaque_vec(buf)?;

        Ok(Self { commit, signature })
    }
}

impl Serializer for SignedCommit {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        self.commit.serialize(buf)?;
        serialize_opaque_vec(&self.signature, buf)
    }
}
