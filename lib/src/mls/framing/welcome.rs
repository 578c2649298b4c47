//! [RFC9420 Sec.12.4.3](https://www.rfc-editor.org/rfc/rfc9420.html#section-12.4.3) Adding Members to
//! the Group
//!
//! A Welcome carries everything a new member needs to start at the epoch its
//! Add was committed in. Both parts are sealed with a single HPKE context to
//! the invitee's key: first the [`GroupSecrets`], then the [`GroupInfo`].

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::identifiers::GroupId;
use crate::mls::crypto::provider::{encrypt_context, CryptoProvider};
use crate::mls::crypto::{HpkePublicKey, Secret, SignaturePrivateKey};
use crate::mls::group::state::GroupMember;
use crate::mls::key_schedule::{EpochSecrets, GroupContext};
use crate::mls::ratchet_tree::{HpkeCiphertext, RatchetTree};
use crate::mls::utilities::error::{Error, Result};
use crate::mls::utilities::serde::{
    deserialize_opaque_vec, deserialize_optional, deserialize_u32, deserialize_vector,
    serialize_opaque_vec, serialize_optional, serialize_vector, Deserializer, Serializer,
};
use crate::mls::utilities::tree_math::LeafIndex;

pub const LABEL_WELCOME: &[u8] = b"Welcome";
pub const LABEL_GROUP_INFO: &[u8] = b"GroupInfoTBS";

/// Secrets of the epoch the invitee joins at.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct GroupSecrets {
    pub init_secret: Secret,
    pub epoch_secrets: EpochSecrets,
    /// Leaf the invitee was placed at.
    pub leaf_index: LeafIndex,
    /// Path secret of the lowest node shared by the committer's and the
    /// invitee's direct paths. Absent when the committer had no direct path.
    pub path_secret: Option<Secret>,
}

impl Deserializer for GroupSecrets {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let init_secret = Secret::deserialize(buf)?;
        let epoch_secrets = EpochSecrets::deserialize(buf)?;
        let leaf_index = LeafIndex(deserialize_u32(buf)?);
        let path_secret = if deserialize_optional(buf)? {
            Some(Secret::deserialize(buf)?)
        } else {
            None
        };

        Ok(Self {
            init_secret,
            epoch_secrets,
            leaf_index,
            path_secret,
        })
    }
}

impl Serializer for GroupSecrets {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        self.init_secret.serialize(buf)?;
        self.epoch_secrets.serialize(buf)?;
        buf.put_u32(self.leaf_index.0);
        serialize_optional(self.path_secret.is_some(), buf)?;
        if let Some(path_secret) = &self.path_secret {
            path_secret.serialize(buf)?;
        }
        Ok(())
    }
}

/// Public state of the group, signed by the committer.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct GroupInfo {
    pub group_context: GroupContext,
    pub group_name: String,
    pub tree: RatchetTree,
    pub members: Vec<GroupMember>,
    pub signer: LeafIndex,
    pub signature: Bytes,
}

impl GroupInfo {
    fn to_be_signed(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        self.group_context.serialize(&mut buf)?;
        serialize_opaque_vec(self.group_name.as_bytes(), &mut buf)?;
        self.tree.serialize(&mut buf)?;
        serialize_vector(
            self.members.len(),
            &mut buf,
            |i: usize, b: &mut BytesMut| -> Result<()> { self.members[i].serialize(b) },
        )?;
        buf.put_u32(self.signer.0);
        Ok(buf.freeze())
    }

    pub fn sign(
        &mut self,
        crypto_provider: &impl CryptoProvider,
        sign_key: &SignaturePrivateKey,
    ) -> Result<()> {
        let tbs = self.to_be_signed()?;
        self.signature = crypto_provider.sign_with_label(sign_key, LABEL_GROUP_INFO, &tbs)?;
        Ok(())
    }

    /// Checks the signature against the identity key of the signer's leaf.
    pub fn verify(&self, crypto_provider: &impl CryptoProvider) -> Result<bool> {
        let Some(signer) = self
            .members
            .iter()
            .find(|member| member.leaf_index == self.signer)
        else {
            return Ok(false);
        };

        let tbs = self.to_be_signed()?;
        Ok(crypto_provider.verify_with_label(
            &signer.identity_key,
            LABEL_GROUP_INFO,
            &tbs,
            &self.signature,
        ))
    }
}

impl Deserializer for GroupInfo {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let group_context = GroupContext::deserialize(buf)?;
        let group_name = String::from_utf8(deserialize_opaque_vec(buf)?.to_vec())
            .map_err(|_| Error::InvalidUtf8)?;
        let tree = RatchetTree::deserialize(buf)?;

        let mut members = vec![];
        deserialize_vector(buf, |b: &mut Bytes| -> Result<()> {
            members.push(GroupMember::deserialize(b)?);
            Ok(())
        })?;

        let signer = LeafIndex(deserialize_u32(buf)?);
        let signature = deserialize_opaque_vec(buf)?;

        Ok(Self {
            group_context,
            group_name,
            tree,
            members,
            signer,
            signature,
        })
    }
}

impl Serializer for GroupInfo {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        buf.put(self.to_be_signed()?);
        serialize_opaque_vec(&self.signature, buf)
    }
}

#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct Welcome {
    pub group_id: GroupId,
    pub encrypted_group_secrets: HpkeCiphertext,
    pub encrypted_group_info: Bytes,
}

impl Welcome {
    pub(crate) fn seal(
        crypto_provider: &impl CryptoProvider,
        recipient_key: &HpkePublicKey,
        group_secrets: &GroupSecrets,
        group_info: &GroupInfo,
    ) -> Result<Self> {
        let group_id = group_info.group_context.group_id.clone();
        let info = encrypt_context(LABEL_WELCOME, group_id.as_ref())?;

        let (kem_output, mut context) = crypto_provider
            .hpke()
            .setup_base_sender(recipient_key, &info)?;
        let ciphertext = context.seal(&group_secrets.serialize_detached()?, &[])?;
        let encrypted_group_info = context.seal(&group_info.serialize_detached()?, &[])?;

        Ok(Self {
            group_id,
            encrypted_group_secrets: HpkeCiphertext {
                kem_output,
                ciphertext,
            },
            encrypted_group_info,
        })
    }

    /// Fails with [`Error::WelcomeNotForUs`] if `private_key` can't open it.
    pub(crate) fn open(
        &self,
        crypto_provider: &impl CryptoProvider,
        private_key: &[u8],
    ) -> Result<(GroupSecrets, GroupInfo)> {
        let info = encrypt_context(LABEL_WELCOME, self.group_id.as_ref())?;

        let mut context = crypto_provider
            .hpke()
            .setup_base_recipient(
                &self.encrypted_group_secrets.kem_output,
                private_key,
                &info,
            )
            .map_err(|_| Error::WelcomeNotForUs)?;
        let group_secrets = context
            .open(&self.encrypted_group_secrets.ciphertext, &[])
            .map_err(|_| Error::WelcomeNotForUs)?;
        let group_info = context
            .open(&self.encrypted_group_info, &[])
            .map_err(|_| Error::InvalidWelcome("group info does not decrypt"))?;

        Ok((
            GroupSecrets::deserialize_exact(&group_secrets)?,
            GroupInfo::deserialize_exact(&group_info)?,
        ))
    }
}

impl Deserializer for Welcome {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let group_id = GroupId::deserialize(buf)?;
        let encrypted_group_secrets = HpkeCiphertext::deserialize(buf)?;
        let encrypted_group_info = deserialize_opaque_vec(buf)?;

        Ok(Self {
            group_id,
            encrypted_group_secrets,
            encrypted_group_info,
        })
    }
}

impl Serializer for Welcome {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        self.group_id.serialize(buf)?;
        self.encrypted_group_secrets.serialize(buf)?;
        serialize_opaque_vec(&self.encrypted_group_info, buf)
    }
}
