//! Immutable snapshot of everything a member knows about a group at one epoch.
//!
//! Transitions never modify a [`GroupState`] in place: they build the next
//! snapshot with [`GroupState::copy_with`], which consumes the previous one.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::identifiers::{GroupId, UserId};
use crate::mls::crypto::{
    HpkePrivateKey, HpkePublicKey, Secret, SignaturePrivateKey, SignaturePublicKey,
};
use crate::mls::key_schedule::{EpochSecrets, GroupContext};
use crate::mls::ratchet_tree::RatchetTree;
use crate::mls::storage::StorageError;
use crate::mls::utilities::error::{Error, Result};
use crate::mls::utilities::serde::{
    deserialize_u32, deserialize_u64, deserialize_vector, serialize_vector, Deserializer,
    RecordReader, RecordWriter, Serializer,
};
use crate::mls::utilities::tree_math::LeafIndex;

pub const PUBLIC_FORMAT_VERSION: u8 = 1;
pub const SECURE_FORMAT_VERSION: u8 = 1;

#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct GroupMember {
    pub user_id: UserId,
    pub leaf_index: LeafIndex,
    pub identity_key: SignaturePublicKey,
    pub hpke_public_key: HpkePublicKey,
}

impl Deserializer for GroupMember {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let user_id = UserId::deserialize(buf)?;
        let leaf_index = LeafIndex(deserialize_u32(buf)?);
        let identity_key = SignaturePublicKey::deserialize(buf)?;
        let hpke_public_key = HpkePublicKey::deserialize(buf)?;

        Ok(Self {
            user_id,
            leaf_index,
            identity_key,
            hpke_public_key,
        })
    }
}

impl Serializer for GroupMember {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        self.user_id.serialize(buf)?;
        buf.put_u32(self.leaf_index.0);
        self.identity_key.serialize(buf)?;
        self.hpke_public_key.serialize(buf)
    }
}

/// Highest message generation seen (or sent) per member in the current epoch.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct GenerationMap(BTreeMap<LeafIndex, u32>);

impl GenerationMap {
    /// 0 until the member's first message of the epoch.
    pub fn get(&self, leaf: LeafIndex) -> u32 {
        self.0.get(&leaf).copied().unwrap_or(0)
    }

    /// Moves the watermark of `leaf` up by one and returns the new value.
    /// Fails once every generation of the epoch has been used; the member
    /// has to move the group to a new epoch before sending again.
    pub fn increment(&mut self, leaf: LeafIndex) -> Result<u32> {
        let generation = self.0.entry(leaf).or_insert(0);
        *generation = generation
            .checked_add(1)
            .ok_or(Error::GenerationExhausted(leaf))?;
        Ok(*generation)
    }

    /// Raises the watermark of `leaf` to `generation`. Lower values are
    /// ignored, the watermark never goes back.
    pub fn set(&mut self, leaf: LeafIndex, generation: u32) {
        let current = self.0.entry(leaf).or_insert(0);
        if generation > *current {
            *current = generation;
        }
    }
}

impl Deserializer for GenerationMap {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let mut map = BTreeMap::new();
        deserialize_vector(buf, |b: &mut Bytes| -> Result<()> {
            let leaf = LeafIndex(deserialize_u32(b)?);
            let generation = deserialize_u32(b)?;
            map.insert(leaf, generation);
            Ok(())
        })?;
        Ok(Self(map))
    }
}

impl Serializer for GenerationMap {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        let entries: Vec<(&LeafIndex, &u32)> = self.0.iter().collect();
        serialize_vector(entries.len(), buf, |i: usize, b: &mut BytesMut| -> Result<()> {
            b.put_u32(entries[i].0 .0);
            b.put_u32(*entries[i].1);
            Ok(())
        })
    }
}

/// Members ordered by leaf index.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
struct Members(Vec<GroupMember>);

impl Deserializer for Members {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let mut members = vec![];
        deserialize_vector(buf, |b: &mut Bytes| -> Result<()> {
            members.push(GroupMember::deserialize(b)?);
            Ok(())
        })?;
        Ok(Self(members))
    }
}

impl Serializer for Members {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        serialize_vector(self.0.len(), buf, |i: usize, b: &mut BytesMut| -> Result<()> {
            self.0[i].serialize(b)
        })
    }
}

#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct GroupState {
    context: GroupContext,
    tree: RatchetTree,
    members: Vec<GroupMember>,
    epoch_secrets: EpochSecrets,
    init_secret: Secret,
    generations: GenerationMap,
    own_leaf: LeafIndex,
    identity_private_key: SignaturePrivateKey,
    leaf_private_key: HpkePrivateKey,
}

/// Fields replaced by [`GroupState::copy_with`]. `None` keeps the previous
/// value.
#[derive(Default, Debug, Clone)]
pub struct GroupStateUpdate {
    pub context: Option<GroupContext>,
    pub tree: Option<RatchetTree>,
    pub members: Option<Vec<GroupMember>>,
    pub epoch_secrets: Option<EpochSecrets>,
    pub init_secret: Option<Secret>,
    pub generations: Option<GenerationMap>,
    pub leaf_private_key: Option<HpkePrivateKey>,
}

impl GroupState {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        context: GroupContext,
        tree: RatchetTree,
        members: Vec<GroupMember>,
        epoch_secrets: EpochSecrets,
        init_secret: Secret,
        own_leaf: LeafIndex,
        identity_private_key: SignaturePrivateKey,
        leaf_private_key: HpkePrivateKey,
    ) -> Self {
        let mut members = members;
        members.sort_by_key(|member| member.leaf_index);

        Self {
            context,
            tree,
            members,
            epoch_secrets,
            init_secret,
            generations: GenerationMap::default(),
            own_leaf,
            identity_private_key,
            leaf_private_key,
        }
    }

    /// Next snapshot. Consumes `self` so a stale snapshot can't be kept
    /// around by accident.
    #[must_use]
    pub fn copy_with(self, update: GroupStateUpdate) -> Self {
        let mut members = update.members.unwrap_or(self.members);
        members.sort_by_key(|member| member.leaf_index);

        Self {
            context: update.context.unwrap_or(self.context),
            tree: update.tree.unwrap_or(self.tree),
            members,
            epoch_secrets: update.epoch_secrets.unwrap_or(self.epoch_secrets),
            init_secret: update.init_secret.unwrap_or(self.init_secret),
            generations: update.generations.unwrap_or(self.generations),
            own_leaf: self.own_leaf,
            identity_private_key: self.identity_private_key,
            leaf_private_key: update.leaf_private_key.unwrap_or(self.leaf_private_key),
        }
    }

    pub fn group_id(&self) -> &GroupId {
        &self.context.group_id
    }

    pub fn epoch(&self) -> u64 {
        self.context.epoch
    }

    pub fn context(&self) -> &GroupContext {
        &self.context
    }

    pub fn tree(&self) -> &RatchetTree {
        &self.tree
    }

    pub fn members(&self) -> &[GroupMember] {
        &self.members
    }

    pub fn member(&self, leaf: LeafIndex) -> Option<&GroupMember> {
        self.members.iter().find(|member| member.leaf_index == leaf)
    }

    pub fn member_by_user_id(&self, user_id: &UserId) -> Option<&GroupMember> {
        self.members.iter().find(|member| &member.user_id == user_id)
    }

    pub fn epoch_secrets(&self) -> &EpochSecrets {
        &self.epoch_secrets
    }

    pub fn init_secret(&self) -> &Secret {
        &self.init_secret
    }

    pub fn generations(&self) -> &GenerationMap {
        &self.generations
    }

    pub fn own_leaf(&self) -> LeafIndex {
        self.own_leaf
    }

    pub(crate) fn identity_private_key(&self) -> &SignaturePrivateKey {
        &self.identity_private_key
    }

    pub(crate) fn leaf_private_key(&self) -> &HpkePrivateKey {
        &self.leaf_private_key
    }

    /// Public partition: context, public tree, members, generation
    /// watermarks, own leaf. Readers ignore records they don't know.
    pub fn serialize_public(&self) -> Result<Bytes> {
        let mut writer = RecordWriter::new(PUBLIC_FORMAT_VERSION);
        writer
            .serialized(&self.context)?
            .serialized(&self.tree)?
            .serialized(&Members(self.members.clone()))?
            .serialized(&self.generations)?
            .record(&self.own_leaf.0.to_be_bytes())?;
        Ok(writer.finish())
    }

    /// Secure partition: group id and epoch (to detect mismatched
    /// partitions), epoch secrets, init secret, identity key, leaf key and
    /// path private keys.
    pub fn serialize_secure(&self) -> Result<Bytes> {
        let mut writer = RecordWriter::new(SECURE_FORMAT_VERSION);
        writer
            .serialized(&self.context.group_id)?
            .record(&self.context.epoch.to_be_bytes())?
            .serialized(&self.epoch_secrets)?
            .serialized(&self.init_secret)?
            .serialized(&self.identity_private_key)?
            .serialized(&self.leaf_private_key)?
            .record(&self.tree.serialize_private()?)?;
        Ok(writer.finish())
    }

    /// Rebuilds a snapshot from both partitions. Fails with
    /// [`StorageError::PartitionMismatch`] if they are from different groups
    /// or epochs.
    pub fn restore(public: Bytes, secure: Bytes) -> Result<Self> {
        let mut public = RecordReader::open(public, PUBLIC_FORMAT_VERSION)?;
        let context: GroupContext = public.deserialized("group context")?;
        let mut tree: RatchetTree = public.deserialized("ratchet tree")?;
        let Members(members) = public.deserialized("members")?;
        let generations: GenerationMap = public.deserialized("generations")?;
        let own_leaf = LeafIndex(deserialize_u32(&mut public.record("own leaf")?)?);

        let mut secure = RecordReader::open(secure, SECURE_FORMAT_VERSION)?;
        let group_id: GroupId = secure.deserialized("group id")?;
        let epoch = deserialize_u64(&mut secure.record("epoch")?)?;
        if group_id != context.group_id || epoch != context.epoch {
            return Err(StorageError::PartitionMismatch.into());
        }

        let epoch_secrets: EpochSecrets = secure.deserialized("epoch secrets")?;
        let init_secret: Secret = secure.deserialized("init secret")?;
        let identity_private_key: SignaturePrivateKey = secure.deserialized("identity key")?;
        let leaf_private_key: HpkePrivateKey = secure.deserialized("leaf key")?;
        tree.restore_private(secure.record("path keys")?)?;
        tree.set_leaf_private_key(own_leaf, leaf_private_key.clone())?;

        if members.iter().all(|member| member.leaf_index != own_leaf) {
            return Err(Error::UnknownMember(own_leaf));
        }

        Ok(Self {
            context,
            tree,
            members,
            epoch_secrets,
            init_secret,
            generations,
            own_leaf,
            identity_private_key,
            leaf_private_key,
        })
    }
}
