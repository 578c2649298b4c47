//! [RFC9420 Sec.7](https://www.rfc-editor.org/rfc/rfc9420.html#section-7) Ratchet Tree Operations
//!
//! The tree is stored as a flat array of nodes indexed with
//! [`tree_math`](crate::mls::utilities::tree_math). Leaves hold member HPKE
//! keys; parents hold keys shared by every member below them, or are blank.
//! Private keys are only present on nodes the local member knows the secret of:
//! its own leaf and the parents on its direct path that have not been blanked.

#[cfg(test)]
mod ratchet_tree_test;

pub mod update_path;

use bytes::{Buf, BufMut, Bytes, BytesMut};

pub use self::update_path::{HpkeCiphertext, UpdatePath, UpdatePathNode};
use crate::mls::crypto::provider::CryptoProvider;
use crate::mls::crypto::{HpkePrivateKey, HpkePublicKey, Secret};
use crate::mls::utilities::error::{CommitRejection, Error, Result};
use crate::mls::utilities::serde::{
    deserialize_optional, deserialize_u32, serialize_optional, Deserializer, Serializer,
};
use crate::mls::utilities::tree_math::{LeafIndex, NodeIndex, NumLeaves};

/// A non-blank node.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct RatchetNode {
    pub public_key: HpkePublicKey,
    pub private_key: Option<HpkePrivateKey>,
    /// Secret the node's key pair was derived from. Only set on parents.
    pub path_secret: Option<Secret>,
}

impl RatchetNode {
    pub fn from_public_key(public_key: HpkePublicKey) -> Self {
        Self {
            public_key,
            private_key: None,
            path_secret: None,
        }
    }
}

#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct RatchetTree {
    nodes: Vec<Option<RatchetNode>>,
}

impl RatchetTree {
    /// A tree holding only the creator's leaf.
    pub fn new(leaf_public_key: HpkePublicKey, leaf_private_key: HpkePrivateKey) -> Self {
        Self {
            nodes: vec![Some(RatchetNode {
                public_key: leaf_public_key,
                private_key: Some(leaf_private_key),
                path_secret: None,
            })],
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn num_leaves(&self) -> NumLeaves {
        NumLeaves(self.nodes.len().div_ceil(2) as u32)
    }

    pub fn get(&self, index: NodeIndex) -> Option<&RatchetNode> {
        self.nodes.get(index.as_usize()).and_then(Option::as_ref)
    }

    pub fn get_leaf(&self, leaf: LeafIndex) -> Option<&RatchetNode> {
        self.get(leaf.node_index())
    }

    pub fn is_blank(&self, index: NodeIndex) -> bool {
        self.get(index).is_none()
    }

    /// Appends a leaf at the right edge of the tree. Blank leaves are never
    /// reused, so leaf indices are stable for the lifetime of a member.
    ///
    /// The new leaf's ancestors are blanked: their keys were shared by a
    /// subtree the new member was not part of.
    pub fn append_leaf(&mut self, public_key: HpkePublicKey) -> LeafIndex {
        if !self.nodes.is_empty() {
            self.nodes.push(None);
        }
        self.nodes.push(Some(RatchetNode::from_public_key(public_key)));

        let leaf = LeafIndex(self.num_leaves().0 - 1);
        self.blank_direct_path(leaf);
        leaf
    }

    /// Replaces the key of `leaf`, dropping whatever private key it had.
    pub fn set_leaf(
        &mut self,
        leaf: LeafIndex,
        public_key: HpkePublicKey,
        private_key: Option<HpkePrivateKey>,
    ) -> Result<()> {
        let slot = self
            .nodes
            .get_mut(leaf.node_index().as_usize())
            .ok_or(Error::UnknownMember(leaf))?;
        *slot = Some(RatchetNode {
            public_key,
            private_key,
            path_secret: None,
        });
        Ok(())
    }

    /// Blanks a removed member's leaf and everything it knew the key of.
    pub fn blank_subtree(&mut self, leaf: LeafIndex) {
        if let Some(slot) = self.nodes.get_mut(leaf.node_index().as_usize()) {
            *slot = None;
        }
        self.blank_direct_path(leaf);
    }

    fn blank_direct_path(&mut self, leaf: LeafIndex) {
        for node in self.num_leaves().direct_path(leaf.node_index()) {
            if let Some(slot) = self.nodes.get_mut(node.as_usize()) {
                *slot = None;
            }
        }
    }

    pub(crate) fn set_node(&mut self, index: NodeIndex, node: RatchetNode) -> Result<()> {
        let slot = self
            .nodes
            .get_mut(index.as_usize())
            .ok_or(Error::InvalidCommit(CommitRejection::MalformedUpdatePath))?;
        *slot = Some(node);
        Ok(())
    }

    /// The non-blank nodes that together cover the subtree under `index`.
    pub fn resolution(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let num_leaves = self.num_leaves();
        if !num_leaves.contains(index) {
            return vec![];
        }
        if !self.is_blank(index) {
            return vec![index];
        }

        match (num_leaves.left(index), num_leaves.right(index)) {
            (Some(left), Some(right)) => {
                let mut resolution = self.resolution(left);
                resolution.extend(self.resolution(right));
                resolution
            }
            _ => vec![],
        }
    }

    /// First entry of `resolution` we hold the private key of.
    pub fn find_owned_in(&self, resolution: &[NodeIndex]) -> Option<(usize, NodeIndex)> {
        resolution.iter().enumerate().find_map(|(i, index)| {
            self.get(*index)
                .and_then(|node| node.private_key.as_ref())
                .map(|_| (i, *index))
        })
    }

    pub fn tree_hash(&self, crypto_provider: &impl CryptoProvider) -> Result<Bytes> {
        let serialized = self.serialize_detached()?;
        Ok(crypto_provider.hash().digest(&serialized))
    }

    /// Owned parent nodes, in the format read by [`RatchetTree::restore_private`].
    /// The leaf private key is not included.
    pub fn serialize_private(&self) -> Result<Bytes> {
        let owned: Vec<(u32, &RatchetNode)> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 2 == 1)
            .filter_map(|(i, node)| {
                let node = node.as_ref()?;
                node.private_key.as_ref()?;
                Some((u32::try_from(i).ok()?, node))
            })
            .collect();

        let mut buf = BytesMut::new();
        let count =
            u32::try_from(owned.len()).map_err(|_| Error::OpaqueSizeExceedsMaximumValueOfU32)?;
        buf.put_u32(count);
        for (index, node) in owned {
            buf.put_u32(index);
            if let Some(private_key) = &node.private_key {
                private_key.serialize(&mut buf)?;
            }
            serialize_optional(node.path_secret.is_some(), &mut buf)?;
            if let Some(path_secret) = &node.path_secret {
                path_secret.serialize(&mut buf)?;
            }
        }
        Ok(buf.freeze())
    }

    /// Puts back private keys written by [`RatchetTree::serialize_private`].
    /// Entries for nodes that are now blank are dropped.
    pub fn restore_private(&mut self, mut buf: impl Buf) -> Result<()> {
        let count = deserialize_u32(&mut buf)?;
        for _ in 0..count {
            let index = NodeIndex(deserialize_u32(&mut buf)?);
            let private_key = HpkePrivateKey::deserialize(&mut buf)?;
            let path_secret = if deserialize_optional(&mut buf)? {
                Some(Secret::deserialize(&mut buf)?)
            } else {
                None
            };

            if let Some(Some(node)) = self.nodes.get_mut(index.as_usize()) {
                node.private_key = Some(private_key);
                node.path_secret = path_secret;
            }
        }

        if buf.has_remaining() {
            return Err(Error::TrailingBytes);
        }
        Ok(())
    }

    pub fn set_leaf_private_key(
        &mut self,
        leaf: LeafIndex,
        private_key: HpkePrivateKey,
    ) -> Result<()> {
        match self.nodes.get_mut(leaf.node_index().as_usize()) {
            Some(Some(node)) => {
                node.private_key = Some(private_key);
                Ok(())
            }
            _ => Err(Error::UnknownMember(leaf)),
        }
    }

    /// Copy without any private material, as shipped to new members.
    pub fn public_only(&self) -> Self {
        Self {
            nodes: self
                .nodes
                .iter()
                .map(|node| {
                    node.as_ref()
                        .map(|node| RatchetNode::from_public_key(node.public_key.clone()))
                })
                .collect(),
        }
    }
}

/// Public part only: node count, then a presence flag and public key per node.
impl Serializer for RatchetTree {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        let count =
            u32::try_from(self.nodes.len()).map_err(|_| Error::OpaqueSizeExceedsMaximumValueOfU32)?;
        buf.put_u32(count);
        for node in &self.nodes {
            serialize_optional(node.is_some(), buf)?;
            if let Some(node) = node {
                node.public_key.serialize(buf)?;
            }
        }
        Ok(())
    }
}

impl Deserializer for RatchetTree {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let count = deserialize_u32(buf)? as usize;
        // Every tree has an odd number of nodes, and each node takes a byte
        if count % 2 == 0 || buf.remaining() < count {
            return Err(Error::MalformedTree);
        }

        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            let node = if deserialize_optional(buf)? {
                Some(RatchetNode::from_public_key(HpkePublicKey::deserialize(buf)?))
            } else {
                None
            };
            nodes.push(node);
        }

        Ok(Self { nodes })
    }
}
