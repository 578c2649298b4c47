//! [RFC9420 Sec.7.4](https://www.rfc-editor.org/rfc/rfc9420.html#section-7.4) Synchronizing Views of
//! the Tree
//!
//! A committer refreshes every key on its direct path from a chain of path
//! secrets and encrypts each secret to the copath subtree that needs it. A
//! receiver decrypts the single secret addressed to a node it owns and derives
//! the rest of the chain up to the root.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{RatchetNode, RatchetTree};
use crate::mls::crypto::key_pair::HpkeKeyPair;
use crate::mls::crypto::provider::CryptoProvider;
use crate::mls::crypto::rng::random_secret;
use crate::mls::crypto::{HpkePublicKey, Secret};
use crate::mls::key_schedule::SECRET_SIZE;
use crate::mls::utilities::error::{CommitRejection, Error, Result};
use crate::mls::utilities::serde::{
    deserialize_opaque_vec, deserialize_vector, serialize_opaque_vec, serialize_vector,
    Deserializer, Serializer,
};
use crate::mls::utilities::tree_math::{LeafIndex, NodeIndex};

pub const LABEL_UPDATE_PATH_NODE: &[u8] = b"UpdatePathNode";
pub const SECRET_LABEL_PATH: &[u8] = b"path";
pub const SECRET_LABEL_NODE: &[u8] = b"node";

#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct HpkeCiphertext {
    pub kem_output: Bytes,
    pub ciphertext: Bytes,
}

impl Deserializer for HpkeCiphertext {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let kem_output = deserialize_opaque_vec(buf)?;
        let ciphertext = deserialize_opaque_vec(buf)?;

        Ok(Self {
            kem_output,
            ciphertext,
        })
    }
}

impl Serializer for HpkeCiphertext {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        serialize_opaque_vec(&self.kem_output, buf)?;
        serialize_opaque_vec(&self.ciphertext, buf)
    }
}

/// New public key of one direct path node, and its path secret encrypted to
/// each node of the matching copath resolution.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct UpdatePathNode {
    pub public_key: HpkePublicKey,
    pub encrypted_path_secrets: Vec<HpkeCiphertext>,
}

impl Deserializer for UpdatePathNode {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let public_key = HpkePublicKey::deserialize(buf)?;

        let mut encrypted_path_secrets = vec![];
        deserialize_vector(buf, |b: &mut Bytes| -> Result<()> {
            encrypted_path_secrets.push(HpkeCiphertext::deserialize(b)?);
            Ok(())
        })?;

        Ok(Self {
            public_key,
            encrypted_path_secrets,
        })
    }
}

impl Serializer for UpdatePathNode {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        self.public_key.serialize(buf)?;
        serialize_vector(
            self.encrypted_path_secrets.len(),
            buf,
            |i: usize, b: &mut BytesMut| -> Result<()> {
                self.encrypted_path_secrets[i].serialize(b)
            },
        )
    }
}

#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct UpdatePath {
    pub leaf_public_key: HpkePublicKey,
    pub nodes: Vec<UpdatePathNode>,
}

impl Deserializer for UpdatePath {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let leaf_public_key = HpkePublicKey::deserialize(buf)?;

        let mut nodes = vec![];
        deserialize_vector(buf, |b: &mut Bytes| -> Result<()> {
            nodes.push(UpdatePathNode::deserialize(b)?);
            Ok(())
        })?;

        Ok(Self {
            leaf_public_key,
            nodes,
        })
    }
}

impl Serializer for UpdatePath {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut,
    {
        self.leaf_public_key.serialize(buf)?;
        serialize_vector(
            self.nodes.len(),
            buf,
            |i: usize, b: &mut BytesMut| -> Result<()> { self.nodes[i].serialize(b) },
        )
    }
}

/// What the committer learns from refreshing its path.
#[derive(Debug, Clone)]
pub struct PathUpdate {
    pub update_path: UpdatePath,
    /// Path secret of every direct path node, bottom-up.
    pub path_secrets: Vec<Secret>,
    pub commit_secret: Secret,
}

fn derive_node_key_pair(
    crypto_provider: &impl CryptoProvider,
    path_secret: &[u8],
) -> Result<HpkeKeyPair> {
    let node_secret = crypto_provider.derive_secret(path_secret, SECRET_LABEL_NODE)?;
    let seed: [u8; 32] = node_secret[..]
        .try_into()
        .map_err(|_| Error::InvalidKeyLength)?;
    crypto_provider.hpke().derive_key_pair(&seed)
}

fn derive_commit_secret(
    crypto_provider: &impl CryptoProvider,
    root_path_secret: Option<&Secret>,
) -> Result<Secret> {
    match root_path_secret {
        Some(path_secret) => Ok(crypto_provider
            .derive_secret(path_secret, SECRET_LABEL_PATH)?
            .into()),
        None => Ok(random_secret(SECRET_SIZE)),
    }
}

impl RatchetTree {
    /// Replaces the committer's leaf key and every key on its direct path, and
    /// encrypts the new path secrets to the copath.
    ///
    /// Leaves in `excluded` (members added by the same commit) get nothing:
    /// they learn their secret from their Welcome.
    pub fn encap(
        &mut self,
        crypto_provider: &impl CryptoProvider,
        committer: LeafIndex,
        leaf_key_pair: HpkeKeyPair,
        excluded: &[LeafIndex],
        context: &[u8],
    ) -> Result<PathUpdate> {
        let num_leaves = self.num_leaves();
        let leaf_node = committer.node_index();
        let direct_path = num_leaves.direct_path(leaf_node);
        let copath = num_leaves.copath(leaf_node);

        let leaf_public_key = leaf_key_pair.public_key.clone();
        self.set_leaf(
            committer,
            leaf_key_pair.public_key,
            Some(leaf_key_pair.private_key),
        )?;

        let mut path_secrets: Vec<Secret> = Vec::with_capacity(direct_path.len());
        for node in &direct_path {
            let path_secret = match path_secrets.last() {
                Some(previous) => crypto_provider
                    .derive_secret(previous, SECRET_LABEL_PATH)?
                    .into(),
                None => random_secret(SECRET_SIZE),
            };

            let key_pair = derive_node_key_pair(crypto_provider, &path_secret)?;
            self.set_node(
                *node,
                RatchetNode {
                    public_key: key_pair.public_key,
                    private_key: Some(key_pair.private_key),
                    path_secret: Some(path_secret.clone()),
                },
            )?;
            path_secrets.push(path_secret);
        }

        let mut nodes = Vec::with_capacity(direct_path.len());
        for ((node, copath_node), path_secret) in
            direct_path.iter().zip(&copath).zip(&path_secrets)
        {
            let mut encrypted_path_secrets = vec![];
            for recipient in self.filtered_resolution(*copath_node, excluded) {
                let recipient_key = &self
                    .get(recipient)
                    .ok_or(Error::MalformedTree)?
                    .public_key;
                let (kem_output, ciphertext) = crypto_provider.encrypt_with_label(
                    recipient_key,
                    LABEL_UPDATE_PATH_NODE,
                    context,
                    path_secret,
                )?;
                encrypted_path_secrets.push(HpkeCiphertext {
                    kem_output,
                    ciphertext,
                });
            }

            let public_key = self.get(*node).ok_or(Error::MalformedTree)?.public_key.clone();
            nodes.push(UpdatePathNode {
                public_key,
                encrypted_path_secrets,
            });
        }

        let commit_secret = derive_commit_secret(crypto_provider, path_secrets.last())?;

        Ok(PathUpdate {
            update_path: UpdatePath {
                leaf_public_key,
                nodes,
            },
            path_secrets,
            commit_secret,
        })
    }

    /// Applies a committer's update path from the point of view of `own_leaf`
    /// and returns the commit secret.
    ///
    /// `excluded` must be the same list the committer used, and the tree must
    /// already reflect the commit's proposals.
    pub fn decap(
        &mut self,
        crypto_provider: &impl CryptoProvider,
        own_leaf: LeafIndex,
        committer: LeafIndex,
        update_path: &UpdatePath,
        excluded: &[LeafIndex],
        context: &[u8],
    ) -> Result<Secret> {
        let num_leaves = self.num_leaves();
        let leaf_node = committer.node_index();
        let direct_path = num_leaves.direct_path(leaf_node);
        let copath = num_leaves.copath(leaf_node);

        if update_path.nodes.len() != direct_path.len() {
            return Err(CommitRejection::MalformedUpdatePath.into());
        }

        let position = num_leaves
            .common_ancestor_position(leaf_node, own_leaf.node_index())
            .ok_or(CommitRejection::MalformedUpdatePath)?;

        let resolution = self.filtered_resolution(copath[position], excluded);
        let encrypted = &update_path.nodes[position].encrypted_path_secrets;
        if encrypted.len() != resolution.len() {
            return Err(CommitRejection::MalformedUpdatePath.into());
        }

        let (slot, owned) = self
            .find_owned_in(&resolution)
            .ok_or(CommitRejection::NoDecryptablePathSecret)?;
        let private_key = self
            .get(owned)
            .and_then(|node| node.private_key.clone())
            .ok_or(CommitRejection::NoDecryptablePathSecret)?;

        let path_secret: Secret = crypto_provider
            .decrypt_with_label(
                &private_key,
                LABEL_UPDATE_PATH_NODE,
                context,
                &encrypted[slot].kem_output,
                &encrypted[slot].ciphertext,
            )
            .map_err(|_| CommitRejection::NoDecryptablePathSecret)?
            .into();

        self.set_leaf(committer, update_path.leaf_public_key.clone(), None)?;
        for (node, path_node) in direct_path.iter().zip(&update_path.nodes) {
            self.set_node(*node, RatchetNode::from_public_key(path_node.public_key.clone()))?;
        }

        let root_path_secret =
            self.install_path_secrets(crypto_provider, &direct_path[position..], path_secret)?;
        derive_commit_secret(crypto_provider, Some(&root_path_secret))
    }

    /// Derives the chain of path secrets starting at `path[0]` and checks each
    /// derived key against the public key already in the tree before taking
    /// ownership of the node. Returns the last path secret.
    pub fn install_path_secrets(
        &mut self,
        crypto_provider: &impl CryptoProvider,
        path: &[NodeIndex],
        first_path_secret: Secret,
    ) -> Result<Secret> {
        let mut path_secret = first_path_secret;
        for (i, node) in path.iter().enumerate() {
            if i > 0 {
                path_secret = crypto_provider
                    .derive_secret(&path_secret, SECRET_LABEL_PATH)?
                    .into();
            }

            let key_pair = derive_node_key_pair(crypto_provider, &path_secret)?;
            let expected = self.get(*node).map(|node| &node.public_key);
            if expected != Some(&key_pair.public_key) {
                return Err(CommitRejection::MalformedUpdatePath.into());
            }

            self.set_node(
                *node,
                RatchetNode {
                    public_key: key_pair.public_key,
                    private_key: Some(key_pair.private_key),
                    path_secret: Some(path_secret.clone()),
                },
            )?;
        }
        Ok(path_secret)
    }

    fn filtered_resolution(&self, index: NodeIndex, excluded: &[LeafIndex]) -> Vec<NodeIndex> {
        self.resolution(index)
            .into_iter()
            .filter(|node| {
                node.leaf_index()
                    .map_or(true, |leaf| !excluded.contains(&leaf))
            })
            .collect()
    }
}
