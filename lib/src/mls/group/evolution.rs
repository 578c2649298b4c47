//! Commits: changing the membership or the keys of a group.
//!
//! The committer validates its proposals, applies them to a copy of the tree,
//! refreshes its direct path and signs the result. The signed commit travels
//! to existing members inside an envelope sealed with the old epoch's
//! handshake secret, new members get a [`Welcome`] each.
//!
//! Receivers run the same proposal logic on their own copy of the tree, so
//! both sides end up with identical trees, contexts and epoch secrets.

use std::collections::HashSet;

use bytes::{BufMut, Bytes, BytesMut};

use crate::identifiers::GroupId;
use crate::mls::crypto::key_pair::HpkeKeyPair;
use crate::mls::crypto::provider::CryptoProvider;
use crate::mls::crypto::HpkePublicKey;
use crate::mls::crypto::rng::random_array;
use crate::mls::framing::commit::LABEL_COMMIT;
use crate::mls::framing::{
    AddProposal, Commit, ContentType, GroupInfo, GroupSecrets, MlsCiphertext, Proposal,
    RemoveProposal, SignedCommit, UpdateProposal, Welcome,
};
use crate::mls::key_schedule::commit_envelope_key;
use crate::mls::ratchet_tree::RatchetTree;
use crate::mls::storage::GroupStorage;
use crate::mls::utilities::error::{CommitRejection, Error, Result};
use crate::mls::utilities::serde::{Deserializer, Serializer};
use crate::mls::utilities::tree_math::LeafIndex;

use super::state::{GenerationMap, GroupMember, GroupState, GroupStateUpdate};
use super::{CommitBundle, MlsGroup};

const COMMIT_NONCE_SIZE: usize = 12;

/// Tree and member list after a proposal list has been applied.
struct AppliedProposals {
    tree: RatchetTree,
    members: Vec<GroupMember>,
    /// Leaves appended for Add proposals, in proposal order.
    added: Vec<LeafIndex>,
    /// New leaf key announced by an Update proposal.
    updated_key: Option<HpkePublicKey>,
}

/// Checks `proposals` against `state` and applies them to a copy of its tree
/// and member list. Removes are applied before adds.
fn apply_proposals(
    state: &GroupState,
    committer: LeafIndex,
    proposals: &[Proposal],
) -> Result<AppliedProposals> {
    if proposals.is_empty() {
        return Err(Error::EmptyProposalList);
    }

    let mut tree = state.tree().clone();
    let mut members = state.members().to_vec();
    let mut updated_key = None;

    let mut removed = HashSet::new();
    for proposal in proposals {
        match proposal {
            Proposal::Remove(RemoveProposal { removed: leaf }) => {
                if *leaf == committer {
                    return Err(Error::CannotRemoveSelf);
                }
                if state.member(*leaf).is_none() {
                    return Err(Error::UnknownMember(*leaf));
                }
                if !removed.insert(*leaf) {
                    return Err(Error::DuplicateRemoval(*leaf));
                }
                tree.blank_subtree(*leaf);
                members.retain(|member| member.leaf_index != *leaf);
            }
            Proposal::Update(UpdateProposal { hpke_public_key }) => {
                if updated_key.replace(hpke_public_key.clone()).is_some() {
                    return Err(Error::InvalidCommit(CommitRejection::InvalidProposal));
                }
            }
            Proposal::Add(_) => {}
        }
    }

    let mut added = vec![];
    for proposal in proposals {
        let Proposal::Add(AddProposal {
            user_id,
            identity_key,
            hpke_public_key,
        }) = proposal
        else {
            continue;
        };

        if members.iter().any(|member| &member.user_id == user_id) {
            return Err(Error::DuplicateMember(user_id.to_string()));
        }

        let leaf_index = tree.append_leaf(hpke_public_key.clone());
        members.push(GroupMember {
            user_id: user_id.clone(),
            leaf_index,
            identity_key: identity_key.clone(),
            hpke_public_key: hpke_public_key.clone(),
        });
        added.push(leaf_index);
    }

    members.sort_by_key(|member| member.leaf_index);
    Ok(AppliedProposals {
        tree,
        members,
        added,
        updated_key,
    })
}

/// Context the path secrets of a commit are encrypted under: the group and
/// the epoch the commit creates.
fn path_context(group_id: &GroupId, epoch: u64) -> Result<Bytes> {
    let mut context = BytesMut::new();
    group_id.serialize(&mut context)?;
    context.put_u64(epoch);
    Ok(context.freeze())
}

impl<C: CryptoProvider, S: GroupStorage> MlsGroup<C, S> {
    /// Adds members to the group.
    ///
    /// Returns the commit for existing members and one Welcome per new member.
    pub fn add_members(&mut self, add_proposals: Vec<AddProposal>) -> Result<CommitBundle> {
        if add_proposals.is_empty() {
            return Err(Error::EmptyProposalList);
        }

        let proposals = add_proposals.into_iter().map(Proposal::Add).collect();
        self.commit(proposals, None)
    }

    pub fn remove_members(
        &mut self,
        remove_proposals: Vec<RemoveProposal>,
    ) -> Result<CommitBundle> {
        if remove_proposals.is_empty() {
            return Err(Error::EmptyProposalList);
        }

        let proposals = remove_proposals.into_iter().map(Proposal::Remove).collect();
        self.commit(proposals, None)
    }

    /// Generates a fresh leaf key to be committed with [`MlsGroup::update_self`].
    pub fn propose_update(&mut self) -> Result<UpdateProposal> {
        let key_pair = self.crypto_provider.hpke().generate_key_pair()?;
        self.pending_updates
            .insert(key_pair.public_key.clone(), key_pair.private_key);

        Ok(UpdateProposal {
            hpke_public_key: key_pair.public_key,
        })
    }

    /// Commits an Update proposal made by [`MlsGroup::propose_update`],
    /// replacing this member's leaf key and every key on its direct path.
    pub fn update_self(&mut self, update_proposal: UpdateProposal) -> Result<CommitBundle> {
        let private_key = self
            .pending_updates
            .get(&update_proposal.hpke_public_key)
            .cloned()
            .ok_or(Error::UnknownUpdateKey)?;

        let leaf_key_pair = HpkeKeyPair {
            private_key,
            public_key: update_proposal.hpke_public_key.clone(),
        };
        let bundle = self.commit(vec![Proposal::Update(update_proposal)], Some(leaf_key_pair))?;
        self.pending_updates.clear();

        Ok(bundle)
    }

    fn commit(
        &mut self,
        proposals: Vec<Proposal>,
        leaf_key_pair: Option<HpkeKeyPair>,
    ) -> Result<CommitBundle> {
        let own_leaf = self.own_leaf_index();
        let AppliedProposals {
            mut tree,
            mut members,
            added,
            ..
        } = apply_proposals(&self.state, own_leaf, &proposals)?;

        let leaf_key_pair = match leaf_key_pair {
            Some(key_pair) => key_pair,
            None => self
                .crypto_provider
                .hpke()
                .derive_key_pair(&random_array())?,
        };
        let leaf_private_key = leaf_key_pair.private_key.clone();

        let new_epoch = self.epoch() + 1;
        let context = path_context(self.id(), new_epoch)?;
        let path_update = tree.encap(
            &self.crypto_provider,
            own_leaf,
            leaf_key_pair,
            &added,
            &context,
        )?;

        if let Some(member) = members.iter_mut().find(|m| m.leaf_index == own_leaf) {
            member.hpke_public_key = path_update.update_path.leaf_public_key.clone();
        }

        let commit = Commit {
            proposals,
            update_path: Some(path_update.update_path.clone()),
        };
        let to_be_signed = SignedCommit::to_be_signed(self.group_context(), &commit)?;
        let signature = self.crypto_provider.sign_with_label(
            self.state.identity_private_key(),
            LABEL_COMMIT,
            &to_be_signed,
        )?;
        let signed_commit = SignedCommit { commit, signature };

        let envelope = self.seal_commit(&signed_commit, new_epoch)?;
        let next_epoch = self.state.next_epoch(
            &self.crypto_provider,
            &tree,
            &signed_commit,
            &path_update.commit_secret,
        )?;

        let mut welcomes = Vec::with_capacity(added.len());
        if !added.is_empty() {
            let mut group_info = GroupInfo {
                group_context: next_epoch.context.clone(),
                group_name: self.name.clone(),
                tree: tree.public_only(),
                members: members.clone(),
                signer: own_leaf,
                signature: Bytes::new(),
            };
            group_info.sign(&self.crypto_provider, self.state.identity_private_key())?;

            let num_leaves = tree.num_leaves();
            for leaf in &added {
                let Some(member) = members.iter().find(|m| m.leaf_index == *leaf) else {
                    continue;
                };
                let path_secret = num_leaves
                    .common_ancestor_position(own_leaf.node_index(), leaf.node_index())
                    .and_then(|position| path_update.path_secrets.get(position))
                    .cloned();

                let group_secrets = GroupSecrets {
                    init_secret: next_epoch.init_secret.clone(),
                    epoch_secrets: next_epoch.epoch_secrets.clone(),
                    leaf_index: *leaf,
                    path_secret,
                };
                welcomes.push(Welcome::seal(
                    &self.crypto_provider,
                    &member.hpke_public_key,
                    &group_secrets,
                    &group_info,
                )?);
            }
        }

        let next = self.state.clone().copy_with(GroupStateUpdate {
            context: Some(next_epoch.context),
            tree: Some(tree),
            members: Some(members),
            epoch_secrets: Some(next_epoch.epoch_secrets),
            init_secret: Some(next_epoch.init_secret),
            generations: Some(GenerationMap::default()),
            leaf_private_key: Some(leaf_private_key),
        });
        self.install(next)?;

        log::debug!(
            "Committed {} proposal(s) to {}, now at epoch {} with {} member(s)",
            signed_commit.commit.proposals.len(),
            self.id(),
            self.epoch(),
            self.member_count()
        );

        Ok(CommitBundle {
            commit: signed_commit.commit,
            messages: vec![envelope],
            welcomes,
        })
    }

    fn seal_commit(&self, signed_commit: &SignedCommit, new_epoch: u64) -> Result<MlsCiphertext> {
        let own_leaf = self.own_leaf_index();
        let key = commit_envelope_key(
            &self.crypto_provider,
            &self.state.epoch_secrets().handshake_secret,
        )?;
        let nonce = random_array::<COMMIT_NONCE_SIZE>();
        let aad =
            MlsCiphertext::additional_data(self.group_context(), own_leaf, ContentType::Commit)?;
        let ciphertext = self.crypto_provider.aead().seal(
            &key,
            &nonce,
            &signed_commit.serialize_detached()?,
            &aad,
        )?;

        Ok(MlsCiphertext {
            group_id: self.id().clone(),
            epoch: new_epoch,
            sender_index: own_leaf,
            nonce: Bytes::copy_from_slice(&nonce),
            ciphertext,
            content_type: ContentType::Commit,
        })
    }

    /// Applies a commit made by another member, moving the group to the next
    /// epoch.
    ///
    /// `message` is the envelope from the committer's [`CommitBundle`]. On any
    /// error the group stays at its current epoch.
    pub fn handle_commit(&mut self, commit: &Commit, message: &MlsCiphertext) -> Result<()> {
        let next = match self.process_commit(commit, message) {
            Ok(next) => next,
            Err(err) => {
                log::warn!(
                    "Rejected commit from leaf {} for {} at epoch {}: {err}",
                    message.sender_index,
                    self.id(),
                    self.epoch()
                );
                return Err(err);
            }
        };

        self.install(next)?;
        log::debug!(
            "Applied commit from leaf {} to {}, now at epoch {} with {} member(s)",
            message.sender_index,
            self.id(),
            self.epoch(),
            self.member_count()
        );
        Ok(())
    }

    fn process_commit(&self, commit: &Commit, message: &MlsCiphertext) -> Result<GroupState> {
        let cp = &self.crypto_provider;

        if message.group_id != *self.id() {
            return Err(CommitRejection::GroupIdMismatch.into());
        }
        if message.epoch != self.epoch() + 1 {
            return Err(CommitRejection::UnexpectedEpoch {
                current: self.epoch(),
                received: message.epoch,
            }
            .into());
        }
        if message.content_type != ContentType::Commit {
            return Err(CommitRejection::NotACommit.into());
        }

        let committer = message.sender_index;
        let committer_member = self
            .state
            .member(committer)
            .ok_or(CommitRejection::UnknownCommitter(committer))?;

        let key = commit_envelope_key(cp, &self.state.epoch_secrets().handshake_secret)?;
        let aad =
            MlsCiphertext::additional_data(self.group_context(), committer, ContentType::Commit)?;
        let plaintext = cp
            .aead()
            .open(&key, &message.nonce, &message.ciphertext, &aad)
            .map_err(|_| CommitRejection::EnvelopeUndecryptable)?;
        let signed_commit = SignedCommit::deserialize_exact(&plaintext)
            .map_err(|_| CommitRejection::EnvelopeUndecryptable)?;
        if signed_commit.commit != *commit {
            return Err(CommitRejection::EnvelopeMismatch.into());
        }

        let to_be_signed = SignedCommit::to_be_signed(self.group_context(), commit)?;
        if !cp.verify_with_label(
            &committer_member.identity_key,
            LABEL_COMMIT,
            &to_be_signed,
            &signed_commit.signature,
        ) {
            return Err(CommitRejection::BadSignature.into());
        }

        let update_path = commit
            .update_path
            .as_ref()
            .ok_or(CommitRejection::MissingUpdatePath)?;

        let own_leaf = self.own_leaf_index();
        let removes_us = commit.proposals.iter().any(|proposal| {
            matches!(proposal, Proposal::Remove(remove) if remove.removed == own_leaf)
        });
        if removes_us {
            return Err(Error::RemovedFromGroup);
        }

        let AppliedProposals {
            mut tree,
            mut members,
            added,
            updated_key,
        } = apply_proposals(&self.state, committer, &commit.proposals)
            .map_err(|_| CommitRejection::InvalidProposal)?;
        if updated_key.is_some_and(|key| key != update_path.leaf_public_key) {
            return Err(CommitRejection::MalformedUpdatePath.into());
        }

        let context = path_context(self.id(), message.epoch)?;
        let commit_secret = tree.decap(cp, own_leaf, committer, update_path, &added, &context)?;

        if let Some(member) = members.iter_mut().find(|m| m.leaf_index == committer) {
            member.hpke_public_key = update_path.leaf_public_key.clone();
        }

        let next_epoch = self
            .state
            .next_epoch(cp, &tree, &signed_commit, &commit_secret)?;

        Ok(self.state.clone().copy_with(GroupStateUpdate {
            context: Some(next_epoch.context),
            tree: Some(tree),
            members: Some(members),
            epoch_secrets: Some(next_epoch.epoch_secrets),
            init_secret: Some(next_epoch.init_secret),
            generations: Some(GenerationMap::default()),
            leaf_private_key: None,
        }))
    }
}
