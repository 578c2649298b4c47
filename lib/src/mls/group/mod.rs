//! [RFC9420 Sec.11](https://www.rfc-editor.org/rfc/rfc9420.html#section-11) Group Creation and
//! [RFC9420 Sec.12](https://www.rfc-editor.org/rfc/rfc9420.html#section-12) Group Evolution
//!
//! A group is always created with a single member, the "creator". Other members are then added to
//! the group using the usual Add/Commit mechanism.
//!
//! Over the lifetime of a group, its membership can change, and existing members might want to
//! change their keys in order to achieve post-compromise security.
//!
//! Every state-changing method takes `&mut self`: an [`MlsGroup`] is a single-writer state machine,
//! and each transition is persisted before it becomes visible.

use std::collections::HashMap;

use crate::identifiers::{GroupId, UserId};
use crate::mls::crypto::provider::CryptoProvider;
use crate::mls::crypto::{HpkePrivateKey, HpkePublicKey};
use crate::mls::framing::{Commit, MlsCiphertext, Welcome};
use crate::mls::key_schedule::GroupContext;
use crate::mls::storage::GroupStorage;
use crate::mls::utilities::error::Result;
use crate::mls::utilities::tree_math::LeafIndex;

use self::config::GroupConfig;
use self::state::{GroupMember, GroupState};

#[cfg(test)]
mod group_test;

pub mod config;
pub mod creation;
pub mod evolution;
pub mod identity;
pub mod messaging;
pub mod state;
pub mod transcript;

/// Output of a commit: the commit itself, the envelope existing members feed
/// to [`MlsGroup::handle_commit`], and one Welcome per added member.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommitBundle {
    pub commit: Commit,
    pub messages: Vec<MlsCiphertext>,
    pub welcomes: Vec<Welcome>,
}

impl CommitBundle {
    /// The envelope for existing members. Every bundle carries exactly one.
    pub fn commit_message(&self) -> Option<&MlsCiphertext> {
        self.messages.first()
    }
}

pub struct MlsGroup<C: CryptoProvider, S: GroupStorage> {
    crypto_provider: C,
    storage: S,
    config: GroupConfig,
    name: String,
    state: GroupState,
    /// Leaf keys handed out by `propose_update` and not committed yet.
    pending_updates: HashMap<HpkePublicKey, HpkePrivateKey>,
}

impl<C: CryptoProvider, S: GroupStorage> std::fmt::Debug for MlsGroup<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MlsGroup")
            .field("id", self.id())
            .field("name", &self.name)
            .field("epoch", &self.epoch())
            .field("own_leaf", &self.own_leaf_index())
            .field("members", &self.member_count())
            .finish_non_exhaustive()
    }
}

impl<C: CryptoProvider, S: GroupStorage> MlsGroup<C, S> {
    fn from_parts(
        crypto_provider: C,
        storage: S,
        config: GroupConfig,
        name: String,
        state: GroupState,
    ) -> Self {
        Self {
            crypto_provider,
            storage,
            config,
            name,
            state,
            pending_updates: HashMap::new(),
        }
    }

    /// Persists `next` and makes it the current state. On failure the group
    /// stays at its previous state.
    fn install(&mut self, next: GroupState) -> Result<()> {
        if let Err(err) = self.storage.save_group_state(&next) {
            log::warn!(
                "Could not persist {} at epoch {}, staying at epoch {}: {err}",
                self.id(),
                next.epoch(),
                self.epoch()
            );
            return Err(err);
        }

        self.state = next;
        Ok(())
    }

    pub fn id(&self) -> &GroupId {
        self.state.group_id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn epoch(&self) -> u64 {
        self.state.epoch()
    }

    pub fn member_count(&self) -> usize {
        self.state.members().len()
    }

    pub fn members(&self) -> &[GroupMember] {
        self.state.members()
    }

    pub fn member_by_user_id(&self, user_id: &UserId) -> Option<&GroupMember> {
        self.state.member_by_user_id(user_id)
    }

    pub fn own_leaf_index(&self) -> LeafIndex {
        self.state.own_leaf()
    }

    pub fn group_context(&self) -> &GroupContext {
        self.state.context()
    }

    pub fn state(&self) -> &GroupState {
        &self.state
    }

    pub fn config(&self) -> &GroupConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}
