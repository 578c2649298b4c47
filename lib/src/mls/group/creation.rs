use bytes::Bytes;

use crate::identifiers::{GroupId, UserId};
use crate::mls::crypto::provider::CryptoProvider;
use crate::mls::crypto::rng::random_secret;
use crate::mls::framing::Welcome;
use crate::mls::key_schedule::{
    derive_epoch_secrets, joiner_secret, next_init_secret, GroupContext, SECRET_SIZE,
};
use crate::mls::ratchet_tree::RatchetTree;
use crate::mls::storage::GroupStorage;
use crate::mls::utilities::error::{Error, Result};
use crate::mls::utilities::tree_math::LeafIndex;

use super::config::GroupConfig;
use super::identity::LocalIdentity;
use super::state::{GroupMember, GroupState};
use super::MlsGroup;

impl<C: CryptoProvider, S: GroupStorage> MlsGroup<C, S> {
    /// Creates a group at epoch 0 whose only member is a freshly generated
    /// identity for `user_id`.
    pub fn create_group(
        user_id: impl Into<UserId>,
        group_name: impl Into<String>,
        crypto_provider: C,
        storage: S,
    ) -> Result<Self> {
        let identity = LocalIdentity::generate(user_id.into(), &crypto_provider)?;
        Self::create_group_with_identity(
            &identity,
            group_name,
            GroupConfig::default(),
            crypto_provider,
            storage,
        )
    }

    pub fn create_group_with_identity(
        identity: &LocalIdentity,
        group_name: impl Into<String>,
        config: GroupConfig,
        crypto_provider: C,
        storage: S,
    ) -> Result<Self> {
        if !crypto_provider.supports(config.cipher_suite()) {
            return Err(Error::UnsupportedCipherSuite);
        }

        let group_id = GroupId::generate();
        let hpke_key_pair = identity.hpke_key_pair();
        let tree = RatchetTree::new(
            hpke_key_pair.public_key.clone(),
            hpke_key_pair.private_key.clone(),
        );

        let creator = GroupMember {
            user_id: identity.user_id().clone(),
            leaf_index: LeafIndex(0),
            identity_key: identity.signature_key_pair().public_key.clone(),
            hpke_public_key: hpke_key_pair.public_key.clone(),
        };

        let context = GroupContext {
            group_id: group_id.clone(),
            epoch: 0,
            tree_hash: tree.tree_hash(&crypto_provider)?,
            confirmed_transcript_hash: Bytes::new(),
            extensions_hash: None,
        };

        // Epoch 0 has no commit: a random init secret and an all-zero commit secret.
        let joiner_secret = joiner_secret(
            &crypto_provider,
            &random_secret(SECRET_SIZE),
            &[0u8; SECRET_SIZE],
        )?;
        let epoch_secrets = derive_epoch_secrets(
            &crypto_provider,
            &joiner_secret,
            &context.hash(&crypto_provider)?,
        )?;
        let init_secret = next_init_secret(&crypto_provider, &epoch_secrets)?;

        let state = GroupState::new(
            context,
            tree,
            vec![creator],
            epoch_secrets,
            init_secret,
            LeafIndex(0),
            identity.signature_key_pair().private_key.clone(),
            hpke_key_pair.private_key.clone(),
        );

        let name = group_name.into();
        storage.save_group_state(&state)?;
        storage.save_group_name(&group_id, &name)?;

        log::info!("Created {group_id} ({name}) for {}", identity.user_id());
        Ok(Self::from_parts(crypto_provider, storage, config, name, state))
    }

    /// Joins the group a [`Welcome`] was sealed for.
    ///
    /// Fails with [`Error::WelcomeNotForUs`] if the Welcome was not sealed to
    /// `identity`'s HPKE key or doesn't place `identity` in the group, and with
    /// [`Error::InvalidWelcome`] if its content is inconsistent.
    pub fn join_from_welcome(
        welcome: &Welcome,
        identity: &LocalIdentity,
        config: GroupConfig,
        crypto_provider: C,
        storage: S,
    ) -> Result<Self> {
        if !crypto_provider.supports(config.cipher_suite()) {
            return Err(Error::UnsupportedCipherSuite);
        }

        let hpke_key_pair = identity.hpke_key_pair();
        let (group_secrets, group_info) =
            welcome.open(&crypto_provider, &hpke_key_pair.private_key)?;

        let context = group_info.group_context.clone();
        if context.group_id != welcome.group_id {
            return Err(Error::InvalidWelcome("group info is for another group"));
        }
        if !group_info.verify(&crypto_provider)? {
            return Err(Error::InvalidWelcome("group info signature does not verify"));
        }
        if group_info.tree.tree_hash(&crypto_provider)? != context.tree_hash {
            return Err(Error::InvalidWelcome("tree does not match the group context"));
        }

        let own_leaf = group_secrets.leaf_index;
        let is_us = group_info.members.iter().any(|member| {
            member.leaf_index == own_leaf
                && &member.user_id == identity.user_id()
                && member.identity_key == identity.signature_key_pair().public_key
                && member.hpke_public_key == hpke_key_pair.public_key
        });
        let leaf_matches = group_info
            .tree
            .get_leaf(own_leaf)
            .is_some_and(|leaf| leaf.public_key == hpke_key_pair.public_key);
        if !is_us || !leaf_matches {
            return Err(Error::WelcomeNotForUs);
        }

        let mut tree = group_info.tree;
        tree.set_leaf_private_key(own_leaf, hpke_key_pair.private_key.clone())?;

        if let Some(path_secret) = group_secrets.path_secret {
            let num_leaves = tree.num_leaves();
            let signer = group_info.signer.node_index();
            let position = num_leaves
                .common_ancestor_position(signer, own_leaf.node_index())
                .ok_or(Error::InvalidWelcome("no common ancestor with the committer"))?;
            let direct_path = num_leaves.direct_path(signer);
            tree.install_path_secrets(&crypto_provider, &direct_path[position..], path_secret)
                .map_err(|_| Error::InvalidWelcome("path secret does not match the tree"))?;
        }

        let state = GroupState::new(
            context,
            tree,
            group_info.members,
            group_secrets.epoch_secrets,
            group_secrets.init_secret,
            own_leaf,
            identity.signature_key_pair().private_key.clone(),
            hpke_key_pair.private_key.clone(),
        );

        let name = group_info.group_name;
        storage.save_group_state(&state)?;
        storage.save_group_name(state.group_id(), &name)?;

        log::info!(
            "{} joined {} ({name}) at epoch {} as leaf {}",
            identity.user_id(),
            state.group_id(),
            state.epoch(),
            own_leaf
        );
        Ok(Self::from_parts(crypto_provider, storage, config, name, state))
    }

    /// Resumes a group from storage. `None` if no complete state is stored.
    pub fn load(
        group_id: &GroupId,
        config: GroupConfig,
        crypto_provider: C,
        storage: S,
    ) -> Result<Option<Self>> {
        let Some(state) = storage.load_group_state(group_id)? else {
            return Ok(None);
        };
        let name = storage.load_group_name(group_id)?.unwrap_or_default();

        log::debug!("Loaded {group_id} at epoch {}", state.epoch());
        Ok(Some(Self::from_parts(crypto_provider, storage, config, name, state)))
    }
}
