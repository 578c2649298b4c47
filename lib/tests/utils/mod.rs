#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mls_engine::identifiers::{GroupId, UserId};
use mls_engine::mls::crypto::provider::RustCryptoProvider;
use mls_engine::mls::framing::{MlsCiphertext, Welcome};
use mls_engine::mls::storage::{
    GroupStorage, MemoryPublicStore, MemorySecureKeyStore, PartitionedStorage, StorageError,
};
use mls_engine::mls::{CommitBundle, GroupConfig, GroupState, LocalIdentity, MlsGroup, Result};

pub type MemoryStorage = PartitionedStorage<MemoryPublicStore, MemorySecureKeyStore>;
pub type TestGroup = MlsGroup<RustCryptoProvider, MemoryStorage>;

pub fn fake_identity(user: &str) -> LocalIdentity {
    LocalIdentity::generate(UserId::from(user), &RustCryptoProvider::default())
        .expect("identity generation works")
}

pub fn new_group(creator: &LocalIdentity) -> TestGroup {
    MlsGroup::create_group_with_identity(
        creator,
        "The place where friends hang out",
        GroupConfig::default(),
        RustCryptoProvider::default(),
        MemoryStorage::in_memory(),
    )
    .expect("group creation should have succeeded")
}

pub fn join(welcome: &Welcome, identity: &LocalIdentity) -> TestGroup {
    join_with_config(welcome, identity, GroupConfig::default())
}

pub fn join_with_config(
    welcome: &Welcome,
    identity: &LocalIdentity,
    config: GroupConfig,
) -> TestGroup {
    MlsGroup::join_from_welcome(
        welcome,
        identity,
        config,
        RustCryptoProvider::default(),
        MemoryStorage::in_memory(),
    )
    .expect("group should have been joined from welcome")
}

pub fn commit_message(bundle: &CommitBundle) -> &MlsCiphertext {
    bundle
        .commit_message()
        .expect("commit bundle should carry an envelope")
}

/// Applies `bundle` on every member in `members`.
pub fn apply_commit<S: GroupStorage>(
    bundle: &CommitBundle,
    members: &mut [&mut MlsGroup<RustCryptoProvider, S>],
) {
    for member in members.iter_mut() {
        member
            .handle_commit(&bundle.commit, commit_message(bundle))
            .expect("commit should apply");
    }
}

/// Every pair of groups agrees on context, secrets, members and public tree.
pub fn assert_same_epoch<S: GroupStorage>(groups: &[&MlsGroup<RustCryptoProvider, S>]) {
    let first = groups[0].state();
    for group in &groups[1..] {
        let state = group.state();
        assert_eq!(state.context(), first.context(), "group contexts should match");
        assert_eq!(
            state.epoch_secrets(),
            first.epoch_secrets(),
            "epoch secrets should match"
        );
        assert_eq!(state.init_secret(), first.init_secret(), "init secrets should match");
        assert_eq!(state.members(), first.members(), "members should match");
        assert_eq!(
            state.tree().public_only(),
            first.tree().public_only(),
            "public trees should match"
        );
    }
}

/// Storage double whose writes can be switched to fail.
#[derive(Debug, Clone, Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    failing: Arc<AtomicBool>,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self {
            inner: MemoryStorage::in_memory(),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("disk is full".to_owned()).into());
        }
        Ok(())
    }
}

impl GroupStorage for FlakyStorage {
    fn save_group_state(&self, state: &GroupState) -> Result<()> {
        self.check()?;
        self.inner.save_group_state(state)
    }

    fn load_group_state(&self, group_id: &GroupId) -> Result<Option<GroupState>> {
        self.inner.load_group_state(group_id)
    }

    fn delete_group_state(&self, group_id: &GroupId) -> Result<()> {
        self.check()?;
        self.inner.delete_group_state(group_id)
    }

    fn save_group_name(&self, group_id: &GroupId, name: &str) -> Result<()> {
        self.check()?;
        self.inner.save_group_name(group_id, name)
    }

    fn load_group_name(&self, group_id: &GroupId) -> Result<Option<String>> {
        self.inner.load_group_name(group_id)
    }
}
