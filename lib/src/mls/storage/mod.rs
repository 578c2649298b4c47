//! Persistence of group state.
//!
//! A group's state is split in two partitions. Public material (group context,
//! tree, member list, generation watermarks) goes to an ordinary
//! [`PublicStore`]; secrets and private keys only ever go to a
//! [`SecureKeyStore`], typically backed by a platform keystore. Both are
//! injected, so tests and embedders pick their own backends.
//!
//! [`MlsGroup`](crate::mls::group::MlsGroup) only sees [`GroupStorage`];
//! [`PartitionedStorage`] is the implementation that does the split.


pub mod memory;

use bytes::Bytes;

pub use self::memory::{MemoryPublicStore, MemorySecureKeyStore};
use crate::identifiers::GroupId;
use crate::mls::group::state::GroupState;
use crate::mls::utilities::error::{Error, Result};

#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum StorageError {
    #[error("storage backend failed: {0}")]
    Backend(String),
    #[error("storage lock was poisoned")]
    Poisoned,
    #[error("public and secure partitions describe different group states")]
    PartitionMismatch,
}

/// Ordinary key-value storage for data that may be read by anyone with access
/// to the device's disk.
pub trait PublicStore: Send + Sync {
    fn put(&self, key: &str, value: Bytes) -> std::result::Result<(), StorageError>;

    fn get(&self, key: &str) -> std::result::Result<Option<Bytes>, StorageError>;

    fn delete(&self, key: &str) -> std::result::Result<(), StorageError>;
}

/// Storage for secret material.
pub trait SecureKeyStore: Send + Sync {
    fn store_secret(&self, key: &str, value: Bytes) -> std::result::Result<(), StorageError>;

    fn load_secret(&self, key: &str) -> std::result::Result<Option<Bytes>, StorageError>;

    fn delete_secret(&self, key: &str) -> std::result::Result<(), StorageError>;
}

/// What a group needs from its persistence layer.
pub trait GroupStorage: Send + Sync {
    fn save_group_state(&self, state: &GroupState) -> Result<()>;

    /// `None` if no complete state is stored for `group_id`.
    fn load_group_state(&self, group_id: &GroupId) -> Result<Option<GroupState>>;

    fn delete_group_state(&self, group_id: &GroupId) -> Result<()>;

    fn save_group_name(&self, group_id: &GroupId, name: &str) -> Result<()>;

    fn load_group_name(&self, group_id: &GroupId) -> Result<Option<String>>;
}

/// [`GroupStorage`] writing each partition of a [`GroupState`] to its own
/// store, keyed by group id.
#[derive(Debug, Clone, Default)]
pub struct PartitionedStorage<P, K> {
    public_store: P,
    secure_store: K,
}

impl PartitionedStorage<MemoryPublicStore, MemorySecureKeyStore> {
    pub fn in_memory() -> Self {
        Self::new(MemoryPublicStore::default(), MemorySecureKeyStore::default())
    }
}

impl<P: PublicStore, K: SecureKeyStore> PartitionedStorage<P, K> {
    pub fn new(public_store: P, secure_store: K) -> Self {
        Self {
            public_store,
            secure_store,
        }
    }

    pub fn public_store(&self) -> &P {
        &self.public_store
    }

    pub fn secure_store(&self) -> &K {
        &self.secure_store
    }
}

fn state_key(group_id: &GroupId) -> String {
    format!("group/{}/state", group_id.to_base64())
}

fn name_key(group_id: &GroupId) -> String {
    format!("group/{}/name", group_id.to_base64())
}

impl<P: PublicStore, K: SecureKeyStore> GroupStorage for PartitionedStorage<P, K> {
    /// Writes the secure partition first. If the public write then fails, the
    /// two partitions disagree on the epoch and loading fails closed.
    fn save_group_state(&self, state: &GroupState) -> Result<()> {
        let key = state_key(state.group_id());
        let secure = state.serialize_secure()?;
        let public = state.serialize_public()?;

        self.secure_store.store_secret(&key, secure)?;
        self.public_store.put(&key, public)?;

        log::debug!("Saved {} at epoch {}", state.group_id(), state.epoch());
        Ok(())
    }

    fn load_group_state(&self, group_id: &GroupId) -> Result<Option<GroupState>> {
        let key = state_key(group_id);
        let public = self.public_store.get(&key)?;
        let secure = self.secure_store.load_secret(&key)?;

        match (public, secure) {
            (Some(public), Some(secure)) => Ok(Some(GroupState::restore(public, secure)?)),
            (None, None) => Ok(None),
            (public, _) => {
                log::warn!(
                    "Only the {} partition of {group_id} is stored, refusing to load it",
                    if public.is_some() { "public" } else { "secure" }
                );
                Ok(None)
            }
        }
    }

    fn delete_group_state(&self, group_id: &GroupId) -> Result<()> {
        let key = state_key(group_id);
        self.secure_store.delete_secret(&key)?;
        self.public_store.delete(&key)?;
        self.public_store.delete(&name_key(group_id))?;
        Ok(())
    }

    fn save_group_name(&self, group_id: &GroupId, name: &str) -> Result<()> {
        self.public_store
            .put(&name_key(group_id), Bytes::copy_from_slice(name.as_bytes()))?;
        Ok(())
    }

    fn load_group_name(&self, group_id: &GroupId) -> Result<Option<String>> {
        let Some(name) = self.public_store.get(&name_key(group_id))? else {
            return Ok(None);
        };
        let name = String::from_utf8(name.to_vec()).map_err(|_| Error::InvalidUtf8)?;
        Ok(Some(name))
    }
}
