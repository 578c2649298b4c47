use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use super::{PublicStore, SecureKeyStore, StorageError};

/// Shared in-memory map. Clones see the same entries.
#[derive(Debug, Clone, Default)]
struct SharedMap(Arc<Mutex<HashMap<String, Bytes>>>);

impl SharedMap {
    fn insert(&self, key: &str, value: Bytes) -> Result<(), StorageError> {
        self.0
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .insert(key.to_owned(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        Ok(self
            .0
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .get(key)
            .cloned())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.0
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .0
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .keys()
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPublicStore(SharedMap);

impl MemoryPublicStore {
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.0.keys()
    }
}

impl PublicStore for MemoryPublicStore {
    fn put(&self, key: &str, value: Bytes) -> Result<(), StorageError> {
        self.0.insert(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        self.0.get(key)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.0.remove(key)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySecureKeyStore(SharedMap);

impl MemorySecureKeyStore {
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.0.keys()
    }
}

impl SecureKeyStore for MemorySecureKeyStore {
    fn store_secret(&self, key: &str, value: Bytes) -> Result<(), StorageError> {
        self.0.insert(key, value)
    }

    fn load_secret(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        self.0.get(key)
    }

    fn delete_secret(&self, key: &str) -> Result<(), StorageError> {
        self.0.remove(key)
    }
}
