use std::collections::HashMap;
use std::hash::Hash;
use tokio::sync::RwLock;
use tracing::debug;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("An entry with this key is already stored")]
    DuplicateKey,
    #[error("No entry was found for this key")]
    NotFound,
}

/// Concurrent key/value map shared by the coordinators.
///
/// Every connected client, active match and pending challenge lives in
/// exactly one registry instance; all access goes through it so there is a
/// single source of truth. Single operations are internally synchronized.
/// Multi-step sequences ("check exists, then store") are NOT atomic and
/// callers must re-validate after each step.
pub struct Registry<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Registry<K, V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Stores a value under a key that must not be taken yet.
    pub async fn store(&self, key: K, value: V) -> Result<(), RegistryError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) {
            return Err(RegistryError::DuplicateKey);
        }

        entries.insert(key, value);
        Ok(())
    }

    pub async fn get(&self, key: &K) -> Result<V, RegistryError> {
        let entries = self.entries.read().await;
        entries.get(key).cloned().ok_or(RegistryError::NotFound)
    }

    pub async fn try_get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries.get(key).cloned()
    }

    /// Removes the entry, returning whether it was present.
    pub async fn delete(&self, key: &K) -> bool {
        let mut entries = self.entries.write().await;
        entries.remove(key).is_some()
    }

    pub async fn exists(&self, key: &K) -> bool {
        let entries = self.entries.read().await;
        entries.contains_key(key)
    }

    /// Snapshot of all stored values.
    pub async fn all_values(&self) -> Vec<V> {
        let entries = self.entries.read().await;
        entries.values().cloned().collect()
    }

    /// Snapshot of all stored values except the one under the given key.
    pub async fn all_values_except(&self, except: &K) -> Vec<V> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|(key, _)| *key != except)
            .map(|(_, value)| value.clone())
            .collect()
    }

    /// Snapshot of all stored keys.
    pub async fn all_keys(&self) -> Vec<K> {
        let entries = self.entries.read().await;
        entries.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + PartialEq,
{
    /// Recovers the key under which a value is stored.
    pub async fn key_of(&self, value: &V) -> Result<K, RegistryError> {
        let entries = self.entries.read().await;
        let found = entries
            .iter()
            .find(|(_, stored)| *stored == value)
            .map(|(key, _)| key.clone());

        match found {
            Some(key) => Ok(key),
            None => {
                debug!("Value not associated with any stored key");
                Err(RegistryError::NotFound)
            }
        }
    }
}
