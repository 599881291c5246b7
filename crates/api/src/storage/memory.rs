//! In-process chat store
//!
//! Used when no database is configured and throughout the tests. Data lives
//! as long as the process does.

use async_trait::async_trait;
use huntroom_shared::ChatMessage;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use super::{ChatStore, StorageError};

#[derive(Default)]
pub struct MemoryChatStore {
    logs: RwLock<HashMap<String, BTreeMap<String, ChatMessage>>>,
    alarms: RwLock<HashMap<String, i64>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("memory store lock poisoned".to_string())
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn append(&self, room: &str, key: &str, message: &ChatMessage) -> Result<(), StorageError> {
        let mut logs = self.logs.write().map_err(|_| poisoned())?;
        logs.entry(room.to_string())
            .or_default()
            .insert(key.to_string(), message.clone());
        Ok(())
    }

    async fn load_log(&self, room: &str) -> Result<Vec<ChatMessage>, StorageError> {
        let logs = self.logs.read().map_err(|_| poisoned())?;
        Ok(logs
            .get(room)
            .map(|log| log.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn last_key(&self, room: &str) -> Result<Option<String>, StorageError> {
        let logs = self.logs.read().map_err(|_| poisoned())?;
        Ok(logs
            .get(room)
            .and_then(|log| log.keys().next_back().cloned()))
    }

    async fn delete_log(&self, room: &str) -> Result<u64, StorageError> {
        let mut logs = self.logs.write().map_err(|_| poisoned())?;
        Ok(logs.remove(room).map(|log| log.len() as u64).unwrap_or(0))
    }

    async fn set_alarm(&self, room: &str, fire_at_ms: i64) -> Result<(), StorageError> {
        let mut alarms = self.alarms.write().map_err(|_| poisoned())?;
        alarms.insert(room.to_string(), fire_at_ms);
        Ok(())
    }

    async fn alarm(&self, room: &str) -> Result<Option<i64>, StorageError> {
        let alarms = self.alarms.read().map_err(|_| poisoned())?;
        Ok(alarms.get(room).copied())
    }

    async fn clear_alarm(&self, room: &str) -> Result<(), StorageError> {
        let mut alarms = self.alarms.write().map_err(|_| poisoned())?;
        alarms.remove(room);
        Ok(())
    }

    async fn due_alarms(&self, now_ms: i64) -> Result<Vec<String>, StorageError> {
        let alarms = self.alarms.read().map_err(|_| poisoned())?;
        let mut due: Vec<String> = alarms
            .iter()
            .filter(|(_, fire_at)| **fire_at <= now_ms)
            .map(|(room, _)| room.clone())
            .collect();
        due.sort();
        Ok(due)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
