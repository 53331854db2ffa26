//! In-memory [`Store`] implementation.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{
    CollectionRecord, ParticipantRow, RoomRecord, Store, StoreError, StoreResult, UserRecord,
};
use crate::types::{MatchOutcome, RoomId, RoomStatus, UserId};

/// Map-backed store. Seedable with users and collections; room and
/// participant rows are written by the engine at runtime.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, CollectionRecord>>,
    rooms: RwLock<HashMap<RoomId, RoomRecord>>,
    participants: RwLock<HashMap<(RoomId, UserId), ParticipantRow>>,
    users: RwLock<HashMap<UserId, String>>,
}

/// Shape of the optional JSON seed file.
#[derive(Debug, Deserialize)]
struct SeedData {
    #[serde(default)]
    users: Vec<UserRecord>,
    #[serde(default)]
    collections: Vec<CollectionRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, id: &str, nickname: &str) {
        self.users
            .write()
            .await
            .insert(id.to_string(), nickname.to_string());
    }

    pub async fn add_collection(&self, record: CollectionRecord) {
        self.collections
            .write()
            .await
            .insert(record.id.clone(), record);
    }

    /// Load users and collections from a JSON seed file.
    /// Returns (users, collections) counts.
    pub async fn load_seed(&self, path: &Path) -> StoreResult<(usize, usize)> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Seed(format!("{}: {}", path.display(), e)))?;
        let seed: SeedData =
            serde_json::from_str(&raw).map_err(|e| StoreError::Seed(e.to_string()))?;

        let user_count = seed.users.len();
        let collection_count = seed.collections.len();

        {
            let mut users = self.users.write().await;
            for user in seed.users {
                users.insert(user.id, user.nickname);
            }
        }
        {
            let mut collections = self.collections.write().await;
            for collection in seed.collections {
                collections.insert(collection.id.clone(), collection);
            }
        }

        Ok((user_count, collection_count))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn collection_with_items(
        &self,
        id: &str,
        owner: Option<&str>,
    ) -> StoreResult<Option<CollectionRecord>> {
        let collections = self.collections.read().await;
        let record = collections.get(id).cloned();
        Ok(match (record, owner) {
            (Some(r), Some(owner_id)) if r.owner_id != owner_id => None,
            (record, _) => record,
        })
    }

    async fn insert_room(&self, record: RoomRecord) -> StoreResult<()> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&record.id) {
            return Err(StoreError::Duplicate(format!("room {}", record.id)));
        }
        rooms.insert(record.id.clone(), record);
        Ok(())
    }

    async fn room_record(&self, id: &str) -> StoreResult<Option<RoomRecord>> {
        Ok(self.rooms.read().await.get(id).cloned())
    }

    async fn upsert_room_participant(&self, room_id: &str, user_id: &str) -> StoreResult<()> {
        let key = (room_id.to_string(), user_id.to_string());
        self.participants
            .write()
            .await
            .entry(key)
            .or_insert_with(|| ParticipantRow {
                room_id: room_id.to_string(),
                user_id: user_id.to_string(),
                joined_at: Utc::now(),
                finished_at: None,
            });
        Ok(())
    }

    async fn mark_participant_finished(
        &self,
        room_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let key = (room_id.to_string(), user_id.to_string());
        let mut participants = self.participants.write().await;
        participants
            .entry(key)
            .and_modify(|row| row.finished_at = Some(at))
            .or_insert_with(|| ParticipantRow {
                room_id: room_id.to_string(),
                user_id: user_id.to_string(),
                joined_at: at,
                finished_at: Some(at),
            });
        Ok(())
    }

    async fn update_room_status_and_result(
        &self,
        room_id: &str,
        status: RoomStatus,
        result: MatchOutcome,
        closed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| StoreError::MissingRow(format!("room {}", room_id)))?;
        room.status = status;
        room.result = Some(result);
        room.closed_at = Some(closed_at);
        Ok(())
    }

    async fn user_nickname(&self, user_id: &str) -> StoreResult<Option<String>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }
}
