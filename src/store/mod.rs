//! Persistence collaborator.
//!
//! The engine never talks to a database directly; it consumes this trait.
//! Production would back it with the relational store, the bundled
//! [`MemoryStore`] backs the binary and the tests.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CollectionId, MatchOutcome, RoomId, RoomStatus, UserId};
use crate::types::{CollectionMode, MatchMode};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no such row: {0}")]
    MissingRow(String),

    #[error("row already exists: {0}")]
    Duplicate(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("seed file error: {0}")]
    Seed(String),
}

/// One item of a collection, as stored. Becomes a `Card` at deck assembly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A collection with its items, in creation order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionRecord {
    pub id: CollectionId,
    pub owner_id: UserId,
    pub owner_nickname: String,
    pub title: String,
    pub items: Vec<CollectionItem>,
}

/// The durable row for a room. Carries enough of the creation-time defaults
/// to rebuild a session after a process restart (the reconnect path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRecord {
    pub id: RoomId,
    pub name: String,
    pub status: RoomStatus,
    pub match_mode: MatchMode,
    pub collection_mode: CollectionMode,
    pub creator_id: UserId,
    pub creator_collection_id: CollectionId,
    pub password_hash: Option<String>,
    pub result: Option<MatchOutcome>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Durable participation row, one per (room, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantRow {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub id: UserId,
    pub nickname: String,
}

/// Operations the engine needs from durable storage.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch a collection with its items. With `owner` set, a collection
    /// belonging to someone else reads as absent; the engine passes `None`
    /// and checks ownership itself to tell NOT_FOUND from NOT_ALLOWED.
    async fn collection_with_items(
        &self,
        id: &str,
        owner: Option<&str>,
    ) -> StoreResult<Option<CollectionRecord>>;

    /// Create the durable room row. Fails with `Duplicate` if the id exists.
    async fn insert_room(&self, record: RoomRecord) -> StoreResult<()>;

    async fn room_record(&self, id: &str) -> StoreResult<Option<RoomRecord>>;

    /// Record that a user participates in a room. Idempotent.
    async fn upsert_room_participant(&self, room_id: &str, user_id: &str) -> StoreResult<()>;

    /// Stamp the end of a user's participation (left the room or swiped the
    /// whole deck). Creates the row if the upsert never happened.
    async fn mark_participant_finished(
        &self,
        room_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// The single finalize write: status, outcome payload and close time in
    /// one update.
    async fn update_room_status_and_result(
        &self,
        room_id: &str,
        status: RoomStatus,
        result: MatchOutcome,
        closed_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn user_nickname(&self, user_id: &str) -> StoreResult<Option<String>>;
}
