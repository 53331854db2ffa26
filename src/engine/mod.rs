mod deck;
mod drawing;
mod finalize;
mod resolve;
mod vote;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::{EngineError, EngineResult};
use crate::store::{RoomRecord, Store};
use crate::types::*;

/// One participant's swipe position. Owned by the session; only the voting
/// state machine moves the cursor.
#[derive(Debug, Clone)]
pub struct ParticipantState {
    pub cards: Arc<Vec<Card>>,
    /// Index of the next unvoted card.
    pub cursor: usize,
}

/// Live in-memory state for one room's matching round.
///
/// Everything here is guarded by the per-room mutex in [`Engine::rooms`];
/// none of these fields are touched outside that lock.
#[derive(Debug)]
pub struct RoomSession {
    pub room_id: RoomId,
    pub match_mode: MatchMode,
    pub collection_mode: CollectionMode,
    pub participants: HashMap<UserId, ParticipantState>,
    /// Everyone who ever joined, in join order. Never shrinks on leave;
    /// drives combined-deck concatenation and drawing-phase access.
    pub join_order: Vec<UserId>,
    pub nicknames: HashMap<UserId, String>,
    /// Yes votes per card index. Entries survive a voter leaving.
    pub votes_by_index: HashMap<usize, HashSet<UserId>>,
    /// Quorum size. Only ever raised while undecided, frozen at decision.
    pub required_votes: Option<usize>,
    /// False while a COMBINED room waits for its second participant.
    pub ready: bool,
    /// Set at most once. `Some(vec![])` is a decided no-match.
    pub match_result: Option<Vec<Card>>,
    /// The shared deck allocation. Present from construction in SINGLE
    /// rooms, from the ready flip onward in COMBINED rooms.
    pub deck: Option<Arc<Vec<Card>>>,
    pub password_hash: Option<String>,
    pub creator_id: UserId,
    pub creator_collection_id: CollectionId,
    pub topic: Option<String>,
    pub drawings: HashMap<UserId, DrawingState>,
    /// True once the durable close write has succeeded.
    pub finalized: bool,
}

impl RoomSession {
    pub fn new(record: &RoomRecord, deck: Option<Arc<Vec<Card>>>) -> Self {
        Self {
            room_id: record.id.clone(),
            match_mode: record.match_mode,
            collection_mode: record.collection_mode,
            participants: HashMap::new(),
            join_order: Vec::new(),
            nicknames: HashMap::new(),
            votes_by_index: HashMap::new(),
            required_votes: None,
            ready: record.collection_mode == CollectionMode::Single,
            match_result: None,
            deck,
            password_hash: record.password_hash.clone(),
            creator_id: record.creator_id.clone(),
            creator_collection_id: record.creator_collection_id.clone(),
            topic: None,
            drawings: HashMap::new(),
            finalized: false,
        }
    }

    pub fn decided(&self) -> bool {
        self.match_result.is_some()
    }

    /// Whether `user` ever joined this room, including users who left.
    pub fn ever_joined(&self, user_id: &str) -> bool {
        self.join_order.iter().any(|u| u == user_id)
    }

    pub fn nickname(&self, user_id: &str) -> String {
        self.nicknames
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| user_id.to_string())
    }
}

/// What a lookup found for a room id when no hard error applies.
#[derive(Debug)]
pub(crate) enum RoomLookup {
    /// A live session exists; it is the authority.
    Live(Arc<Mutex<RoomSession>>),
    /// No session, but durable storage has the room closed with this outcome.
    Closed(MatchOutcome),
}

/// The room matching engine: a registry of live sessions plus the durable
/// store the outcomes are handed off to.
pub struct Engine {
    /// Registry lock is only held for the map lookup itself; all session
    /// mutation happens under the inner per-room mutex.
    pub(crate) rooms: RwLock<HashMap<RoomId, Arc<Mutex<RoomSession>>>>,
    pub(crate) store: Arc<dyn Store>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Returns the registered session for `room_id`, or registers the one
    /// built by `init`. An existing session is never replaced.
    pub(crate) async fn get_or_create_session(
        &self,
        room_id: &str,
        init: impl FnOnce() -> RoomSession,
    ) -> Arc<Mutex<RoomSession>> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(init())))
            .clone()
    }

    pub(crate) async fn session(&self, room_id: &str) -> Option<Arc<Mutex<RoomSession>>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Resolve a room id for state/vote/drawing calls. The live session wins;
    /// without one the durable record decides between not-found, an already
    /// closed room, and a session lost to a restart.
    pub(crate) async fn lookup_room(&self, room_id: &str) -> EngineResult<RoomLookup> {
        if let Some(session) = self.session(room_id).await {
            return Ok(RoomLookup::Live(session));
        }
        let record = self
            .store
            .room_record(room_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("room {} does not exist", room_id)))?;
        match record.status {
            RoomStatus::Closed => Ok(RoomLookup::Closed(
                record.result.unwrap_or_else(MatchOutcome::no_match),
            )),
            RoomStatus::Open => Err(EngineError::SessionMissing(room_id.to_string())),
        }
    }
}
