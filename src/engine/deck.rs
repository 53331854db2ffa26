use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::engine::{Engine, ParticipantState, RoomSession};
use crate::error::{EngineError, EngineResult};
use crate::password::{hash_password, verify_password};
use crate::store::{CollectionRecord, RoomRecord};
use crate::types::*;

/// Map a collection's items to cards, 1:1 in stored order.
pub(crate) fn cards_from_collection(collection: &CollectionRecord) -> Vec<Card> {
    collection
        .items
        .iter()
        .map(|item| Card {
            id: item.id.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            image_url: item.image_url.clone(),
            owner_nickname: collection.owner_nickname.clone(),
        })
        .collect()
}

impl RoomSession {
    /// Attach `user` with a fresh cursor. Rejoining after a leave starts
    /// over; join order and nickname memory survive across leaves.
    pub(crate) fn attach(&mut self, user_id: &str, nickname: String, cards: Arc<Vec<Card>>) {
        self.participants
            .insert(user_id.to_string(), ParticipantState { cards, cursor: 0 });
        if !self.ever_joined(user_id) {
            self.join_order.push(user_id.to_string());
        }
        self.nicknames.insert(user_id.to_string(), nickname);
    }

    /// Flip a COMBINED room to ready: concatenate the personal decks of all
    /// current participants in join order and point everyone at the shared
    /// result with cursors reset.
    fn freeze_combined_deck(&mut self) {
        let mut combined = Vec::new();
        for user_id in &self.join_order {
            if let Some(p) = self.participants.get(user_id) {
                combined.extend(p.cards.iter().cloned());
            }
        }
        let shared = Arc::new(combined);
        for p in self.participants.values_mut() {
            p.cards = shared.clone();
            p.cursor = 0;
        }
        self.deck = Some(shared);
        self.ready = true;
    }

    /// Grow an already frozen combined deck. Card indices of the existing
    /// deck are stable, so in-flight cursors keep their positions.
    fn append_to_combined_deck(&mut self, cards: Vec<Card>) -> Arc<Vec<Card>> {
        let mut grown: Vec<Card> = match self.deck.as_ref() {
            Some(deck) => deck.iter().cloned().collect(),
            None => Vec::new(),
        };
        grown.extend(cards);
        let shared = Arc::new(grown);
        for p in self.participants.values_mut() {
            p.cards = shared.clone();
        }
        self.deck = Some(shared.clone());
        shared
    }
}

impl Engine {
    /// Create a room and register its live session. The creator is not
    /// attached here; they connect like every other participant.
    pub async fn create_room(
        &self,
        creator_id: &str,
        name: &str,
        match_mode: MatchMode,
        collection_mode: CollectionMode,
        password: Option<&str>,
        collection_id: &str,
    ) -> EngineResult<RoomId> {
        let creator_id = creator_id.trim();
        let name = name.trim();
        let collection_id = collection_id.trim();
        if creator_id.is_empty() {
            return Err(EngineError::Validation(
                "user id must not be empty".to_string(),
            ));
        }
        if name.is_empty() {
            return Err(EngineError::Validation(
                "room name must not be empty".to_string(),
            ));
        }
        if collection_id.is_empty() {
            return Err(EngineError::Validation(
                "collection id must not be empty".to_string(),
            ));
        }

        // Ownership is checked before anything is written or registered
        let collection = self.owned_collection(collection_id, creator_id).await?;

        let record = RoomRecord {
            id: ulid::Ulid::new().to_string(),
            name: name.to_string(),
            status: RoomStatus::Open,
            match_mode,
            collection_mode,
            creator_id: creator_id.to_string(),
            creator_collection_id: collection_id.to_string(),
            password_hash: password
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(hash_password),
            result: None,
            created_at: Utc::now(),
            closed_at: None,
        };
        self.store.insert_room(record.clone()).await?;

        let deck = match collection_mode {
            CollectionMode::Single => Some(Arc::new(cards_from_collection(&collection))),
            CollectionMode::Combined => None,
        };
        let room_id = record.id.clone();
        self.get_or_create_session(&room_id, || RoomSession::new(&record, deck))
            .await;

        tracing::info!(
            "Created room {} ({:?}/{:?}, collection {})",
            room_id,
            match_mode,
            collection_mode,
            collection_id
        );
        Ok(room_id)
    }

    /// Connect `user` to a room and build their deck per the room's
    /// collection mode. Reconnecting while attached is a no-op.
    pub async fn connect_to_room(
        &self,
        user_id: &str,
        room_id: &str,
        password: Option<&str>,
        collection_ref: Option<&str>,
    ) -> EngineResult<RoomId> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(EngineError::Validation(
                "user id must not be empty".to_string(),
            ));
        }

        let session = match self.session(room_id).await {
            Some(session) => session,
            None => self.revive_session(room_id).await?,
        };
        let mut session = session.lock().await;

        if !verify_password(session.password_hash.as_deref(), password) {
            return Err(EngineError::NotAllowed("wrong room password".to_string()));
        }
        if session.decided() {
            return Err(EngineError::NotAllowed(format!(
                "room {} is already closed",
                room_id
            )));
        }
        if session.participants.contains_key(user_id) {
            // Already attached; keep their cursor where it is
            return Ok(room_id.to_string());
        }

        let nickname = match self.store.user_nickname(user_id).await? {
            Some(nickname) => nickname,
            None => petname::petname(2, "-").unwrap_or_else(|| user_id.to_string()),
        };

        match session.collection_mode {
            CollectionMode::Single => {
                let deck = match session.deck.clone() {
                    Some(deck) => deck,
                    None => return Err(EngineError::SessionMissing(room_id.to_string())),
                };
                self.store.upsert_room_participant(room_id, user_id).await?;
                session.attach(user_id, nickname, deck);
            }
            CollectionMode::Combined => {
                let collection_id = collection_ref
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .or_else(|| {
                        // The creator falls back to the collection the room
                        // was created with
                        if user_id == session.creator_id {
                            Some(session.creator_collection_id.clone())
                        } else {
                            None
                        }
                    })
                    .ok_or_else(|| {
                        EngineError::Validation(
                            "a collection id is required to join a combined room".to_string(),
                        )
                    })?;
                let collection = self.owned_collection(&collection_id, user_id).await?;
                let cards = cards_from_collection(&collection);

                self.store.upsert_room_participant(room_id, user_id).await?;
                if session.ready {
                    let shared = session.append_to_combined_deck(cards);
                    session.attach(user_id, nickname, shared);
                } else {
                    session.attach(user_id, nickname, Arc::new(cards));
                    if session.participants.len() >= 2 {
                        session.freeze_combined_deck();
                        tracing::info!(
                            "Room {} combined deck frozen at {} cards",
                            room_id,
                            session.deck.as_ref().map(|d| d.len()).unwrap_or(0)
                        );
                    }
                }
            }
        }

        tracing::debug!("User {} connected to room {}", user_id, room_id);
        Ok(room_id.to_string())
    }

    /// Rebuild a session for a room the durable store says is still open.
    /// Covers reconnects after a restart; voting state is gone, only the
    /// room's configuration survives.
    async fn revive_session(&self, room_id: &str) -> EngineResult<Arc<Mutex<RoomSession>>> {
        let record = self
            .store
            .room_record(room_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("room {} does not exist", room_id)))?;
        if record.status == RoomStatus::Closed {
            return Err(EngineError::NotAllowed(format!(
                "room {} is already closed",
                room_id
            )));
        }
        let deck = match record.collection_mode {
            CollectionMode::Single => {
                let collection = self
                    .store
                    .collection_with_items(&record.creator_collection_id, None)
                    .await?
                    .ok_or_else(|| {
                        EngineError::NotFound(format!(
                            "collection {} does not exist",
                            record.creator_collection_id
                        ))
                    })?;
                Some(Arc::new(cards_from_collection(&collection)))
            }
            CollectionMode::Combined => None,
        };
        tracing::info!("Rebuilt session for open room {} from its record", room_id);
        Ok(self
            .get_or_create_session(room_id, || RoomSession::new(&record, deck))
            .await)
    }

    /// Fetch a collection and insist the caller owns it. A missing id and a
    /// foreign owner are reported as distinct failures.
    pub(crate) async fn owned_collection(
        &self,
        collection_id: &str,
        user_id: &str,
    ) -> EngineResult<CollectionRecord> {
        let collection = self
            .store
            .collection_with_items(collection_id, None)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("collection {} does not exist", collection_id))
            })?;
        if collection.owner_id != user_id {
            return Err(EngineError::NotAllowed(format!(
                "collection {} belongs to another user",
                collection_id
            )));
        }
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CollectionItem, MemoryStore, Store};

    fn collection(id: &str, owner: &str, items: usize) -> CollectionRecord {
        CollectionRecord {
            id: id.to_string(),
            owner_id: owner.to_string(),
            owner_nickname: format!("owner-{}", owner),
            title: format!("collection {}", id),
            items: (0..items)
                .map(|i| CollectionItem {
                    id: format!("{}-item{}", id, i),
                    title: format!("{} item {}", id, i),
                    description: Some("worth a look".to_string()),
                    image_url: None,
                })
                .collect(),
        }
    }

    async fn seeded_engine() -> (Engine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.add_user("u1", "ada").await;
        store.add_user("u2", "grace").await;
        store.add_collection(collection("c1", "u1", 2)).await;
        store.add_collection(collection("c2", "u2", 1)).await;
        store.add_collection(collection("c3", "u3", 1)).await;
        (Engine::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_create_single_room_builds_shared_deck() {
        let (engine, store) = seeded_engine().await;
        let room_id = engine
            .create_room(
                "u1",
                "friday lunch",
                MatchMode::FirstMatch,
                CollectionMode::Single,
                None,
                "c1",
            )
            .await
            .unwrap();

        let record = store.room_record(&room_id).await.unwrap().unwrap();
        assert_eq!(record.status, RoomStatus::Open);
        assert_eq!(record.creator_collection_id, "c1");

        let session = engine.session(&room_id).await.unwrap();
        let session = session.lock().await;
        assert!(session.ready);
        assert!(session.participants.is_empty());
        let deck = session.deck.as_ref().unwrap();
        assert_eq!(deck.len(), 2);
        assert_eq!(deck[0].id, "c1-item0");
        assert_eq!(deck[0].owner_nickname, "owner-u1");
    }

    #[tokio::test]
    async fn test_create_room_validates_collection_first() {
        let (engine, _) = seeded_engine().await;

        let err = engine
            .create_room(
                "u1",
                "bad",
                MatchMode::FirstMatch,
                CollectionMode::Single,
                None,
                "missing",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));

        // c2 belongs to u2
        let err = engine
            .create_room(
                "u1",
                "bad",
                MatchMode::FirstMatch,
                CollectionMode::Single,
                None,
                "c2",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotAllowed(_)));

        let err = engine
            .create_room(
                "u1",
                "   ",
                MatchMode::FirstMatch,
                CollectionMode::Single,
                None,
                "c1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_single_participants_share_one_deck_allocation() {
        let (engine, _) = seeded_engine().await;
        let room_id = engine
            .create_room(
                "u1",
                "friday lunch",
                MatchMode::FirstMatch,
                CollectionMode::Single,
                None,
                "c1",
            )
            .await
            .unwrap();

        engine.connect_to_room("u1", &room_id, None, None).await.unwrap();
        engine.connect_to_room("u2", &room_id, None, None).await.unwrap();

        let session = engine.session(&room_id).await.unwrap();
        let session = session.lock().await;
        let a = &session.participants["u1"];
        let b = &session.participants["u2"];
        assert!(Arc::ptr_eq(&a.cards, &b.cards));
        assert_eq!(a.cursor, 0);
        assert_eq!(session.nicknames["u1"], "ada");
        assert_eq!(session.join_order, vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn test_room_password_is_enforced() {
        let (engine, _) = seeded_engine().await;
        let room_id = engine
            .create_room(
                "u1",
                "secret club",
                MatchMode::FirstMatch,
                CollectionMode::Single,
                Some("swordfish"),
                "c1",
            )
            .await
            .unwrap();

        let err = engine
            .connect_to_room("u2", &room_id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotAllowed(_)));

        let err = engine
            .connect_to_room("u2", &room_id, Some("guppy"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotAllowed(_)));

        engine
            .connect_to_room("u2", &room_id, Some("swordfish"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_combined_room_waits_for_second_participant() {
        let (engine, _) = seeded_engine().await;
        let room_id = engine
            .create_room(
                "u1",
                "movie night",
                MatchMode::WatchAll,
                CollectionMode::Combined,
                None,
                "c1",
            )
            .await
            .unwrap();

        // Creator connects without a collection ref and falls back to c1
        engine.connect_to_room("u1", &room_id, None, None).await.unwrap();
        {
            let session = engine.session(&room_id).await.unwrap();
            let session = session.lock().await;
            assert!(!session.ready);
            assert!(session.deck.is_none());
            assert_eq!(session.participants["u1"].cards.len(), 2);
        }

        engine
            .connect_to_room("u2", &room_id, None, Some("c2"))
            .await
            .unwrap();
        let session = engine.session(&room_id).await.unwrap();
        let session = session.lock().await;
        assert!(session.ready);
        let deck = session.deck.as_ref().unwrap();
        // Join order: u1's two cards, then u2's one
        assert_eq!(deck.len(), 3);
        assert_eq!(deck[0].id, "c1-item0");
        assert_eq!(deck[2].id, "c2-item0");
        for p in session.participants.values() {
            assert!(Arc::ptr_eq(&p.cards, deck));
            assert_eq!(p.cursor, 0);
        }
    }

    #[tokio::test]
    async fn test_combined_join_needs_collection_ref() {
        let (engine, _) = seeded_engine().await;
        let room_id = engine
            .create_room(
                "u1",
                "movie night",
                MatchMode::WatchAll,
                CollectionMode::Combined,
                None,
                "c1",
            )
            .await
            .unwrap();

        let err = engine
            .connect_to_room("u2", &room_id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_late_combined_joiner_appends_without_resetting_cursors() {
        let (engine, _) = seeded_engine().await;
        let room_id = engine
            .create_room(
                "u1",
                "movie night",
                MatchMode::WatchAll,
                CollectionMode::Combined,
                None,
                "c1",
            )
            .await
            .unwrap();
        engine.connect_to_room("u1", &room_id, None, None).await.unwrap();
        engine
            .connect_to_room("u2", &room_id, None, Some("c2"))
            .await
            .unwrap();

        // u1 has already swiped one card when u3 walks in
        {
            let session = engine.session(&room_id).await.unwrap();
            let mut session = session.lock().await;
            if let Some(p) = session.participants.get_mut("u1") {
                p.cursor = 1;
            }
        }

        engine
            .connect_to_room("u3", &room_id, None, Some("c3"))
            .await
            .unwrap();

        let session = engine.session(&room_id).await.unwrap();
        let session = session.lock().await;
        let deck = session.deck.as_ref().unwrap();
        assert_eq!(deck.len(), 4);
        assert_eq!(deck[3].id, "c3-item0");
        assert_eq!(session.participants["u1"].cursor, 1);
        assert_eq!(session.participants["u3"].cursor, 0);
        for p in session.participants.values() {
            assert!(Arc::ptr_eq(&p.cards, deck));
        }
        // u3 has no stored nickname; they get a generated one
        assert!(!session.nicknames["u3"].is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_is_a_noop_and_rejoin_starts_fresh() {
        let (engine, _) = seeded_engine().await;
        let room_id = engine
            .create_room(
                "u1",
                "friday lunch",
                MatchMode::FirstMatch,
                CollectionMode::Single,
                None,
                "c1",
            )
            .await
            .unwrap();
        engine.connect_to_room("u1", &room_id, None, None).await.unwrap();

        {
            let session = engine.session(&room_id).await.unwrap();
            let mut session = session.lock().await;
            if let Some(p) = session.participants.get_mut("u1") {
                p.cursor = 1;
            }
        }

        // Reconnect keeps the cursor
        engine.connect_to_room("u1", &room_id, None, None).await.unwrap();
        {
            let session = engine.session(&room_id).await.unwrap();
            let session = session.lock().await;
            assert_eq!(session.participants["u1"].cursor, 1);
        }

        // Leave, then rejoin from scratch
        {
            let session = engine.session(&room_id).await.unwrap();
            let mut session = session.lock().await;
            session.participants.remove("u1");
        }
        engine.connect_to_room("u1", &room_id, None, None).await.unwrap();
        let session = engine.session(&room_id).await.unwrap();
        let session = session.lock().await;
        assert_eq!(session.participants["u1"].cursor, 0);
        assert_eq!(session.join_order, vec!["u1"]);
    }

    #[tokio::test]
    async fn test_connect_to_decided_room_is_rejected() {
        let (engine, _) = seeded_engine().await;
        let room_id = engine
            .create_room(
                "u1",
                "friday lunch",
                MatchMode::FirstMatch,
                CollectionMode::Single,
                None,
                "c1",
            )
            .await
            .unwrap();
        {
            let session = engine.session(&room_id).await.unwrap();
            session.lock().await.match_result = Some(Vec::new());
        }

        let err = engine
            .connect_to_room("u2", &room_id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotAllowed(_)));
    }

    #[tokio::test]
    async fn test_connect_revives_open_room_after_restart() {
        let (engine, store) = seeded_engine().await;
        let room_id = engine
            .create_room(
                "u1",
                "friday lunch",
                MatchMode::FirstMatch,
                CollectionMode::Single,
                None,
                "c1",
            )
            .await
            .unwrap();

        // New engine over the same store stands in for a restarted process
        let engine2 = Engine::new(store);
        engine2.connect_to_room("u2", &room_id, None, None).await.unwrap();

        let session = engine2.session(&room_id).await.unwrap();
        let session = session.lock().await;
        assert!(session.ready);
        assert_eq!(session.deck.as_ref().unwrap().len(), 2);
        assert!(session.participants.contains_key("u2"));
    }

    #[tokio::test]
    async fn test_connect_to_unknown_room_is_not_found() {
        let (engine, _) = seeded_engine().await;
        let err = engine
            .connect_to_room("u1", "ghost", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
