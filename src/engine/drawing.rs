use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use rand::Rng;
use tokio::sync::Mutex;

use crate::engine::{Engine, RoomLookup, RoomSession};
use crate::error::{EngineError, EngineResult};
use crate::types::{DrawingResult, DrawingState, DrawingView, ParticipantInfo};

/// Topics handed out the first time anyone opens a room's canvas.
const TOPICS: &[&str] = &[
    "a cat piloting a hot air balloon",
    "the world's saddest sandwich",
    "a robot learning to dance",
    "a dragon at the dentist",
    "an octopus juggling teacups",
    "the moon on vacation",
    "a snail racing a glacier",
    "breakfast in zero gravity",
    "a lighthouse keeper's dog",
    "the inside of a vending machine",
    "a penguin's first day at work",
    "a mountain wearing a scarf",
];

const SNAPSHOT_PREFIX: &str = "data:image/png;base64,";

fn validate_snapshot(snapshot: &str) -> EngineResult<()> {
    let payload = snapshot
        .strip_prefix(SNAPSHOT_PREFIX)
        .ok_or_else(|| EngineError::Validation("snapshot must be a PNG data url".to_string()))?;
    STANDARD
        .decode(payload)
        .map_err(|e| EngineError::Validation(format!("snapshot is not valid base64: {}", e)))?;
    Ok(())
}

impl Engine {
    /// Drawing scratch state lives and dies with the session, so a missing
    /// session is reported as such even when the room record is closed.
    async fn drawing_session(&self, room_id: &str) -> EngineResult<Arc<Mutex<RoomSession>>> {
        match self.lookup_room(room_id).await? {
            RoomLookup::Live(session) => Ok(session),
            RoomLookup::Closed(_) => Err(EngineError::SessionMissing(room_id.to_string())),
        }
    }

    /// The caller's canvas: the room topic (assigned on first ask), the
    /// current roster, and their own stored strokes. Works in any voting
    /// phase; leavers keep access to their scratch state.
    pub async fn get_room_drawing(
        &self,
        user_id: &str,
        room_id: &str,
    ) -> EngineResult<DrawingView> {
        let session = self.drawing_session(room_id).await?;
        let mut session = session.lock().await;
        if !session.ever_joined(user_id) {
            return Err(EngineError::NotAllowed(format!(
                "user {} is not in room {}",
                user_id, room_id
            )));
        }

        if session.topic.is_none() {
            let mut rng = rand::rng();
            let topic = TOPICS[rng.random_range(0..TOPICS.len())];
            session.topic = Some(topic.to_string());
            tracing::debug!("Room {} gets drawing topic: {}", room_id, topic);
        }
        let topic = session.topic.clone().unwrap_or_default();

        let participants = session
            .join_order
            .iter()
            .filter(|u| session.participants.contains_key(*u))
            .map(|u| ParticipantInfo {
                user_id: u.clone(),
                nickname: session.nickname(u),
            })
            .collect();
        let (points, snapshot) = match session.drawings.get(user_id) {
            Some(d) => (d.points.clone(), d.snapshot.clone()),
            None => (serde_json::Value::Null, None),
        };

        Ok(DrawingView {
            topic,
            participants,
            points,
            snapshot,
        })
    }

    /// Upsert the caller's strokes and optional canvas snapshot.
    pub async fn save_room_drawing(
        &self,
        user_id: &str,
        room_id: &str,
        points: serde_json::Value,
        snapshot: Option<String>,
    ) -> EngineResult<()> {
        if let Some(ref snapshot) = snapshot {
            validate_snapshot(snapshot)?;
        }
        let session = self.drawing_session(room_id).await?;
        let mut session = session.lock().await;
        if !session.ever_joined(user_id) {
            return Err(EngineError::NotAllowed(format!(
                "user {} is not in room {}",
                user_id, room_id
            )));
        }
        session.drawings.insert(
            user_id.to_string(),
            DrawingState {
                points,
                snapshot,
                updated_at: Utc::now().to_rfc3339(),
            },
        );
        Ok(())
    }

    /// Every stored drawing of the room, in join order.
    pub async fn get_room_drawings_results(
        &self,
        user_id: &str,
        room_id: &str,
    ) -> EngineResult<Vec<DrawingResult>> {
        let session = self.drawing_session(room_id).await?;
        let session = session.lock().await;
        if !session.ever_joined(user_id) {
            return Err(EngineError::NotAllowed(format!(
                "user {} is not in room {}",
                user_id, room_id
            )));
        }
        Ok(session
            .join_order
            .iter()
            .filter_map(|u| {
                session.drawings.get(u).map(|d| DrawingResult {
                    user_id: u.clone(),
                    nickname: session.nickname(u),
                    snapshot: d.snapshot.clone(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CollectionItem, CollectionRecord, MemoryStore};
    use crate::types::{Choice, CollectionMode, MatchMode};
    use serde_json::json;

    async fn room_with_two_users() -> (Engine, String) {
        let store = Arc::new(MemoryStore::new());
        store.add_user("u1", "ada").await;
        store.add_user("u2", "grace").await;
        store
            .add_collection(CollectionRecord {
                id: "c1".to_string(),
                owner_id: "u1".to_string(),
                owner_nickname: "ada".to_string(),
                title: "doodles".to_string(),
                items: vec![CollectionItem {
                    id: "i1".to_string(),
                    title: "Only card".to_string(),
                    description: None,
                    image_url: None,
                }],
            })
            .await;
        let engine = Engine::new(store);
        let room = engine
            .create_room(
                "u1",
                "drawing room",
                MatchMode::WatchAll,
                CollectionMode::Single,
                None,
                "c1",
            )
            .await
            .unwrap();
        engine.connect_to_room("u1", &room, None, None).await.unwrap();
        engine.connect_to_room("u2", &room, None, None).await.unwrap();
        (engine, room)
    }

    fn png_data_url() -> String {
        format!("{}{}", SNAPSHOT_PREFIX, STANDARD.encode(b"\x89PNG fake"))
    }

    #[tokio::test]
    async fn test_drawing_round_trip() {
        let (engine, room) = room_with_two_users().await;
        let points = json!([{"x": 1, "y": 2}, {"x": 3, "y": 4}]);
        let snapshot = png_data_url();

        engine
            .save_room_drawing("u1", &room, points.clone(), Some(snapshot.clone()))
            .await
            .unwrap();

        let view = engine.get_room_drawing("u1", &room).await.unwrap();
        assert_eq!(view.points, points);
        assert_eq!(view.snapshot, Some(snapshot));
        assert!(!view.topic.is_empty());

        // The other participant has their own empty canvas
        let view = engine.get_room_drawing("u2", &room).await.unwrap();
        assert!(view.points.is_null());
        assert!(view.snapshot.is_none());
    }

    #[tokio::test]
    async fn test_topic_is_assigned_once() {
        let (engine, room) = room_with_two_users().await;
        let first = engine.get_room_drawing("u1", &room).await.unwrap().topic;
        let second = engine.get_room_drawing("u2", &room).await.unwrap().topic;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_roster_names_current_participants() {
        let (engine, room) = room_with_two_users().await;
        let view = engine.get_room_drawing("u1", &room).await.unwrap();
        let names: Vec<&str> = view
            .participants
            .iter()
            .map(|p| p.nickname.as_str())
            .collect();
        assert_eq!(names, vec!["ada", "grace"]);
    }

    #[tokio::test]
    async fn test_snapshot_must_be_a_png_data_url() {
        let (engine, room) = room_with_two_users().await;

        let err = engine
            .save_room_drawing("u1", &room, json!([]), Some("http://nope.png".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = engine
            .save_room_drawing(
                "u1",
                &room,
                json!([]),
                Some(format!("{}not//base64!!", SNAPSHOT_PREFIX)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_results_follow_join_order() {
        let (engine, room) = room_with_two_users().await;
        engine
            .save_room_drawing("u2", &room, json!([1]), Some(png_data_url()))
            .await
            .unwrap();
        engine
            .save_room_drawing("u1", &room, json!([2]), None)
            .await
            .unwrap();

        let results = engine.get_room_drawings_results("u1", &room).await.unwrap();
        let users: Vec<&str> = results.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(users, vec!["u1", "u2"]);
        assert_eq!(results[0].nickname, "ada");
        assert!(results[0].snapshot.is_none());
        assert!(results[1].snapshot.is_some());
    }

    #[tokio::test]
    async fn test_leaver_keeps_canvas_access_but_strangers_get_nothing() {
        let (engine, room) = room_with_two_users().await;
        engine
            .save_room_drawing("u2", &room, json!([1]), None)
            .await
            .unwrap();
        engine.submit_choice("u2", &room, Choice::Leave).await.unwrap();

        let view = engine.get_room_drawing("u2", &room).await.unwrap();
        assert_eq!(view.points, json!([1]));
        // Leavers drop off the roster but keep their scratch state
        assert_eq!(view.participants.len(), 1);

        let err = engine.get_room_drawing("nobody", &room).await.unwrap_err();
        assert!(matches!(err, EngineError::NotAllowed(_)));
    }

    #[tokio::test]
    async fn test_drawing_needs_a_live_session() {
        let (engine, room) = room_with_two_users().await;
        engine.rooms.write().await.remove(&room);

        let err = engine.get_room_drawing("u1", &room).await.unwrap_err();
        assert!(matches!(err, EngineError::SessionMissing(_)));
    }
}
