use chrono::Utc;

use crate::engine::{Engine, RoomSession};
use crate::error::EngineResult;
use crate::types::{MatchOutcome, RoomStatus};

impl Engine {
    /// Persist the outcome and close the room, exactly once. Runs while the
    /// caller still holds the room lock, so two concurrent deciding votes
    /// cannot both reach the store write.
    pub(crate) async fn finalize_locked(
        &self,
        session: &mut RoomSession,
        outcome: &MatchOutcome,
    ) -> EngineResult<()> {
        if session.finalized {
            return Ok(());
        }
        // The latch covers this process; the record status covers a session
        // rebuilt on top of a room that was already closed.
        if let Some(record) = self.store.room_record(&session.room_id).await? {
            if record.status == RoomStatus::Closed {
                session.finalized = true;
                return Ok(());
            }
        }
        self.store
            .update_room_status_and_result(
                &session.room_id,
                RoomStatus::Closed,
                outcome.clone(),
                Utc::now(),
            )
            .await?;
        session.finalized = true;
        tracing::info!(
            "Room {} closed (match: {})",
            session.room_id,
            outcome.has_match
        );
        Ok(())
    }
}
