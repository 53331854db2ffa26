use chrono::Utc;

use crate::engine::{Engine, RoomLookup, RoomSession};
use crate::error::{EngineError, EngineResult};
use crate::types::*;

impl Engine {
    /// Record `user`'s decision on the card at their cursor and report what
    /// they should see next. All mutation happens under the room lock, so a
    /// quorum check and the vote that triggered it are atomic.
    pub async fn submit_choice(
        &self,
        user_id: &str,
        room_id: &str,
        choice: Choice,
    ) -> EngineResult<RoomView> {
        let session = match self.lookup_room(room_id).await? {
            RoomLookup::Live(session) => session,
            RoomLookup::Closed(outcome) => return Ok(RoomView::Closed { outcome }),
        };
        let mut session = session.lock().await;

        if !session.ever_joined(user_id) {
            return Err(EngineError::NotAllowed(format!(
                "user {} is not in room {}",
                user_id, room_id
            )));
        }

        // A decided room only ever reports its outcome. Re-attempt the
        // durable hand-off here in case an earlier store write failed.
        if let Some(cards) = session.match_result.clone() {
            let outcome = MatchOutcome::new(cards);
            self.finalize_locked(&mut session, &outcome).await?;
            return Ok(RoomView::Closed { outcome });
        }

        if !session.ready {
            return Ok(RoomView::Waiting {
                joined: session.participants.len(),
            });
        }

        let position = session
            .participants
            .get(user_id)
            .map(|p| (p.cursor, p.cards.len()));
        let (cursor, deck_len) = match position {
            Some(position) => position,
            None => {
                return Err(EngineError::NotAllowed(format!(
                    "user {} is not in room {}",
                    user_id, room_id
                )))
            }
        };

        match choice {
            Choice::Leave => {
                session.participants.remove(user_id);
                self.store
                    .mark_participant_finished(room_id, user_id, Utc::now())
                    .await?;
                tracing::debug!("User {} left room {}", user_id, room_id);
                Ok(RoomView::Left)
            }
            Choice::No => {
                if cursor >= deck_len {
                    return Ok(RoomView::Finished);
                }
                self.advance_and_report(&mut session, user_id).await
            }
            Choice::Yes => {
                if cursor >= deck_len {
                    return Ok(RoomView::Finished);
                }
                session
                    .votes_by_index
                    .entry(cursor)
                    .or_default()
                    .insert(user_id.to_string());
                session.bump_quorum(Some(cursor));
                if session.match_mode == MatchMode::FirstMatch {
                    if let Some(card) = session.first_match_at(cursor) {
                        return self.decide(&mut session, vec![card]).await;
                    }
                }
                self.advance_and_report(&mut session, user_id).await
            }
        }
    }

    /// What the caller should currently see in the room. Read-only.
    pub async fn get_room_state(&self, user_id: &str, room_id: &str) -> EngineResult<RoomView> {
        let session = match self.lookup_room(room_id).await? {
            RoomLookup::Live(session) => session,
            RoomLookup::Closed(outcome) => return Ok(RoomView::Closed { outcome }),
        };
        let session = session.lock().await;

        if !session.ever_joined(user_id) {
            return Err(EngineError::NotAllowed(format!(
                "user {} is not in room {}",
                user_id, room_id
            )));
        }
        if let Some(cards) = session.match_result.clone() {
            return Ok(RoomView::Closed {
                outcome: MatchOutcome::new(cards),
            });
        }
        if !session.ready {
            return Ok(RoomView::Waiting {
                joined: session.participants.len(),
            });
        }
        match session.participants.get(user_id) {
            Some(p) => match p.cards.get(p.cursor) {
                Some(card) => Ok(RoomView::Card {
                    card: card.clone(),
                    index: p.cursor,
                    deck_size: p.cards.len(),
                }),
                None => Ok(RoomView::Finished),
            },
            // Joined once, not attached now: they left
            None => Ok(RoomView::Left),
        }
    }

    /// Move the caller's cursor forward and report the next card, their own
    /// finish, or the room-wide decision their finish completed.
    async fn advance_and_report(
        &self,
        session: &mut RoomSession,
        user_id: &str,
    ) -> EngineResult<RoomView> {
        let next = match session.participants.get_mut(user_id) {
            Some(p) => {
                p.cursor += 1;
                p.cards
                    .get(p.cursor)
                    .cloned()
                    .map(|card| (card, p.cursor, p.cards.len()))
            }
            None => {
                return Err(EngineError::NotAllowed(format!(
                    "user {} is not in room {}",
                    user_id, session.room_id
                )))
            }
        };
        if let Some((card, index, deck_size)) = next {
            return Ok(RoomView::Card {
                card,
                index,
                deck_size,
            });
        }

        // Cursor moved past the deck end: this participant is finished
        self.store
            .mark_participant_finished(&session.room_id, user_id, Utc::now())
            .await?;
        if session.all_finished() && !session.decided() {
            // The one full-table evaluation. In FIRST_MATCH rooms nothing
            // can have reached quorum without deciding earlier, so this
            // closes the room with an explicit no-match.
            session.bump_quorum(None);
            let cards = session.watch_all_matches();
            tracing::info!(
                "Room {} finished swiping, {} card(s) matched",
                session.room_id,
                cards.len()
            );
            return self.decide(session, cards).await;
        }
        Ok(RoomView::Finished)
    }

    /// Freeze the outcome and hand it to the store. Only the call that
    /// decided the room ever sees `Matched`; everyone after sees `Closed`.
    async fn decide(&self, session: &mut RoomSession, cards: Vec<Card>) -> EngineResult<RoomView> {
        session.match_result = Some(cards.clone());
        let outcome = MatchOutcome::new(cards);
        self.finalize_locked(session, &outcome).await?;
        Ok(RoomView::Matched { outcome })
    }
}
