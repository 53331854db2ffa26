use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type RoomId = String;
pub type UserId = String;
pub type CollectionId = String;

/// How a room decides that a match exists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchMode {
    /// Voting stops the instant any card reaches quorum.
    FirstMatch,
    /// Everyone swipes the whole deck; every quorum card is reported.
    WatchAll,
}

/// Where the deck comes from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionMode {
    /// One shared deck built from the creator's collection.
    Single,
    /// Union of each participant's own collection, frozen at two joiners.
    Combined,
}

/// A participant's decision on the card at their cursor.
///
/// This is the engine-boundary type; wire formats translate to it at the
/// edge (serde handles the HTTP JSON case).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Leave,
    Yes,
    No,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Open,
    Closed,
}

/// One swipeable item, sourced from a collection at deck-assembly time.
/// Immutable once built; decks share cards via `Arc<Vec<Card>>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub owner_nickname: String,
}

/// The decided outcome persisted on the room record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchOutcome {
    pub has_match: bool,
    pub matched_cards: Vec<Card>,
}

impl MatchOutcome {
    pub fn new(matched_cards: Vec<Card>) -> Self {
        Self {
            has_match: !matched_cards.is_empty(),
            matched_cards,
        }
    }

    /// Explicit "nobody matched on anything" outcome. Not an error.
    pub fn no_match() -> Self {
        Self::new(Vec::new())
    }
}

/// Per-user drawing scratch state. Independent of voting; lives only as long
/// as the in-memory session does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrawingState {
    /// Client-shaped stroke data; the engine stores it verbatim.
    pub points: serde_json::Value,
    /// Base64 PNG data URL of the canvas, if the client sent one.
    pub snapshot: Option<String>,
    pub updated_at: String,
}

/// Roster entry for drawing-phase reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantInfo {
    pub user_id: UserId,
    pub nickname: String,
}

/// What a caller should render next, for both state reads and vote replies.
///
/// `Matched` is only produced by the call that decided the room; every later
/// call of any kind sees `Closed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RoomView {
    /// Combined deck not assembled yet; retry after more participants join.
    Waiting { joined: usize },
    /// The card at the caller's cursor.
    Card {
        card: Card,
        index: usize,
        deck_size: usize,
    },
    /// Caller swiped the whole deck while the room is still undecided.
    Finished,
    /// This very call decided the room.
    Matched { outcome: MatchOutcome },
    /// Room already decided and closed; redirect to results.
    Closed { outcome: MatchOutcome },
    /// Caller left the room.
    Left,
}

/// Payload of `get_room_drawing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawingView {
    pub topic: String,
    pub participants: Vec<ParticipantInfo>,
    pub points: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
}

/// One entry of `get_room_drawings_results`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrawingResult {
    pub user_id: UserId,
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
}
