use crate::engine::RoomSession;
use crate::types::Card;

impl RoomSession {
    /// Raise the quorum to the current participant count; a yes at `index`
    /// additionally raises it to the support already recorded there, since
    /// leavers keep their cast votes. The quorum never goes down, and
    /// nothing bumps it once the room is decided.
    pub(crate) fn bump_quorum(&mut self, index: Option<usize>) {
        let mut floor = self.participants.len();
        if let Some(i) = index {
            if let Some(voters) = self.votes_by_index.get(&i) {
                floor = floor.max(voters.len());
            }
        }
        let current = self.required_votes.unwrap_or(0);
        self.required_votes = Some(current.max(floor));
    }

    /// FIRST_MATCH evaluation after a yes at `index`: reaching quorum means
    /// the match is exactly that one card.
    pub(crate) fn first_match_at(&self, index: usize) -> Option<Card> {
        let required = self.required_votes?;
        let supporters = self
            .votes_by_index
            .get(&index)
            .map(|voters| voters.len())
            .unwrap_or(0);
        if required > 0 && supporters == required {
            self.deck.as_ref().and_then(|deck| deck.get(index)).cloned()
        } else {
            None
        }
    }

    /// WATCH_ALL sweep over the whole vote table: every card whose index
    /// reached quorum, in ascending index order. May be empty.
    pub(crate) fn watch_all_matches(&self) -> Vec<Card> {
        let required = match self.required_votes {
            Some(required) if required > 0 => required,
            _ => return Vec::new(),
        };
        let deck = match self.deck.as_ref() {
            Some(deck) => deck,
            None => return Vec::new(),
        };
        deck.iter()
            .enumerate()
            .filter(|(index, _)| {
                self.votes_by_index
                    .get(index)
                    .map(|voters| voters.len() == required)
                    .unwrap_or(false)
            })
            .map(|(_, card)| card.clone())
            .collect()
    }

    /// True when every remaining participant has swiped past their deck end.
    pub(crate) fn all_finished(&self) -> bool {
        !self.participants.is_empty()
            && self
                .participants
                .values()
                .all(|p| p.cursor >= p.cards.len())
    }
}
