use crate::card::Deck;
use crate::error::{GameError, GameResult};
use crate::message::{Outbound, ServerMessage};
use crate::state::*;
use tracing::debug;

// --- session lifecycle ---

impl Session {
    /// Deals a funded session.
    ///
    /// Every participant has already paid `buy_in`, so each starts with that
    /// contribution and the pot holds their sum. Two hole cards go to each seat
    /// in turn. The returned messages include one private `HoleCards` per player;
    /// betting stays closed until [`Session::open_betting`].
    pub fn deal(
        id: SessionId,
        participants: &[UserId],
        buy_in: Chips,
        unit: Chips,
        mut deck: Deck,
    ) -> GameResult<(Session, Vec<Outbound>)> {
        let players: Vec<Player> = participants
            .iter()
            .enumerate()
            .map(|(seat, &id)| Player {
                id,
                seat: seat as u8,
                status: PlayerStatus::Active,
                contributed: buy_in,
            })
            .collect();

        let mut hands = Vec::with_capacity(players.len());
        for _ in &players {
            let first = deck.draw().ok_or(GameError::DeckExhausted)?;
            let second = deck.draw().ok_or(GameError::DeckExhausted)?;
            hands.push((first, second));
        }

        let session = Session {
            id,
            pot: buy_in * players.len() as Chips,
            to_act: vec![false; players.len()],
            players,
            phase: SessionPhase::Dealt,
            board: Vec::with_capacity(5),
            buy_in,
            unit,
            deck,
            hands,
            cur_player_idx: None,
            turn_seq: 0,
        };

        let mut out = vec![Outbound::Public(ServerMessage::SessionStarted {
            session_id: id,
            players: session.players.clone(),
            pot: session.pot,
            unit,
        })];
        for (player, &cards) in session.players.iter().zip(&session.hands) {
            out.push(Outbound::Private(player.id, ServerMessage::HoleCards { session_id: id, cards }));
        }
        Ok((session, out))
    }

    /// Moves a dealt session into the pre-flop betting round.
    pub fn open_betting(&mut self) -> GameResult<Vec<Outbound>> {
        if self.phase != SessionPhase::Dealt {
            return Err(GameError::BettingClosed);
        }
        self.phase = SessionPhase::Betting(Street::PreFlop);
        Ok(self.start_circuit())
    }

    /// Marks the session cancelled and returns what each player must be refunded.
    pub fn cancel(&mut self) -> GameResult<Vec<(UserId, Chips)>> {
        if matches!(self.phase, SessionPhase::Settled | SessionPhase::Cancelled) {
            return Err(GameError::AlreadySettled);
        }
        self.phase = SessionPhase::Cancelled;
        self.cur_player_idx = None;
        Ok(self.players.iter().map(|p| (p.id, p.contributed)).collect())
    }
}

// --- turns ---

impl Session {
    /// Chips the action would move from the actor into the pot.
    pub fn cost_of(&self, action: PlayerAction) -> Chips {
        match action {
            PlayerAction::Call => self.unit,
            PlayerAction::Raise => self.unit * 2,
            PlayerAction::Fold => 0,
        }
    }

    /// Checks that `actor` may act right now.
    pub fn check_turn(&self, actor: UserId) -> GameResult<()> {
        if !matches!(self.phase, SessionPhase::Betting(_)) {
            return Err(GameError::BettingClosed);
        }
        if self.current_player_id() != Some(actor) {
            return Err(GameError::InvalidTurn(actor));
        }
        Ok(())
    }

    /// Applies one action from the current player.
    ///
    /// The ledger side of a call or raise is the caller's job; this only moves
    /// chips between the player's contribution and the pot. After the action the
    /// session either hands the turn on, deals the next street, or reaches
    /// `Showdown` (after the river, or as soon as one player is left).
    pub fn dispatch(&mut self, actor: UserId, action: PlayerAction) -> GameResult<Vec<Outbound>> {
        self.apply(actor, action, false)
    }

    /// Folds the current player if `turn_seq` still names the live turn.
    /// Returns `None` when the timer is stale.
    pub fn fold_on_timeout(&mut self, turn_seq: u64) -> Option<Vec<Outbound>> {
        if self.turn_seq != turn_seq {
            return None;
        }
        let actor = self.current_player_id()?;
        self.apply(actor, PlayerAction::Fold, true).ok()
    }

    fn apply(&mut self, actor: UserId, action: PlayerAction, timed_out: bool) -> GameResult<Vec<Outbound>> {
        self.check_turn(actor)?;
        let idx = self.seat_of(actor).ok_or(GameError::InvalidTurn(actor))?;

        let amount = self.cost_of(action);
        match action {
            PlayerAction::Fold => {
                self.players[idx].status = PlayerStatus::Folded;
                self.to_act[idx] = false;
            }
            PlayerAction::Call => {
                self.to_act[idx] = false;
            }
            PlayerAction::Raise => {
                // everyone else still in owes another action
                for (i, player) in self.players.iter().enumerate() {
                    self.to_act[i] = i != idx && player.is_active();
                }
            }
        }
        self.players[idx].contributed += amount;
        self.pot += amount;
        debug!(session = %self.id, actor, ?action, amount, pot = self.pot, "player acted");

        let mut out = vec![Outbound::Public(ServerMessage::PlayerActed {
            session_id: self.id,
            player_id: actor,
            action,
            amount,
            pot: self.pot,
            timed_out,
        })];

        if self.active_players().count() == 1 {
            self.phase = SessionPhase::Showdown;
            self.cur_player_idx = None;
            self.turn_seq += 1;
            return Ok(out);
        }

        if self.to_act.iter().any(|&owed| owed) {
            out.extend(self.advance_to_next_player(idx));
        } else {
            out.extend(self.advance_to_next_street()?);
        }
        Ok(out)
    }

    /// Hands the turn to the next seat after `from` that still owes an action.
    fn advance_to_next_player(&mut self, from: usize) -> Vec<Outbound> {
        let n = self.players.len();
        let next = (1..=n).map(|step| (from + step) % n).find(|&i| self.to_act[i]);
        self.set_turn(next)
    }

    /// Deals the next street's cards, or moves to showdown after the river.
    fn advance_to_next_street(&mut self) -> GameResult<Vec<Outbound>> {
        let street = match self.phase {
            SessionPhase::Betting(street) => street,
            _ => return Err(GameError::BettingClosed),
        };
        let Some(next) = street.next() else {
            self.phase = SessionPhase::Showdown;
            self.cur_player_idx = None;
            self.turn_seq += 1;
            return Ok(Vec::new());
        };

        while self.board.len() < next.board_len() {
            let card = self.deck.draw().ok_or(GameError::DeckExhausted)?;
            self.board.push(card);
        }
        self.phase = SessionPhase::Betting(next);

        let mut out = vec![Outbound::Public(ServerMessage::BoardDealt {
            session_id: self.id,
            street: next,
            board: self.board.clone(),
        })];
        out.extend(self.start_circuit());
        Ok(out)
    }

    /// Every active player owes an action; the first active seat starts.
    fn start_circuit(&mut self) -> Vec<Outbound> {
        for (i, player) in self.players.iter().enumerate() {
            self.to_act[i] = player.is_active();
        }
        let first = self.to_act.iter().position(|&owed| owed);
        self.set_turn(first)
    }

    fn set_turn(&mut self, idx: Option<usize>) -> Vec<Outbound> {
        self.cur_player_idx = idx;
        self.turn_seq += 1;
        match (idx, self.street()) {
            (Some(i), Some(street)) => vec![Outbound::Public(ServerMessage::NextToAct {
                session_id: self.id,
                player_id: self.players[i].id,
                street,
            })],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::card::{Card, Rank, Suit};
    use uuid::Uuid;

    /// A deck whose draws come out in exactly the given order.
    pub(crate) fn stacked(draw_order: &[Card]) -> Deck {
        let mut cards: Vec<Card> = Deck::ordered()
            .cards()
            .iter()
            .filter(|c| !draw_order.contains(c))
            .copied()
            .collect();
        cards.extend(draw_order.iter().rev());
        Deck::from_cards(cards)
    }

    pub(crate) fn dealt(players: &[UserId], buy_in: Chips, unit: Chips) -> Session {
        let deck = Deck::ordered();
        let (session, _) = Session::deal(Uuid::new_v4(), players, buy_in, unit, deck).unwrap();
        session
    }

    fn betting(players: &[UserId]) -> Session {
        let mut session = dealt(players, 100, 10);
        session.open_betting().unwrap();
        session
    }

    fn assert_pot_matches(session: &Session) {
        assert_eq!(session.total_contributed(), session.pot);
    }

    #[test]
    fn test_deal_funds_pot_and_hands() {
        let deck = stacked(&[
            Card::new(Rank::Ace, Suit::Spade), Card::new(Rank::King, Suit::Spade),
            Card::new(Rank::Two, Suit::Club), Card::new(Rank::Three, Suit::Club),
        ]);
        let (session, out) = Session::deal(Uuid::new_v4(), &[1, 2], 100, 10, deck).unwrap();

        assert_eq!(session.phase, SessionPhase::Dealt);
        assert_eq!(session.pot, 200);
        assert_pot_matches(&session);
        assert_eq!(session.hole_cards(1), Some((Card::new(Rank::Ace, Suit::Spade), Card::new(Rank::King, Suit::Spade))));
        assert_eq!(session.deck.len(), 48);
        let private = out.iter().filter(|o| matches!(o, Outbound::Private(..))).count();
        assert_eq!(private, 2);
        assert_eq!(session.current_player_id(), None);
    }

    #[test]
    fn test_open_betting_starts_with_challenger() {
        let session = betting(&[1, 2, 3]);
        assert_eq!(session.phase, SessionPhase::Betting(Street::PreFlop));
        assert_eq!(session.current_player_id(), Some(1));
        assert!(session.board.is_empty());
    }

    #[test]
    fn test_out_of_turn_action_changes_nothing() {
        let mut session = betting(&[1, 2, 3]);
        let before = session.view();
        assert_eq!(session.dispatch(2, PlayerAction::Call), Err(GameError::InvalidTurn(2)));
        assert_eq!(session.dispatch(9, PlayerAction::Fold), Err(GameError::InvalidTurn(9)));
        assert_eq!(session.view(), before);
    }

    #[test]
    fn test_full_circuit_advances_street() {
        let mut session = betting(&[1, 2, 3]);
        session.dispatch(1, PlayerAction::Call).unwrap();
        session.dispatch(2, PlayerAction::Call).unwrap();
        assert_eq!(session.phase, SessionPhase::Betting(Street::PreFlop));
        session.dispatch(3, PlayerAction::Call).unwrap();

        assert_eq!(session.phase, SessionPhase::Betting(Street::Flop));
        assert_eq!(session.board.len(), 3);
        assert_eq!(session.pot, 330);
        assert_pot_matches(&session);
        assert_eq!(session.current_player_id(), Some(1));
    }

    #[test]
    fn test_raise_reopens_the_circuit() {
        let mut session = betting(&[1, 2, 3]);
        session.dispatch(1, PlayerAction::Call).unwrap();
        session.dispatch(2, PlayerAction::Call).unwrap();
        session.dispatch(3, PlayerAction::Raise).unwrap();

        // 1 and 2 must act again before the flop
        assert_eq!(session.phase, SessionPhase::Betting(Street::PreFlop));
        assert_eq!(session.current_player_id(), Some(1));
        session.dispatch(1, PlayerAction::Call).unwrap();
        session.dispatch(2, PlayerAction::Call).unwrap();
        assert_eq!(session.phase, SessionPhase::Betting(Street::Flop));
        assert_eq!(session.players[2].contributed, 120);
        assert_pot_matches(&session);
    }

    #[test]
    fn test_turn_skips_folded_players() {
        let mut session = betting(&[1, 2, 3]);
        session.dispatch(1, PlayerAction::Call).unwrap();
        session.dispatch(2, PlayerAction::Fold).unwrap();
        session.dispatch(3, PlayerAction::Call).unwrap();
        assert_eq!(session.phase, SessionPhase::Betting(Street::Flop));
        session.dispatch(1, PlayerAction::Call).unwrap();
        assert_eq!(session.current_player_id(), Some(3));
    }

    #[test]
    fn test_last_player_standing_ends_betting_without_reveal() {
        let mut session = betting(&[1, 2, 3]);
        session.dispatch(1, PlayerAction::Fold).unwrap();
        session.dispatch(2, PlayerAction::Fold).unwrap();

        assert_eq!(session.phase, SessionPhase::Showdown);
        assert_eq!(session.current_player_id(), None);
        assert!(session.board.is_empty());
        assert_eq!(session.pot, 300);
    }

    #[test]
    fn test_board_grows_with_each_street() {
        let mut session = betting(&[1, 2]);
        for street in [Street::Flop, Street::Turn, Street::River] {
            session.dispatch(1, PlayerAction::Call).unwrap();
            session.dispatch(2, PlayerAction::Call).unwrap();
            assert_eq!(session.phase, SessionPhase::Betting(street));
            assert_eq!(session.board.len(), street.board_len());
            assert_pot_matches(&session);
        }
        session.dispatch(1, PlayerAction::Call).unwrap();
        session.dispatch(2, PlayerAction::Call).unwrap();
        assert_eq!(session.phase, SessionPhase::Showdown);
        assert_eq!(session.board.len(), 5);
        assert_eq!(session.pot, 280);
    }

    #[test]
    fn test_cards_are_never_dealt_twice() {
        let mut session = betting(&[1, 2, 3, 4]);
        for _ in 0..4 {
            for id in 1..=4 {
                session.dispatch(id, PlayerAction::Call).unwrap();
            }
        }
        let mut seen: Vec<Card> = session.deck.cards().to_vec();
        seen.extend(session.board.iter().copied());
        for &(a, b) in &session.hands {
            seen.extend([a, b]);
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 52);
    }

    #[test]
    fn test_stale_timeout_is_ignored() {
        let mut session = betting(&[1, 2]);
        let stale = session.turn_seq();
        session.dispatch(1, PlayerAction::Call).unwrap();
        assert!(session.fold_on_timeout(stale).is_none());
        assert_eq!(session.players[1].status, PlayerStatus::Active);

        let live = session.turn_seq();
        let out = session.fold_on_timeout(live).unwrap();
        assert_eq!(session.players[1].status, PlayerStatus::Folded);
        assert_eq!(session.phase, SessionPhase::Showdown);
        assert!(out.iter().any(|o| matches!(o,
            Outbound::Public(ServerMessage::PlayerActed { timed_out: true, .. }))));
    }

    #[test]
    fn test_cancel_returns_contributions() {
        let mut session = betting(&[1, 2]);
        session.dispatch(1, PlayerAction::Raise).unwrap();
        let refunds = session.cancel().unwrap();
        assert_eq!(refunds, vec![(1, 120), (2, 100)]);
        assert_eq!(session.phase, SessionPhase::Cancelled);
        assert_eq!(session.cancel(), Err(GameError::AlreadySettled));
    }
}
