use crate::card::{Card, Deck};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = u64;
pub type Chips = u64;
pub type SessionId = Uuid;
pub type InvitationId = Uuid;
pub type GiveawayId = Uuid;

/// One of the four betting rounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Street {
    PreFlop,
    Flop,
    Turn,
    River,
}

impl Street {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Community cards visible while this street is being bet.
    pub fn board_len(self) -> usize {
        [0, 3, 4, 5][self.index()]
    }

    pub fn next(self) -> Option<Street> {
        match self {
            Street::PreFlop => Some(Street::Flop),
            Street::Flop => Some(Street::Turn),
            Street::Turn => Some(Street::River),
            Street::River => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionPhase {
    /// Funded and dealt, waiting for every private hand to be delivered.
    Dealt,
    Betting(Street),
    Showdown,
    Settled,
    /// Aborted before settlement; every contribution was refunded.
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlayerAction {
    Call,
    Raise,
    Fold,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlayerStatus {
    Active,
    Folded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: UserId,
    pub seat: u8,
    pub status: PlayerStatus,
    /// Everything this player has put into the pot, buy-in included.
    pub contributed: Chips,
}

impl Player {
    pub fn is_active(&self) -> bool {
        self.status == PlayerStatus::Active
    }
}

/// A single trust-game table, from funding to settlement.
///
/// The deck and the hole cards never leave the server; clients see a
/// [`SessionView`].
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// Seat order: challenger first, then opponents as invited.
    pub players: Vec<Player>,
    pub phase: SessionPhase,
    pub pot: Chips,
    pub board: Vec<Card>,
    pub buy_in: Chips,
    /// Size of one call; a raise costs two.
    pub unit: Chips,
    pub(crate) deck: Deck,
    /// Hole cards, indexed like `players`.
    pub(crate) hands: Vec<(Card, Card)>,
    pub(crate) cur_player_idx: Option<usize>,
    /// Players that still owe an action in the current circuit.
    pub(crate) to_act: Vec<bool>,
    /// Bumped on every turn change so stale turn timers can be ignored.
    pub(crate) turn_seq: u64,
}

/// The public face of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionView {
    pub id: SessionId,
    pub players: Vec<Player>,
    pub phase: SessionPhase,
    pub pot: Chips,
    pub board: Vec<Card>,
    pub unit: Chips,
    pub to_act: Option<UserId>,
}

impl Session {
    pub fn current_player_id(&self) -> Option<UserId> {
        self.cur_player_idx.map(|idx| self.players[idx].id)
    }

    pub fn street(&self) -> Option<Street> {
        match self.phase {
            SessionPhase::Betting(street) => Some(street),
            _ => None,
        }
    }

    pub fn turn_seq(&self) -> u64 {
        self.turn_seq
    }

    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_active())
    }

    pub fn hole_cards(&self, user: UserId) -> Option<(Card, Card)> {
        self.seat_of(user).map(|idx| self.hands[idx])
    }

    pub fn total_contributed(&self) -> Chips {
        self.players.iter().map(|p| p.contributed).sum()
    }

    pub(crate) fn seat_of(&self, user: UserId) -> Option<usize> {
        self.players.iter().position(|p| p.id == user)
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            players: self.players.clone(),
            phase: self.phase,
            pot: self.pot,
            board: self.board.clone(),
            unit: self.unit,
            to_act: self.current_player_id(),
        }
    }
}
