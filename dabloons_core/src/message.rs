use crate::blackjack::BlackjackOutcome;
use crate::card::{Card, HandRank};
use crate::settlement::SettlementReport;
use crate::state::{Chips, GiveawayId, InvitationId, Player, PlayerAction, SessionId, Street, UserId};
use serde::{Deserialize, Serialize};

// --- client -> server ---
// Commands a chat member can issue.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Binds the connection to a chat user. Must come first.
    Identify { user_id: UserId },

    // --- trust game ---
    /// Challenges 1 to 3 opponents to a game with the given buy-in
    Challenge { buy_in: Chips, opponents: Vec<UserId> },
    Accept { invitation_id: InvitationId },
    Decline { invitation_id: InvitationId },
    /// Acts in a running session when it is your turn
    Act { session_id: SessionId, action: PlayerAction },

    // --- wallet ---
    Balance,
    Leaderboard,
    Tip { to: UserId, amount: Chips },

    // --- house games ---
    Blackjack { bet: Chips },
    Hit,
    Stand,
    Coinflip { bet: Chips, call: CoinSide },

    // --- giveaways ---
    Giveaway { amount: Chips, minutes: u64, winners: usize },
    EnterGiveaway { giveaway_id: GiveawayId },
}

// --- server -> client ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Identified { user_id: UserId },

    // --- invitations ---
    InvitationSent {
        invitation_id: InvitationId,
        challenger: UserId,
        invited: Vec<UserId>,
        buy_in: Chips,
        expires_in_secs: u64,
    },
    InvitationAccepted { invitation_id: InvitationId, user_id: UserId },
    InvitationCancelled { invitation_id: InvitationId, reason: CancelReason },

    // --- session ---
    SessionStarted {
        session_id: SessionId,
        players: Vec<Player>,
        pot: Chips,
        unit: Chips,
    },
    /// Sent privately to each player
    HoleCards { session_id: SessionId, cards: (Card, Card) },
    PlayerActed {
        session_id: SessionId,
        player_id: UserId,
        action: PlayerAction,
        /// Chips this action added to the pot
        amount: Chips,
        pot: Chips,
        timed_out: bool,
    },
    NextToAct { session_id: SessionId, player_id: UserId, street: Street },
    BoardDealt { session_id: SessionId, street: Street, board: Vec<Card> },
    Showdown { session_id: SessionId, results: Vec<ShowdownResult> },
    SessionSettled { session_id: SessionId, report: SettlementReport },
    SessionCancelled {
        session_id: SessionId,
        reason: CancelReason,
        refunds: Vec<(UserId, Chips)>,
    },

    // --- wallet ---
    Balance { user_id: UserId, balance: Chips, stats: Stats },
    Leaderboard { entries: Vec<(UserId, Chips)> },
    TipSent { from: UserId, to: UserId, amount: Chips },

    // --- house games ---
    BlackjackHand {
        player: Vec<Card>,
        player_value: u8,
        /// The dealer's face-up card; the hole card stays hidden
        dealer_up: Card,
    },
    BlackjackResult {
        outcome: BlackjackOutcome,
        player: Vec<Card>,
        player_value: u8,
        dealer: Vec<Card>,
        dealer_value: u8,
        payout: Chips,
    },
    CoinflipResult { call: CoinSide, landed: CoinSide, bet: Chips, payout: Chips },

    // --- giveaways ---
    GiveawayStarted {
        giveaway_id: GiveawayId,
        host: UserId,
        amount: Chips,
        winners: usize,
        minutes: u64,
    },
    GiveawayEntered { giveaway_id: GiveawayId },
    GiveawayEnded { giveaway_id: GiveawayId, winners: Vec<UserId>, amount: Chips },

    Info { message: String },
    Error { message: String },
}

/// One contender's line in a showdown.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShowdownResult {
    pub player_id: UserId,
    pub cards: (Card, Card),
    pub hand_rank: HandRank,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Declined(UserId),
    TimedOut,
    InsufficientFunds(UserId),
    DeliveryFailed(UserId),
    LedgerUnavailable,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinSide {
    Heads,
    Tails,
}

/// Per-user results in the house games.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub blackjack_wins: u32,
    pub blackjack_losses: u32,
    pub coinflip_wins: u32,
    pub coinflip_losses: u32,
}

/// A notification produced by a state transition, to be delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Public(ServerMessage),
    Private(UserId, ServerMessage),
}
