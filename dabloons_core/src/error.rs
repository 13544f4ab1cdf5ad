use crate::ledger::LedgerError;
use crate::state::{Chips, GiveawayId, InvitationId, SessionId, UserId};
use thiserror::Error;

/// Errors raised by the casino and its games.
///
/// Every variant leaves the ledger untouched, or fully restored, by the time it
/// reaches the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    // --- validation ---
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Chips),

    #[error("you cannot challenge yourself")]
    SelfChallenge,

    #[error("a challenge needs 1 to 3 opponents, got {0}")]
    OpponentCount(usize),

    #[error("user {0} was named more than once")]
    DuplicateOpponent(UserId),

    #[error("you cannot tip yourself")]
    SelfTip,

    #[error("duration is out of range")]
    InvalidDuration,

    // --- funds ---
    #[error("user {user} has {available} dabloons, {required} required")]
    InsufficientFunds { user: UserId, available: Chips, required: Chips },

    #[error("ledger unavailable: {0}")]
    Ledger(String),

    // --- consensus ---
    #[error("invitation {0} not found")]
    InvitationNotFound(InvitationId),

    #[error("user {0} is not part of this invitation")]
    NotInvited(UserId),

    #[error("user {0} has already accepted")]
    AlreadyAccepted(UserId),

    #[error("invitation {0} timed out")]
    Timeout(InvitationId),

    #[error("could not deliver a private hand to user {0}")]
    DeliveryFailure(UserId),

    // --- session ---
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("it is not user {0}'s turn")]
    InvalidTurn(UserId),

    #[error("no betting is open in this session")]
    BettingClosed,

    #[error("session is not at showdown")]
    NotAtShowdown,

    #[error("session is already settled")]
    AlreadySettled,

    #[error("the deck ran out of cards")]
    DeckExhausted,

    // --- side games ---
    #[error("you have no blackjack hand in progress")]
    NoActiveHand,

    #[error("you already have a blackjack hand in progress")]
    HandInProgress,

    #[error("giveaway {0} not found")]
    GiveawayNotFound(GiveawayId),

    #[error("you already entered this giveaway")]
    AlreadyEntered,
}

impl GameError {
    /// Whether the request was rejected before touching any state.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GameError::InvalidAmount(_)
                | GameError::SelfChallenge
                | GameError::OpponentCount(_)
                | GameError::DuplicateOpponent(_)
                | GameError::SelfTip
                | GameError::InvalidDuration
        )
    }
}

impl From<LedgerError> for GameError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds { user, available, required } => {
                GameError::InsufficientFunds { user, available, required }
            }
            LedgerError::Unavailable(reason) => GameError::Ledger(reason),
        }
    }
}

pub type GameResult<T> = Result<T, GameError>;
