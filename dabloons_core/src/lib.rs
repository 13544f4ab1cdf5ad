//! # Dabloons core
//!
//! Game rules and services for the dabloons casino: the multi-party trust
//! card game (consensus, betting streets, hand evaluation, settlement) plus
//! the single-player house games. Nothing here knows about sockets; the
//! transport plugs in through [`Ledger`] and [`Notifier`].

mod blackjack;
mod card;
mod casino;
mod config;
mod consensus;
mod error;
mod giveaway;
mod ledger;
mod logic;
mod message;
mod notify;
mod settlement;
mod state;

pub use blackjack::*;
pub use card::*;
pub use casino::*;
pub use config::*;
pub use consensus::*;
pub use error::*;
pub use giveaway::*;
pub use ledger::*;
pub use message::*;
pub use notify::*;
pub use settlement::*;
pub use state::*;
