use crate::state::Chips;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the casino. Every field has a default, so a partial config
/// deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CasinoConfig {
    /// Balance a user starts with the first time the ledger sees them
    pub starting_balance: Chips,
    /// How long a challenge waits for every opponent to accept
    pub invite_timeout_secs: u64,
    /// How long a player has to act before being folded
    pub turn_timeout_secs: u64,
    /// One call in the trust game, as a percentage of the buy-in
    pub bet_unit_percent: u64,
    /// How often due giveaways are drawn
    pub giveaway_poll_secs: u64,
    pub leaderboard_size: usize,
    /// Fixes the shuffle for reproducible games
    pub rng_seed: Option<u64>,
}

impl Default for CasinoConfig {
    fn default() -> Self {
        CasinoConfig {
            starting_balance: 1000,
            invite_timeout_secs: 120,
            turn_timeout_secs: 60,
            bet_unit_percent: 10,
            giveaway_poll_secs: 10,
            leaderboard_size: 10,
            rng_seed: None,
        }
    }
}

impl CasinoConfig {
    pub fn invite_timeout(&self) -> Duration {
        Duration::from_secs(self.invite_timeout_secs)
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }

    pub fn giveaway_poll(&self) -> Duration {
        Duration::from_secs(self.giveaway_poll_secs)
    }

    /// The fixed call size for a given buy-in, never below one chip.
    pub fn bet_unit(&self, buy_in: Chips) -> Chips {
        (buy_in.saturating_mul(self.bet_unit_percent) / 100).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bet_unit_has_a_floor() {
        let config = CasinoConfig::default();
        assert_eq!(config.bet_unit(100), 10);
        assert_eq!(config.bet_unit(5), 1);
    }
}
