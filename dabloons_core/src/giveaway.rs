use crate::error::{GameError, GameResult};
use crate::state::{Chips, GiveawayId, UserId};
use rand::Rng;
use rand::seq::SliceRandom;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Giveaway {
    pub id: GiveawayId,
    pub host: UserId,
    /// Paid to each winner
    pub amount: Chips,
    pub winners: usize,
    pub entries: Vec<UserId>,
    pub ends_at: Instant,
}

impl Giveaway {
    pub fn new(id: GiveawayId, host: UserId, amount: Chips, duration: Duration, winners: usize) -> GameResult<Self> {
        if amount == 0 {
            return Err(GameError::InvalidAmount(amount));
        }
        if winners == 0 {
            return Err(GameError::InvalidAmount(0));
        }
        if duration.is_zero() {
            return Err(GameError::InvalidDuration);
        }
        let ends_at = Instant::now().checked_add(duration).ok_or(GameError::InvalidDuration)?;
        Ok(Giveaway {
            id,
            host,
            amount,
            winners,
            entries: Vec::new(),
            ends_at,
        })
    }

    pub fn enter(&mut self, user: UserId) -> GameResult<()> {
        if self.entries.contains(&user) {
            return Err(GameError::AlreadyEntered);
        }
        self.entries.push(user);
        Ok(())
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.ends_at
    }

    /// Picks up to `winners` distinct entrants.
    pub fn draw_winners<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<UserId> {
        let mut pool = self.entries.clone();
        pool.shuffle(rng);
        pool.truncate(self.winners);
        pool
    }
}
