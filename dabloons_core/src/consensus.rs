use crate::error::{GameError, GameResult};
use crate::state::{Chips, InvitationId, UserId};
use std::collections::HashSet;
use std::time::{Duration, Instant};

pub const MAX_OPPONENTS: usize = 3;

/// A pending challenge. No money moves until every invitee has accepted.
#[derive(Debug, Clone)]
pub struct Invitation {
    pub id: InvitationId,
    pub challenger: UserId,
    /// Opponents in the order they were named; this becomes the seat order.
    pub invited: Vec<UserId>,
    pub buy_in: Chips,
    accepted: HashSet<UserId>,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consent {
    Pending,
    /// Everyone is in; the invitation can be funded.
    Unanimous,
}

impl Invitation {
    pub fn new(
        id: InvitationId,
        challenger: UserId,
        invited: Vec<UserId>,
        buy_in: Chips,
        ttl: Duration,
    ) -> GameResult<Self> {
        if buy_in == 0 {
            return Err(GameError::InvalidAmount(buy_in));
        }
        if invited.is_empty() || invited.len() > MAX_OPPONENTS {
            return Err(GameError::OpponentCount(invited.len()));
        }
        if invited.contains(&challenger) {
            return Err(GameError::SelfChallenge);
        }
        let mut seen = HashSet::new();
        if let Some(&dup) = invited.iter().find(|&&u| !seen.insert(u)) {
            return Err(GameError::DuplicateOpponent(dup));
        }

        let expires_at = Instant::now().checked_add(ttl).ok_or(GameError::InvalidDuration)?;

        Ok(Invitation {
            id,
            challenger,
            invited,
            buy_in,
            accepted: HashSet::from([challenger]),
            expires_at,
        })
    }

    /// Challenger first, then opponents.
    pub fn participants(&self) -> Vec<UserId> {
        std::iter::once(self.challenger).chain(self.invited.iter().copied()).collect()
    }

    pub fn has_accepted(&self, user: UserId) -> bool {
        self.accepted.contains(&user)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }

    /// Records an invitee's consent.
    pub fn accept(&mut self, user: UserId) -> GameResult<Consent> {
        if !self.invited.contains(&user) {
            return Err(GameError::NotInvited(user));
        }
        if !self.accepted.insert(user) {
            return Err(GameError::AlreadyAccepted(user));
        }
        if self.accepted.len() == self.invited.len() + 1 {
            Ok(Consent::Unanimous)
        } else {
            Ok(Consent::Pending)
        }
    }

    /// Checks that `user` may call the whole thing off.
    pub fn check_decline(&self, user: UserId) -> GameResult<()> {
        if !self.invited.contains(&user) {
            return Err(GameError::NotInvited(user));
        }
        if self.accepted.contains(&user) {
            return Err(GameError::AlreadyAccepted(user));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn invite(challenger: UserId, invited: Vec<UserId>) -> GameResult<Invitation> {
        Invitation::new(Uuid::new_v4(), challenger, invited, 100, Duration::from_secs(60))
    }

    #[test]
    fn test_validation() {
        assert_eq!(invite(1, vec![]).unwrap_err(), GameError::OpponentCount(0));
        assert_eq!(invite(1, vec![2, 3, 4, 5]).unwrap_err(), GameError::OpponentCount(4));
        assert_eq!(invite(1, vec![2, 1]).unwrap_err(), GameError::SelfChallenge);
        assert_eq!(invite(1, vec![2, 3, 2]).unwrap_err(), GameError::DuplicateOpponent(2));
        let zero = Invitation::new(Uuid::new_v4(), 1, vec![2], 0, Duration::from_secs(1));
        assert_eq!(zero.unwrap_err(), GameError::InvalidAmount(0));
    }

    #[test]
    fn test_unanimous_after_every_invitee() {
        let mut inv = invite(1, vec![2, 3]).unwrap();
        assert!(inv.has_accepted(1));
        assert_eq!(inv.accept(3), Ok(Consent::Pending));
        assert_eq!(inv.accept(2), Ok(Consent::Unanimous));
        assert_eq!(inv.participants(), vec![1, 2, 3]);
    }

    #[test]
    fn test_strangers_and_repeats_are_rejected() {
        let mut inv = invite(1, vec![2, 3]).unwrap();
        assert_eq!(inv.accept(9), Err(GameError::NotInvited(9)));
        assert_eq!(inv.accept(1), Err(GameError::NotInvited(1)));
        assert_eq!(inv.accept(2), Ok(Consent::Pending));
        assert_eq!(inv.accept(2), Err(GameError::AlreadyAccepted(2)));
        assert!(!inv.has_accepted(9));
    }

    #[test]
    fn test_only_pending_invitees_may_decline() {
        let mut inv = invite(1, vec![2, 3]).unwrap();
        inv.accept(2).unwrap();
        assert_eq!(inv.check_decline(2), Err(GameError::AlreadyAccepted(2)));
        assert_eq!(inv.check_decline(7), Err(GameError::NotInvited(7)));
        assert_eq!(inv.check_decline(3), Ok(()));
    }

    #[test]
    fn test_expiry() {
        let inv = Invitation::new(Uuid::new_v4(), 1, vec![2], 100, Duration::from_secs(30)).unwrap();
        let now = Instant::now();
        assert!(!inv.is_expired(now));
        assert!(inv.is_expired(now + Duration::from_secs(31)));
        assert!(inv.remaining(now) <= Duration::from_secs(30));
    }

    #[test]
    fn test_unrepresentable_ttl_is_rejected() {
        let inv = Invitation::new(Uuid::new_v4(), 1, vec![2], 100, Duration::MAX);
        assert_eq!(inv.unwrap_err(), GameError::InvalidDuration);
    }
}
