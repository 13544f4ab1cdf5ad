//! Showdown and pot distribution.
//!
//! Winners split the pot evenly. The odd chips left by an uneven split stay
//! with the house and are reported as `house_remainder`.

use crate::card::{Card, HandRank, find_best_hand};
use crate::error::{GameError, GameResult};
use crate::message::ShowdownResult;
use crate::state::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One participant's line in the profit report.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub player_id: UserId,
    pub contributed: Chips,
    pub received: Chips,
    /// received - contributed
    pub net: i64,
    pub folded: bool,
    pub hand_rank: Option<HandRank>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SettlementReport {
    pub pot: Chips,
    pub winners: Vec<UserId>,
    pub house_remainder: Chips,
    pub lines: Vec<ReportLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Credits owed to winners, in seat order
    pub payouts: Vec<(UserId, Chips)>,
    /// Empty when the pot went uncontested
    pub showdown: Vec<ShowdownResult>,
    pub report: SettlementReport,
}

impl Session {
    /// Decides the winners of a session at showdown and marks it settled.
    ///
    /// Calling this twice fails with `AlreadySettled`, so payouts can only be
    /// produced once.
    pub fn settle(&mut self) -> GameResult<Settlement> {
        let settlement = self.settlement()?;
        self.mark_settled(&settlement);
        Ok(settlement)
    }

    /// Computes the settlement without changing the session.
    ///
    /// A lone remaining player takes the pot without showing. Otherwise every
    /// active hand is ranked against the full board.
    pub fn settlement(&self) -> GameResult<Settlement> {
        match self.phase {
            SessionPhase::Showdown => {}
            SessionPhase::Settled | SessionPhase::Cancelled => return Err(GameError::AlreadySettled),
            _ => return Err(GameError::NotAtShowdown),
        }

        let contenders: Vec<usize> = (0..self.players.len()).filter(|&i| self.players[i].is_active()).collect();

        let mut ranks: Vec<Option<HandRank>> = vec![None; self.players.len()];
        let winners: Vec<usize> = if contenders.len() == 1 {
            contenders.clone()
        } else {
            for &i in &contenders {
                let (a, b) = self.hands[i];
                let mut cards: Vec<Card> = self.board.clone();
                cards.extend([a, b]);
                ranks[i] = Some(find_best_hand(&cards).ok_or(GameError::NotAtShowdown)?);
            }
            let best = contenders.iter().filter_map(|&i| ranks[i].clone()).max();
            contenders.iter().copied().filter(|&i| ranks[i] == best).collect()
        };

        let share = self.pot / winners.len() as Chips;
        let house_remainder = self.pot % winners.len() as Chips;

        let payouts: Vec<(UserId, Chips)> = winners.iter().map(|&i| (self.players[i].id, share)).collect();

        let lines = self
            .players
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let received = if winners.contains(&i) { share } else { 0 };
                ReportLine {
                    player_id: p.id,
                    contributed: p.contributed,
                    received,
                    net: received as i64 - p.contributed as i64,
                    folded: !p.is_active(),
                    hand_rank: ranks[i].clone(),
                }
            })
            .collect();

        let showdown = contenders
            .iter()
            .filter_map(|&i| {
                ranks[i].clone().map(|hand_rank| ShowdownResult {
                    player_id: self.players[i].id,
                    cards: self.hands[i],
                    hand_rank,
                })
            })
            .collect();

        let winner_ids: Vec<UserId> = payouts.iter().map(|&(id, _)| id).collect();
        Ok(Settlement {
            payouts,
            showdown,
            report: SettlementReport {
                pot: self.pot,
                winners: winner_ids,
                house_remainder,
                lines,
            },
        })
    }

    /// Closes the session once its payouts have been credited.
    pub fn mark_settled(&mut self, settlement: &Settlement) {
        self.phase = SessionPhase::Settled;
        let report = &settlement.report;
        info!(session = %self.id, pot = report.pot, winners = ?report.winners, house_remainder = report.house_remainder, "session settled");
    }
}
