//! Single-player blackjack against a dealer who draws to 17.

use crate::card::{Card, Deck, Rank};
use crate::error::{GameError, GameResult};
use crate::state::Chips;
use serde::{Deserialize, Serialize};

const DEALER_STANDS_ON: u8 = 17;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlackjackOutcome {
    Win,
    Lose,
    Tie,
    Bust,
}

impl BlackjackOutcome {
    /// What the house pays back on a bet that was taken up front.
    pub fn payout(self, bet: Chips) -> Chips {
        match self {
            BlackjackOutcome::Win => bet * 2,
            BlackjackOutcome::Tie => bet,
            BlackjackOutcome::Lose | BlackjackOutcome::Bust => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlackjackGame {
    pub bet: Chips,
    pub player: Vec<Card>,
    pub dealer: Vec<Card>,
    deck: Deck,
}

/// Best total for a hand: aces count 11, dropping to 1 while the hand is over 21.
pub fn hand_value(hand: &[Card]) -> u8 {
    let mut total: u8 = 0;
    let mut aces = 0;
    for card in hand {
        total += match card.rank {
            Rank::Jack | Rank::Queen | Rank::King => 10,
            Rank::Ace => {
                aces += 1;
                11
            }
            pip => pip as u8 + 2,
        };
    }
    while total > 21 && aces > 0 {
        total -= 10;
        aces -= 1;
    }
    total
}

impl BlackjackGame {
    pub fn deal(bet: Chips, mut deck: Deck) -> GameResult<Self> {
        let mut draw = || deck.draw().ok_or(GameError::DeckExhausted);
        let player = vec![draw()?, draw()?];
        let dealer = vec![draw()?, draw()?];
        Ok(BlackjackGame { bet, player, dealer, deck })
    }

    pub fn player_value(&self) -> u8 {
        hand_value(&self.player)
    }

    pub fn dealer_value(&self) -> u8 {
        hand_value(&self.dealer)
    }

    /// The card the dealer shows while the hand is live.
    pub fn dealer_up(&self) -> Card {
        self.dealer[1]
    }

    /// Draws one card. Returns `Some(Bust)` once the player is over 21.
    pub fn hit(&mut self) -> GameResult<Option<BlackjackOutcome>> {
        let card = self.deck.draw().ok_or(GameError::DeckExhausted)?;
        self.player.push(card);
        if self.player_value() > 21 {
            return Ok(Some(BlackjackOutcome::Bust));
        }
        Ok(None)
    }

    /// Plays out the dealer and compares totals.
    pub fn stand(&mut self) -> GameResult<BlackjackOutcome> {
        while self.dealer_value() < DEALER_STANDS_ON {
            let card = self.deck.draw().ok_or(GameError::DeckExhausted)?;
            self.dealer.push(card);
        }

        let (player, dealer) = (self.player_value(), self.dealer_value());
        Ok(if dealer > 21 || player > dealer {
            BlackjackOutcome::Win
        } else if player < dealer {
            BlackjackOutcome::Lose
        } else {
            BlackjackOutcome::Tie
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Rank::*;
    use crate::card::Suit::*;
    use crate::logic::tests::stacked;

    fn card(rank: Rank) -> Card {
        Card::new(rank, Heart)
    }

    #[test]
    fn test_hand_value_softens_aces() {
        assert_eq!(hand_value(&[card(Ace), card(King)]), 21);
        assert_eq!(hand_value(&[card(Ace), Card::new(Ace, Spade), card(Nine)]), 21);
        assert_eq!(hand_value(&[card(Ace), card(Nine), card(Five)]), 15);
        assert_eq!(hand_value(&[card(Ten), card(Two)]), 12);
    }

    #[test]
    fn test_bust_on_hit() {
        let deck = stacked(&[card(Ten), card(Six), card(Nine), card(Eight), card(King)]);
        let mut game = BlackjackGame::deal(50, deck).unwrap();
        assert_eq!(game.player_value(), 16);
        assert_eq!(game.dealer_up(), card(Eight));
        assert_eq!(game.hit().unwrap(), Some(BlackjackOutcome::Bust));
        assert_eq!(BlackjackOutcome::Bust.payout(50), 0);
    }

    #[test]
    fn test_dealer_draws_to_seventeen() {
        // dealer 10 + 5 draws a 9 and busts
        let deck = stacked(&[card(Ten), card(Nine), Card::new(Ten, Spade), card(Five), Card::new(Nine, Club)]);
        let mut game = BlackjackGame::deal(50, deck).unwrap();
        assert_eq!(game.stand().unwrap(), BlackjackOutcome::Win);
        assert_eq!(game.dealer.len(), 3);
        assert_eq!(BlackjackOutcome::Win.payout(50), 100);
    }

    #[test]
    fn test_equal_totals_tie() {
        let deck = stacked(&[card(Ten), card(Eight), card(Nine), Card::new(Nine, Club)]);
        let mut game = BlackjackGame::deal(50, deck).unwrap();
        assert_eq!(game.stand().unwrap(), BlackjackOutcome::Tie);
        assert_eq!(BlackjackOutcome::Tie.payout(50), 50);
    }
}
