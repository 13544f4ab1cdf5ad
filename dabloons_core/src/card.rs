use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// --- Core card types ---

/// Suit
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    Spade,
    Heart,
    Club,
    Diamond,
}

/// Rank
/// Ace plays high by default; the wheel (A-2-3-4-5) is handled by the evaluator.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

pub const SUITS: [Suit; 4] = [Suit::Spade, Suit::Heart, Suit::Club, Suit::Diamond];

pub const RANKS: [Rank; 13] = [
    Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven,
    Rank::Eight, Rank::Nine, Rank::Ten, Rank::Jack, Rank::Queen, Rank::King, Rank::Ace,
];

/// A single playing card
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Card {
        Card { rank, suit }
    }
}

/// Hand categories, weakest first.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum HandCategory {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
}

/// The strength of a five-card hand.
/// 1. Variants are declared weakest first, so the derived `Ord` compares categories.
/// 2. Each variant carries its tiebreak ranks in significance order, so ties within
///    a category resolve field by field.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Serialize, Deserialize)]
pub enum HandRank {
    HighCard(Rank, Rank, Rank, Rank, Rank),
    OnePair(Rank, Rank, Rank, Rank),        // pair, then kickers
    TwoPair(Rank, Rank, Rank),              // high pair, low pair, kicker
    ThreeOfAKind(Rank, Rank, Rank),         // trips, then kickers
    Straight(Rank),                         // top card of the straight
    Flush(Rank, Rank, Rank, Rank, Rank),
    FullHouse(Rank, Rank),                  // trips, pair
    FourOfAKind(Rank, Rank),                // quads, kicker
    StraightFlush(Rank),                    // top card; Ace means royal
}

impl HandRank {
    pub fn category(&self) -> HandCategory {
        match self {
            HandRank::HighCard(..) => HandCategory::HighCard,
            HandRank::OnePair(..) => HandCategory::OnePair,
            HandRank::TwoPair(..) => HandCategory::TwoPair,
            HandRank::ThreeOfAKind(..) => HandCategory::ThreeOfAKind,
            HandRank::Straight(..) => HandCategory::Straight,
            HandRank::Flush(..) => HandCategory::Flush,
            HandRank::FullHouse(..) => HandCategory::FullHouse,
            HandRank::FourOfAKind(..) => HandCategory::FourOfAKind,
            HandRank::StraightFlush(..) => HandCategory::StraightFlush,
        }
    }

    /// Ranks that break ties within the category, most significant first.
    pub fn tiebreak(&self) -> Vec<Rank> {
        match *self {
            HandRank::HighCard(a, b, c, d, e) | HandRank::Flush(a, b, c, d, e) => vec![a, b, c, d, e],
            HandRank::OnePair(a, b, c, d) => vec![a, b, c, d],
            HandRank::TwoPair(a, b, c) | HandRank::ThreeOfAKind(a, b, c) => vec![a, b, c],
            HandRank::FullHouse(a, b) | HandRank::FourOfAKind(a, b) => vec![a, b],
            HandRank::Straight(a) | HandRank::StraightFlush(a) => vec![a],
        }
    }
}

// --- Display helpers ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Suit::Spade => "♠",
            Suit::Heart => "♥",
            Suit::Club => "♣",
            Suit::Diamond => "♦",
        })
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

impl fmt::Display for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HandRank::HighCard(r, ..) => write!(f, "high card ({})", r),
            HandRank::OnePair(r, ..) => write!(f, "pair of {}s", r),
            HandRank::TwoPair(r1, r2, _) => write!(f, "two pair ({}s and {}s)", r1, r2),
            HandRank::ThreeOfAKind(r, ..) => write!(f, "three {}s", r),
            HandRank::Straight(r) => write!(f, "straight to {}", r),
            HandRank::Flush(r, ..) => write!(f, "{}-high flush", r),
            HandRank::FullHouse(r1, r2) => write!(f, "full house ({}s over {}s)", r1, r2),
            HandRank::FourOfAKind(r, _) => write!(f, "four {}s", r),
            HandRank::StraightFlush(Rank::Ace) => write!(f, "royal flush"),
            HandRank::StraightFlush(r) => write!(f, "straight flush to {}", r),
        }
    }
}

// --- Deck ---

/// A deck of cards, dealt from the end of the vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// A full 52-card deck in suit-major order.
    pub fn ordered() -> Deck {
        let mut cards = Vec::with_capacity(52);
        for &suit in &SUITS {
            for &rank in &RANKS {
                cards.push(Card { rank, suit });
            }
        }
        Deck { cards }
    }

    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Deck {
        let mut deck = Deck::ordered();
        deck.cards.shuffle(rng);
        deck
    }

    /// Builds a deck from an explicit card order. The last card is dealt first.
    pub fn from_cards(cards: Vec<Card>) -> Deck {
        Deck { cards }
    }

    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

// --- Hand evaluation ---

/// Finds the strongest 5-card hand among 5 to 7 cards.
///
/// Every 5-card subset is scored and the best kept; scoring six or seven
/// cards directly would let a sixth kicker or a broken straight decide the hand.
/// Returns `None` for fewer than 5 or more than 7 cards.
pub fn find_best_hand(all_cards: &[Card]) -> Option<HandRank> {
    if !(5..=7).contains(&all_cards.len()) {
        return None;
    }

    let n = all_cards.len();
    (0u32..1 << n)
        .filter(|mask| mask.count_ones() == 5)
        .map(|mask| {
            let hand: Vec<Card> = (0..n).filter(|i| mask & (1 << i) != 0).map(|i| all_cards[i]).collect();
            evaluate_5_card_hand(&hand)
        })
        .max()
}

fn evaluate_5_card_hand(hand: &[Card]) -> HandRank {
    debug_assert_eq!(hand.len(), 5);

    let mut cards = hand.to_vec();
    // high to low
    cards.sort_by(|a, b| b.rank.cmp(&a.rank));
    let ranks: Vec<Rank> = cards.iter().map(|c| c.rank).collect();

    let is_flush = cards.windows(2).all(|w| w[0].suit == w[1].suit);

    let is_wheel = ranks == [Rank::Ace, Rank::Five, Rank::Four, Rank::Three, Rank::Two];
    let is_straight = is_wheel || ranks.windows(2).all(|w| w[0] as u8 == w[1] as u8 + 1);
    let high_card = if is_wheel { Rank::Five } else { ranks[0] };

    if is_straight && is_flush {
        return HandRank::StraightFlush(high_card);
    }

    let mut counts: HashMap<Rank, u8> = HashMap::new();
    for rank in &ranks {
        *counts.entry(*rank).or_insert(0) += 1;
    }

    // (count, rank), biggest group first, then by rank
    let mut groups: Vec<(u8, Rank)> = counts.into_iter().map(|(r, c)| (c, r)).collect();
    groups.sort_by(|a, b| b.cmp(a));

    match groups[0].0 {
        4 => HandRank::FourOfAKind(groups[0].1, groups[1].1),
        3 if groups[1].0 == 2 => HandRank::FullHouse(groups[0].1, groups[1].1),
        3 => HandRank::ThreeOfAKind(groups[0].1, groups[1].1, groups[2].1),
        2 if groups[1].0 == 2 => HandRank::TwoPair(groups[0].1, groups[1].1, groups[2].1),
        2 => HandRank::OnePair(groups[0].1, groups[1].1, groups[2].1, groups[3].1),
        _ if is_flush => HandRank::Flush(ranks[0], ranks[1], ranks[2], ranks[3], ranks[4]),
        _ if is_straight => HandRank::Straight(high_card),
        _ => HandRank::HighCard(ranks[0], ranks[1], ranks[2], ranks[3], ranks[4]),
    }
}
