//! Property tests for the deck and the hand evaluator.
use dabloons_core::{Card, Deck, HandRank, find_best_hand};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashSet;

// Distinct cards come from the top of a seeded shuffle, so no filtering is needed.
fn cards_strategy(n: usize) -> impl Strategy<Value = Vec<Card>> {
    any::<u64>().prop_map(move |seed| {
        let mut deck = Deck::shuffled(&mut StdRng::seed_from_u64(seed));
        (0..n).filter_map(|_| deck.draw()).collect()
    })
}

fn five_card_subsets(cards: &[Card]) -> Vec<Vec<Card>> {
    let n = cards.len();
    let mut out = Vec::new();
    for mask in 0u32..(1 << n) {
        if mask.count_ones() == 5 {
            out.push((0..n).filter(|i| mask & (1 << i) != 0).map(|i| cards[i]).collect());
        }
    }
    out
}

proptest! {
    #[test]
    fn test_shuffle_is_a_permutation(seed in any::<u64>()) {
        let deck = Deck::shuffled(&mut StdRng::seed_from_u64(seed));
        prop_assert_eq!(deck.len(), 52);

        let unique: HashSet<Card> = deck.cards().iter().copied().collect();
        let ordered: HashSet<Card> = Deck::ordered().cards().iter().copied().collect();
        prop_assert_eq!(unique, ordered);
    }

    #[test]
    fn test_best_of_seven_beats_every_subset(cards in cards_strategy(7)) {
        let best = find_best_hand(&cards).unwrap();
        let subsets = five_card_subsets(&cards);
        prop_assert_eq!(subsets.len(), 21);

        let ranks: Vec<HandRank> = subsets.iter().map(|s| find_best_hand(s).unwrap()).collect();
        prop_assert!(ranks.iter().all(|r| *r <= best));
        prop_assert!(ranks.contains(&best));
    }

    #[test]
    fn test_evaluation_ignores_card_order(cards in cards_strategy(7)) {
        let mut reversed = cards.clone();
        reversed.reverse();
        prop_assert_eq!(find_best_hand(&cards), find_best_hand(&reversed));
    }

    #[test]
    fn test_category_decides_before_tiebreak(a in cards_strategy(5), b in cards_strategy(5)) {
        let (ra, rb) = (find_best_hand(&a).unwrap(), find_best_hand(&b).unwrap());
        if ra.category() != rb.category() {
            prop_assert_eq!(ra.category() < rb.category(), ra < rb);
        } else {
            prop_assert_eq!(ra.tiebreak().cmp(&rb.tiebreak()), ra.cmp(&rb));
        }
    }

    #[test]
    fn test_too_few_or_too_many_cards(n in prop_oneof![0usize..5, 8usize..12]) {
        let mut deck = Deck::ordered();
        let cards: Vec<Card> = (0..n).filter_map(|_| deck.draw()).collect();
        prop_assert!(find_best_hand(&cards).is_none());
    }
}
