//! Trick resolution: higher power wins; ties broken by suit under the
//! fixed total order Clubs < Diamonds < Hearts < Spades (so Spades wins
//! suit ties, matching [`crate::protocol::Suit`]'s derived ordering).

use crate::protocol::Card;

/// Outcome of comparing the two cards played in a trick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrickOutcome {
    /// Player one's card wins.
    FirstWins,
    /// Player two's card wins.
    SecondWins,
    /// Equal power and equal suit: impossible for two distinct minted
    /// cards in practice, but resolved as a tie that keeps the current
    /// turn owner.
    Tie,
}

/// Resolves a trick between the card played by the current turn owner
/// (`first`) and the card played by the other player (`second`).
pub fn resolve(first: &Card, second: &Card) -> TrickOutcome {
    if first.power != second.power {
        if first.power > second.power {
            TrickOutcome::FirstWins
        } else {
            TrickOutcome::SecondWins
        }
    } else if first.suit != second.suit {
        if first.suit > second.suit {
            TrickOutcome::FirstWins
        } else {
            TrickOutcome::SecondWins
        }
    } else {
        TrickOutcome::Tie
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Rarity, Suit};

    fn card(power: u32, suit: Suit) -> Card {
        Card {
            id: "x".into(),
            name: "x".into(),
            suit,
            power,
            rarity: Rarity::Common,
        }
    }

    #[test]
    fn higher_power_wins() {
        let a = card(10, Suit::Clubs);
        let b = card(5, Suit::Spades);
        assert_eq!(resolve(&a, &b), TrickOutcome::FirstWins);
    }

    #[test]
    fn equal_power_breaks_on_suit() {
        let a = card(10, Suit::Clubs);
        let b = card(10, Suit::Spades);
        assert_eq!(resolve(&a, &b), TrickOutcome::SecondWins);
    }

    #[test]
    fn spades_beats_hearts_beats_diamonds_beats_clubs() {
        assert_eq!(
            resolve(&card(1, Suit::Spades), &card(1, Suit::Hearts)),
            TrickOutcome::FirstWins
        );
        assert_eq!(
            resolve(&card(1, Suit::Hearts), &card(1, Suit::Diamonds)),
            TrickOutcome::FirstWins
        );
        assert_eq!(
            resolve(&card(1, Suit::Diamonds), &card(1, Suit::Clubs)),
            TrickOutcome::FirstWins
        );
    }
}
