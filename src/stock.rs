//! C3 -- StockAuthority: a globally-unique card inventory owned
//! exclusively by the cluster leader.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::protocol::{Card, Rarity, Suit};

/// Fixed-size bundle of cards drawn from the stock on a purchase.
pub const PACK_SIZE: usize = 5;

const CARD_NAMES: [&str; 16] = [
    "Sentinel", "Wyrm", "Ironclad", "Raven", "Juggernaut", "Wisp", "Golem",
    "Phantom", "Paladin", "Marauder", "Oracle", "Reaper", "Herald", "Colossus",
    "Trickster", "Warden",
];

fn rarity_counts(rarity: Rarity) -> u32 {
    match rarity {
        Rarity::Common => 100,
        Rarity::Uncommon => 50,
        Rarity::Rare => 20,
        Rarity::Legendary => 5,
    }
}

fn rarity_power_range(rarity: Rarity) -> (u32, u32) {
    match rarity {
        Rarity::Common => (1, 50),
        Rarity::Uncommon => (51, 80),
        Rarity::Rare => (81, 100),
        Rarity::Legendary => (101, 120),
    }
}

fn suits() -> [Suit; 4] {
    [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades]
}

/// Read-only bucket counts, exposed for operational visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockStatus {
    pub common: usize,
    pub uncommon: usize,
    pub rare: usize,
    pub legendary: usize,
    pub total: usize,
}

struct Buckets {
    common: Vec<Card>,
    uncommon: Vec<Card>,
    rare: Vec<Card>,
    legendary: Vec<Card>,
}

/// The leader-owned card inventory. `DrawPack` is the only mutating
/// operation; everything else is deterministic seeding or read-only
/// introspection.
pub struct StockAuthority {
    buckets: Mutex<Buckets>,
    fresh_id_counter: AtomicU64,
}

impl StockAuthority {
    /// Seeds all four rarity buckets deterministically: every card name
    /// crossed with every suit, with power sampled uniformly within the
    /// rarity's value range and truncated/repeated to match each
    /// rarity's target count.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        use rand::Rng;

        let mut make_bucket = |rarity: Rarity| -> Vec<Card> {
            let (lo, hi) = rarity_power_range(rarity);
            let count = rarity_counts(rarity);
            let mut bucket = Vec::with_capacity(count as usize);
            for i in 0..count {
                let name = CARD_NAMES[(i as usize) % CARD_NAMES.len()];
                let suit = suits()[(i as usize / CARD_NAMES.len()) % 4];
                let power = rng.gen_range(lo..=hi);
                bucket.push(Card {
                    id: format!("{:?}-{}-{}", rarity, i, uuid_like(&mut rng)),
                    name: name.to_string(),
                    suit,
                    power,
                    rarity,
                });
            }
            bucket
        };

        StockAuthority {
            buckets: Mutex::new(Buckets {
                common: make_bucket(Rarity::Common),
                uncommon: make_bucket(Rarity::Uncommon),
                rare: make_bucket(Rarity::Rare),
                legendary: make_bucket(Rarity::Legendary),
            }),
            fresh_id_counter: AtomicU64::new(0),
        }
    }

    /// Samples a rarity per fixed weights (C:70, U:20, R:9, L:1 out of
    /// 100) and pops one card from the corresponding bucket, falling
    /// through to the next lower rarity if it's empty. If every bucket is
    /// exhausted, synthesizes a deterministic Common card.
    fn draw_one(&self) -> Card {
        use rand::Rng;
        let roll: u8 = rand::thread_rng().gen_range(0..100);
        let target = if roll < 70 {
            Rarity::Common
        } else if roll < 90 {
            Rarity::Uncommon
        } else if roll < 99 {
            Rarity::Rare
        } else {
            Rarity::Legendary
        };

        let mut buckets = self.buckets.lock().unwrap();
        let popped = match target {
            Rarity::Legendary => buckets
                .legendary
                .pop()
                .or_else(|| buckets.rare.pop())
                .or_else(|| buckets.uncommon.pop())
                .or_else(|| buckets.common.pop()),
            Rarity::Rare => buckets
                .rare
                .pop()
                .or_else(|| buckets.uncommon.pop())
                .or_else(|| buckets.common.pop()),
            Rarity::Uncommon => {
                buckets.uncommon.pop().or_else(|| buckets.common.pop())
            }
            Rarity::Common => buckets.common.pop(),
        };
        drop(buckets);

        popped.unwrap_or_else(|| self.synth_common())
    }

    fn synth_common(&self) -> Card {
        let n = self.fresh_id_counter.fetch_add(1, Ordering::Relaxed);
        Card {
            id: format!("synth-{}", n),
            name: CARD_NAMES[(n as usize) % CARD_NAMES.len()].to_string(),
            suit: suits()[(n as usize) % 4],
            power: 1,
            rarity: Rarity::Common,
        }
    }

    /// Draws `n` cards under a single lock acquisition per card.
    pub fn draw_pack(&self, n: usize) -> Vec<Card> {
        (0..n).map(|_| self.draw_one()).collect()
    }

    pub fn status(&self) -> StockStatus {
        let b = self.buckets.lock().unwrap();
        StockStatus {
            common: b.common.len(),
            uncommon: b.uncommon.len(),
            rare: b.rare.len(),
            legendary: b.legendary.len(),
            total: b.common.len() + b.uncommon.len() + b.rare.len() + b.legendary.len(),
        }
    }
}

impl Default for StockAuthority {
    fn default() -> Self {
        Self::new()
    }
}

fn uuid_like(rng: &mut impl rand::Rng) -> u64 {
    rng.gen()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_pack_returns_requested_count() {
        let stock = StockAuthority::new();
        let pack = stock.draw_pack(PACK_SIZE);
        assert_eq!(pack.len(), PACK_SIZE);
    }

    #[test]
    fn drawn_cards_have_unique_ids_within_a_pack() {
        let stock = StockAuthority::new();
        let pack = stock.draw_pack(20);
        let mut ids: Vec<_> = pack.iter().map(|c| c.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), pack.len());
    }

    #[test]
    fn status_total_matches_sum_of_buckets() {
        let stock = StockAuthority::new();
        let status = stock.status();
        assert_eq!(
            status.total,
            status.common + status.uncommon + status.rare + status.legendary
        );
    }

    #[test]
    fn exhausted_buckets_fall_through_then_synthesize() {
        let stock = StockAuthority::new();
        let total = stock.status().total;
        let drawn = stock.draw_pack(total + 5);
        assert_eq!(drawn.len(), total + 5);
        assert_eq!(stock.status().total, 0);
    }
}
