use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;

use super::chemistry::Metal;
use super::effects::{ChanceCard, ChanceCardId, ChanceKind};

/// Every kind of chance card, each equally likely on a deal.
pub static CHANCE_CATALOG: Lazy<Vec<ChanceKind>> = Lazy::new(|| {
    Metal::ALL
        .iter()
        .map(|&metal| ChanceKind::SwapElectrode { metal })
        .chain(std::iter::once(ChanceKind::ReversePolarity))
        .collect()
});

/// Draws `size` electrodes uniformly, rerolling any hand that holds more than
/// `max_duplicates` of one metal. Callers must keep the limit satisfiable.
pub fn draw_electrode_hand<R: Rng + ?Sized>(
    rng: &mut R,
    size: usize,
    max_duplicates: usize,
) -> Vec<Metal> {
    loop {
        let hand: Vec<Metal> = (0..size)
            .filter_map(|_| Metal::ALL.choose(rng).copied())
            .collect();
        let overfull = Metal::ALL.iter().any(|metal| {
            hand.iter().filter(|&&drawn| drawn == *metal).count() > max_duplicates
        });
        if !overfull {
            return hand;
        }
    }
}

/// Deals `count` cards with replacement, numbering them from `next_id`.
pub fn deal_chance_cards<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    next_id: &mut ChanceCardId,
) -> Vec<ChanceCard> {
    (0..count)
        .filter_map(|_| {
            let kind = *CHANCE_CATALOG.choose(rng)?;
            let card = ChanceCard::new(*next_id, kind);
            *next_id += 1;
            Some(card)
        })
        .collect()
}
