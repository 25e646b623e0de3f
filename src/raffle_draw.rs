use solana_program::pubkey::Pubkey;

use crate::raffle_error::RaffleError;
use crate::raffle_state::Raffle;
use crate::vrf::{winner_index, NUM_WORDS};

/// Prize owed to the winner of a resolved draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WinnerPayout {
    pub winner: Pubkey,
    pub amount: u64,
    pub winner_index: u64,
    pub request_id: u64,
    /// Round being settled, counted from zero
    pub round: u64,
}

/// Matches a fulfillment against the pending draw and selects the winner.
///
/// Only reads the raffle: a rejected fulfillment leaves no trace, and the
/// caller commits the round reset before any prize moves.
pub fn resolve_draw(
    raffle: &Raffle,
    request_id: u64,
    random_words: &[[u8; 32]],
) -> Result<WinnerPayout, RaffleError> {
    let pending = match raffle.pending_draw() {
        Some(pending) if pending.request_id == request_id => pending,
        _ => return Err(RaffleError::UnknownRequest),
    };
    if random_words.len() != NUM_WORDS as usize {
        return Err(RaffleError::InvalidInstructionData);
    }

    let index = winner_index(&random_words[0], pending.entrant_count);
    let winner = *raffle.ledger.entrant_at(index)?;

    Ok(WinnerPayout {
        winner,
        amount: raffle.pot(),
        winner_index: index,
        request_id,
        round: raffle.round(),
    })
}
