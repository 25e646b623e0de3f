use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

use crate::raffle_error::RaffleError;

/// Entrants and pot of the current round.
///
/// Entrants are kept in entry order and may repeat. The pot is the sum of the
/// payments recorded since the last reset.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq)]
pub struct EntryLedger {
    entrants: Vec<Pubkey>,
    pot: u64,
}

impl EntryLedger {
    /// Appends `entrant` and adds `paid` to the pot.
    pub(crate) fn record(
        &mut self,
        entrant: Pubkey,
        paid: u64,
        capacity: u32,
    ) -> Result<u64, RaffleError> {
        if self.entrants.len() >= capacity as usize {
            return Err(RaffleError::RaffleFull);
        }
        let pot = self.pot.checked_add(paid).ok_or(RaffleError::Overflow)?;

        self.entrants.push(entrant);
        self.pot = pot;
        Ok(self.count() - 1)
    }

    pub fn entrant_at(&self, index: u64) -> Result<&Pubkey, RaffleError> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.entrants.get(index))
            .ok_or(RaffleError::IndexOutOfRange)
    }

    pub fn count(&self) -> u64 {
        self.entrants.len() as u64
    }

    pub fn pot(&self) -> u64 {
        self.pot
    }

    pub fn entrants(&self) -> &[Pubkey] {
        &self.entrants
    }

    /// Empties the ledger and returns the pot it held.
    pub(crate) fn reset(&mut self) -> u64 {
        self.entrants.clear();
        std::mem::take(&mut self.pot)
    }
}
