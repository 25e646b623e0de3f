use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo,
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};
use std::convert::TryFrom;

use crate::raffle_ledger::EntryLedger;

/// Upper bound for `Config::max_entrants`
pub const MAX_ENTRANTS_LIMIT: u32 = 1000;
/// Escrowed payouts a raffle can hold before failures propagate again
pub const MAX_UNDELIVERED: usize = 4;

/// Status of the current round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Entries accepted, no draw pending
    Open,
    /// Entries rejected, waiting for the coordinator callback
    Drawing,
}

impl Default for RaffleState {
    fn default() -> Self {
        RaffleState::Open
    }
}

impl From<RaffleState> for u8 {
    fn from(state: RaffleState) -> Self {
        match state {
            RaffleState::Open => 0,
            RaffleState::Drawing => 1,
        }
    }
}

/// What happens when the prize transfer fails
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayoutPolicy {
    /// Fail the fulfillment with `PayoutFailed`
    Propagate,
    /// Keep the prize in escrow for `RetryPayout`
    Escrow,
}

impl TryFrom<u8> for PayoutPolicy {
    type Error = ProgramError;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(PayoutPolicy::Propagate),
            1 => Ok(PayoutPolicy::Escrow),
            _ => Err(ProgramError::InvalidAccountData),
        }
    }
}

impl From<PayoutPolicy> for u8 {
    fn from(policy: PayoutPolicy) -> Self {
        match policy {
            PayoutPolicy::Propagate => 0,
            PayoutPolicy::Escrow => 1,
        }
    }
}

/// In-flight randomness request of the current round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingDraw {
    /// Identifier issued by the coordinator
    pub request_id: u64,
    /// When the draw was triggered
    pub requested_at: UnixTimestamp,
    /// Entrant count snapshot used for winner selection
    pub entrant_count: u64,
}

/// Prize that could not be transferred and waits for `RetryPayout`
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct UndeliveredPayout {
    pub winner: Pubkey,
    pub amount: u64,
    pub round: u64,
}

/// Raffle account data
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq)]
pub struct Raffle {
    pub(crate) is_initialized: bool,
    pub(crate) state: RaffleState,
    pub(crate) ledger: EntryLedger,
    pub(crate) pending_draw: Option<PendingDraw>,
    /// Start of the current round
    pub(crate) last_timestamp: UnixTimestamp,
    pub(crate) recent_winner: Option<Pubkey>,
    /// Completed rounds
    pub(crate) round: u64,
    pub(crate) undelivered: Vec<UndeliveredPayout>,
}

impl Raffle {
    /// Account size needed to hold `max_entrants` entries
    pub fn space(max_entrants: u32) -> usize {
        1 // is_initialized
            + 1 // state
            + 4 + 32 * max_entrants as usize + 8 // ledger
            + 1 + 8 + 8 + 8 // pending_draw
            + 8 // last_timestamp
            + 1 + 32 // recent_winner
            + 8 // round
            + 4 + MAX_UNDELIVERED * (32 + 8 + 8)
    }

    pub fn load(raffle_info: &AccountInfo) -> Result<Self, ProgramError> {
        let data = raffle_info.try_borrow_data()?;
        Self::deserialize(&mut &data[..]).map_err(|_| ProgramError::InvalidAccountData)
    }

    pub fn save(&self, raffle_info: &AccountInfo) -> ProgramResult {
        let mut data = raffle_info.try_borrow_mut_data()?;
        let mut writer: &mut [u8] = &mut data[..];
        self.serialize(&mut writer)
            .map_err(|_| ProgramError::AccountDataTooSmall)
    }

    pub fn state(&self) -> RaffleState {
        self.state
    }

    pub fn pot(&self) -> u64 {
        self.ledger.pot()
    }

    pub fn number_of_players(&self) -> u64 {
        self.ledger.count()
    }

    pub fn entrants(&self) -> &[Pubkey] {
        self.ledger.entrants()
    }

    pub fn pending_draw(&self) -> Option<&PendingDraw> {
        self.pending_draw.as_ref()
    }

    pub fn last_timestamp(&self) -> UnixTimestamp {
        self.last_timestamp
    }

    pub fn recent_winner(&self) -> Option<Pubkey> {
        self.recent_winner
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn undelivered(&self) -> &[UndeliveredPayout] {
        &self.undelivered
    }

    /// Lamports held for escrowed prizes
    pub fn undelivered_total(&self) -> u64 {
        self.undelivered.iter().map(|payout| payout.amount).sum()
    }
}

impl IsInitialized for Raffle {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

/// Per-raffle configuration account, fixed after initialization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Raffle account this config belongs to
    pub raffle: Pubkey,
    /// VRF coordinator program
    pub coordinator: Pubkey,
    /// Coordinator subscription paying for requests
    pub subscription: Pubkey,
    /// Gas lane / randomness source selector
    pub key_hash: [u8; 32],
    /// Minimum payment to enter, in lamports
    pub entrance_fee: u64,
    /// Minimum seconds between draws
    pub interval: u64,
    /// Confirmation depth requested from the coordinator
    pub request_confirmations: u16,
    /// Compute budget granted to the fulfillment callback
    pub callback_compute_limit: u32,
    /// Random words per request
    pub num_words: u32,
    /// Ledger capacity of the raffle account
    pub max_entrants: u32,
    /// Behaviour on a failed prize transfer
    pub payout_policy: u8,
    /// Config PDA bump
    pub bump: u8,
}

impl Config {
    pub fn entrance_fee(&self) -> u64 {
        self.entrance_fee
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn key_hash(&self) -> &[u8; 32] {
        &self.key_hash
    }

    pub fn coordinator(&self) -> &Pubkey {
        &self.coordinator
    }

    pub fn subscription(&self) -> &Pubkey {
        &self.subscription
    }

    pub fn request_confirmations(&self) -> u16 {
        self.request_confirmations
    }

    pub fn callback_compute_limit(&self) -> u32 {
        self.callback_compute_limit
    }

    pub fn num_words(&self) -> u32 {
        self.num_words
    }

    pub fn max_entrants(&self) -> u32 {
        self.max_entrants
    }

    pub fn payout_policy(&self) -> Result<PayoutPolicy, ProgramError> {
        PayoutPolicy::try_from(self.payout_policy)
    }
}

impl Sealed for Config {}

impl IsInitialized for Config {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for Config {
    const LEN: usize = 1 + 32 + 32 + 32 + 32 + 8 + 8 + 2 + 4 + 4 + 4 + 1 + 1;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Config::LEN];
        let (
            is_initialized,
            raffle,
            coordinator,
            subscription,
            key_hash,
            entrance_fee,
            interval,
            request_confirmations,
            callback_compute_limit,
            num_words,
            max_entrants,
            payout_policy,
            bump,
        ) = array_refs![src, 1, 32, 32, 32, 32, 8, 8, 2, 4, 4, 4, 1, 1];

        let is_initialized = match is_initialized {
            [0] => false,
            [1] => true,
            _ => return Err(ProgramError::InvalidAccountData),
        };

        Ok(Config {
            is_initialized,
            raffle: Pubkey::new_from_array(*raffle),
            coordinator: Pubkey::new_from_array(*coordinator),
            subscription: Pubkey::new_from_array(*subscription),
            key_hash: *key_hash,
            entrance_fee: u64::from_le_bytes(*entrance_fee),
            interval: u64::from_le_bytes(*interval),
            request_confirmations: u16::from_le_bytes(*request_confirmations),
            callback_compute_limit: u32::from_le_bytes(*callback_compute_limit),
            num_words: u32::from_le_bytes(*num_words),
            max_entrants: u32::from_le_bytes(*max_entrants),
            payout_policy: payout_policy[0],
            bump: bump[0],
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Config::LEN];
        let (
            is_initialized_dst,
            raffle_dst,
            coordinator_dst,
            subscription_dst,
            key_hash_dst,
            entrance_fee_dst,
            interval_dst,
            request_confirmations_dst,
            callback_compute_limit_dst,
            num_words_dst,
            max_entrants_dst,
            payout_policy_dst,
            bump_dst,
        ) = mut_array_refs![dst, 1, 32, 32, 32, 32, 8, 8, 2, 4, 4, 4, 1, 1];

        is_initialized_dst[0] = self.is_initialized as u8;
        raffle_dst.copy_from_slice(self.raffle.as_ref());
        coordinator_dst.copy_from_slice(self.coordinator.as_ref());
        subscription_dst.copy_from_slice(self.subscription.as_ref());
        *key_hash_dst = self.key_hash;
        *entrance_fee_dst = self.entrance_fee.to_le_bytes();
        *interval_dst = self.interval.to_le_bytes();
        *request_confirmations_dst = self.request_confirmations.to_le_bytes();
        *callback_compute_limit_dst = self.callback_compute_limit.to_le_bytes();
        *num_words_dst = self.num_words.to_le_bytes();
        *max_entrants_dst = self.max_entrants.to_le_bytes();
        payout_policy_dst[0] = self.payout_policy;
        bump_dst[0] = self.bump;
    }
}
