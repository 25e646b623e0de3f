// VRF coordinator integration: outbound randomness requests and winner math
use solana_program::{
    account_info::AccountInfo,
    instruction::{AccountMeta, Instruction},
    msg,
    program::{get_return_data, invoke},
    program_error::ProgramError,
    pubkey::Pubkey,
};
use std::mem::size_of;

use crate::raffle_error::RaffleError;
use crate::raffle_state::Config;

/// Random words requested per draw
pub const NUM_WORDS: u32 = 1;
/// Seed of the coordinator PDA that signs fulfillment callbacks
pub const COORDINATOR_AUTHORITY_SEED: &[u8] = b"coordinator";

/// Parameters of one randomness request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomWordsRequest {
    pub key_hash: [u8; 32],
    pub subscription: Pubkey,
    pub minimum_confirmations: u16,
    pub callback_compute_limit: u32,
    pub num_words: u32,
}

impl RandomWordsRequest {
    pub fn from_config(config: &Config) -> Self {
        Self {
            key_hash: *config.key_hash(),
            subscription: *config.subscription(),
            minimum_confirmations: config.request_confirmations(),
            callback_compute_limit: config.callback_compute_limit(),
            num_words: config.num_words(),
        }
    }
}

/// Instructions understood by a VRF coordinator program
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoordinatorInstruction {
    /// Request random words, billed to a subscription.
    /// Answers with the request id as 8 little-endian bytes of return data.
    ///
    /// Accounts expected:
    /// 0. `[writable]` The subscription account
    /// 1. `[]` The consumer (raffle) account
    RequestRandomWords {
        key_hash: [u8; 32],
        minimum_confirmations: u16,
        callback_compute_limit: u32,
        num_words: u32,
    },
}

impl CoordinatorInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input.split_first().ok_or(ProgramError::InvalidInstructionData)?;
        match tag {
            0 => {
                if rest.len() < 32 + 2 + 4 + 4 {
                    return Err(ProgramError::InvalidInstructionData);
                }
                let (key_hash, rest) = rest.split_at(32);
                let (confirmations, rest) = rest.split_at(2);
                let (compute_limit, rest) = rest.split_at(4);
                let mut hash = [0u8; 32];
                hash.copy_from_slice(key_hash);
                Ok(Self::RequestRandomWords {
                    key_hash: hash,
                    minimum_confirmations: u16::from_le_bytes([confirmations[0], confirmations[1]]),
                    callback_compute_limit: u32::from_le_bytes([
                        compute_limit[0],
                        compute_limit[1],
                        compute_limit[2],
                        compute_limit[3],
                    ]),
                    num_words: u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]),
                })
            }
            _ => Err(ProgramError::InvalidInstructionData),
        }
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(size_of::<Self>());
        match self {
            Self::RequestRandomWords {
                key_hash,
                minimum_confirmations,
                callback_compute_limit,
                num_words,
            } => {
                buf.push(0);
                buf.extend_from_slice(key_hash);
                buf.extend_from_slice(&minimum_confirmations.to_le_bytes());
                buf.extend_from_slice(&callback_compute_limit.to_le_bytes());
                buf.extend_from_slice(&num_words.to_le_bytes());
            }
        }
        buf
    }
}

/// Outbound half of the oracle protocol
pub trait RandomnessRequestor {
    /// Issues a request and returns the coordinator's request id.
    fn request_random_words(&mut self, request: &RandomWordsRequest) -> Result<u64, ProgramError>;
}

/// Requests randomness from the coordinator program through CPI
pub struct CoordinatorClient<'a, 'info> {
    pub coordinator_program: &'a AccountInfo<'info>,
    pub subscription: &'a AccountInfo<'info>,
    pub consumer: &'a AccountInfo<'info>,
}

impl<'a, 'info> RandomnessRequestor for CoordinatorClient<'a, 'info> {
    fn request_random_words(&mut self, request: &RandomWordsRequest) -> Result<u64, ProgramError> {
        if *self.subscription.key != request.subscription {
            msg!("Subscription {} is not the configured funding handle", self.subscription.key);
            return Err(RaffleError::OracleRequestFailed.into());
        }
        if self.subscription.owner != self.coordinator_program.key {
            msg!("Subscription account not owned by the coordinator program");
            return Err(RaffleError::OracleRequestFailed.into());
        }

        let instruction = Instruction {
            program_id: *self.coordinator_program.key,
            accounts: vec![
                AccountMeta::new(*self.subscription.key, false),
                AccountMeta::new_readonly(*self.consumer.key, false),
            ],
            data: CoordinatorInstruction::RequestRandomWords {
                key_hash: request.key_hash,
                minimum_confirmations: request.minimum_confirmations,
                callback_compute_limit: request.callback_compute_limit,
                num_words: request.num_words,
            }
            .pack(),
        };

        invoke(
            &instruction,
            &[
                self.subscription.clone(),
                self.consumer.clone(),
                self.coordinator_program.clone(),
            ],
        )
        .map_err(|err| {
            msg!("Coordinator rejected the randomness request: {}", err);
            ProgramError::from(RaffleError::OracleRequestFailed)
        })?;

        match get_return_data() {
            Some((program_id, data)) if program_id == *self.coordinator_program.key && data.len() == 8 => {
                let mut id = [0u8; 8];
                id.copy_from_slice(&data);
                Ok(u64::from_le_bytes(id))
            }
            _ => {
                msg!("Coordinator did not return a request id");
                Err(RaffleError::OracleRequestFailed.into())
            }
        }
    }
}

/// PDA the coordinator signs fulfillment callbacks with
pub fn find_coordinator_authority(coordinator_program: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[COORDINATOR_AUTHORITY_SEED], coordinator_program)
}

/// Winner index for a random word: the word as an unsigned 256-bit big-endian
/// integer, modulo `entrant_count`.
pub fn winner_index(random_word: &[u8; 32], entrant_count: u64) -> u64 {
    if entrant_count == 0 {
        return 0;
    }
    let modulus = entrant_count as u128;
    random_word
        .iter()
        .fold(0u128, |acc, byte| (acc * 256 + *byte as u128) % modulus) as u64
}

/// Random word holding `value` in its low bytes
pub fn random_word_from_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}
