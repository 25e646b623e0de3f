use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::convert::TryInto;
use std::mem::size_of;

use crate::raffle_error::RaffleError;
use crate::utils::find_config_address;
use crate::vrf::find_coordinator_authority;

/// Parameters fixed when a raffle is created
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleParams {
    /// Minimum payment to enter, in lamports
    pub entrance_fee: u64,
    /// Minimum seconds between draws
    pub interval: u64,
    /// Gas lane / randomness source selector
    pub key_hash: [u8; 32],
    /// Confirmation depth requested from the coordinator
    pub request_confirmations: u16,
    /// Compute budget for the fulfillment callback
    pub callback_compute_limit: u32,
    /// Ledger capacity; the raffle account must be sized with `Raffle::space`
    pub max_entrants: u32,
    /// 0 = propagate payout failures, 1 = escrow them
    pub payout_policy: u8,
}

const RAFFLE_PARAMS_LEN: usize = 8 + 8 + 32 + 2 + 4 + 4 + 1;

#[derive(Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Initialize a raffle and its config account
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The payer for the config account
    /// 1. `[writable]` The raffle account, pre-created and owned by this program
    /// 2. `[writable]` The config account (PDA of the raffle)
    /// 3. `[]` The VRF coordinator program
    /// 4. `[]` The coordinator subscription funding requests
    /// 5. `[]` The system program
    InitializeRaffle { params: RaffleParams },

    /// Enter the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The player paying the entrance fee
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The config account
    /// 3. `[]` The system program
    EnterRaffle {
        /// Lamports paid, at least the entrance fee
        amount: u64,
    },

    /// Report whether a draw is due. Read-only; the answer is returned as
    /// return data (see `UpkeepStatus`).
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    /// 1. `[]` The config account
    CheckUpkeep,

    /// Trigger the draw and request randomness (anyone may call)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The keeper
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The config account
    /// 3. `[]` The VRF coordinator program
    /// 4. `[writable]` The coordinator subscription
    PerformUpkeep,

    /// Coordinator callback delivering the random words
    ///
    /// Accounts expected:
    /// 0. `[signer]` The coordinator authority PDA
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The config account
    /// 3.. `[writable]` Candidate winner accounts
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<[u8; 32]>,
    },

    /// Deliver an escrowed prize (anyone may call)
    ///
    /// Accounts expected:
    /// 0. `[writable]` The raffle account
    /// 1. `[]` The config account
    /// 2. `[writable]` The winner
    RetryPayout,
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(RaffleError::InvalidInstructionData)?;

        Ok(match tag {
            0 => {
                if rest.len() < RAFFLE_PARAMS_LEN {
                    return Err(RaffleError::InvalidInstructionData.into());
                }
                let (entrance_fee, rest) = Self::unpack_u64(rest)?;
                let (interval, rest) = Self::unpack_u64(rest)?;
                let (key_hash, rest) = Self::unpack_word(rest)?;
                let (request_confirmations, rest) = Self::unpack_u16(rest)?;
                let (callback_compute_limit, rest) = Self::unpack_u32(rest)?;
                let (max_entrants, rest) = Self::unpack_u32(rest)?;
                let (payout_policy, _) = rest
                    .split_first()
                    .ok_or(RaffleError::InvalidInstructionData)?;
                Self::InitializeRaffle {
                    params: RaffleParams {
                        entrance_fee,
                        interval,
                        key_hash,
                        request_confirmations,
                        callback_compute_limit,
                        max_entrants,
                        payout_policy: *payout_policy,
                    },
                }
            }
            1 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::EnterRaffle { amount }
            }
            2 => Self::CheckUpkeep,
            3 => Self::PerformUpkeep,
            4 => {
                let (request_id, rest) = Self::unpack_u64(rest)?;
                let (count, mut rest) = rest
                    .split_first()
                    .ok_or(RaffleError::InvalidInstructionData)?;
                let mut random_words = Vec::with_capacity(*count as usize);
                for _ in 0..*count {
                    let (word, remaining) = Self::unpack_word(rest)?;
                    random_words.push(word);
                    rest = remaining;
                }
                Self::FulfillRandomWords {
                    request_id,
                    random_words,
                }
            }
            5 => Self::RetryPayout,
            _ => return Err(RaffleError::InvalidInstructionData.into()),
        })
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(size_of::<Self>());
        match self {
            Self::InitializeRaffle { params } => {
                buf.push(0);
                buf.extend_from_slice(&params.entrance_fee.to_le_bytes());
                buf.extend_from_slice(&params.interval.to_le_bytes());
                buf.extend_from_slice(&params.key_hash);
                buf.extend_from_slice(&params.request_confirmations.to_le_bytes());
                buf.extend_from_slice(&params.callback_compute_limit.to_le_bytes());
                buf.extend_from_slice(&params.max_entrants.to_le_bytes());
                buf.push(params.payout_policy);
            }
            Self::EnterRaffle { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep => buf.push(2),
            Self::PerformUpkeep => buf.push(3),
            Self::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                buf.push(4);
                buf.extend_from_slice(&request_id.to_le_bytes());
                buf.push(random_words.len() as u8);
                for word in random_words {
                    buf.extend_from_slice(word);
                }
            }
            Self::RetryPayout => buf.push(5),
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        if input.len() < 8 {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        let (value, rest) = input.split_at(8);
        let value = value
            .try_into()
            .map(u64::from_le_bytes)
            .map_err(|_| RaffleError::InvalidInstructionData)?;
        Ok((value, rest))
    }

    fn unpack_u32(input: &[u8]) -> Result<(u32, &[u8]), ProgramError> {
        if input.len() < 4 {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        let (value, rest) = input.split_at(4);
        let value = value
            .try_into()
            .map(u32::from_le_bytes)
            .map_err(|_| RaffleError::InvalidInstructionData)?;
        Ok((value, rest))
    }

    fn unpack_u16(input: &[u8]) -> Result<(u16, &[u8]), ProgramError> {
        if input.len() < 2 {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        let (value, rest) = input.split_at(2);
        let value = value
            .try_into()
            .map(u16::from_le_bytes)
            .map_err(|_| RaffleError::InvalidInstructionData)?;
        Ok((value, rest))
    }

    fn unpack_word(input: &[u8]) -> Result<([u8; 32], &[u8]), ProgramError> {
        if input.len() < 32 {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        let (word, rest) = input.split_at(32);
        let word = word
            .try_into()
            .map_err(|_| RaffleError::InvalidInstructionData)?;
        Ok((word, rest))
    }
}

/// Create initialize_raffle instruction
pub fn initialize_raffle(
    program_id: &Pubkey,
    payer: &Pubkey,
    raffle_account: &Pubkey,
    coordinator_program: &Pubkey,
    subscription: &Pubkey,
    params: RaffleParams,
) -> Instruction {
    let (config_account, _) = find_config_address(program_id, raffle_account);
    let data = RaffleInstruction::InitializeRaffle { params }.pack();

    let accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new(config_account, false),
        AccountMeta::new_readonly(*coordinator_program, false),
        AccountMeta::new_readonly(*subscription, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Create enter_raffle instruction
pub fn enter_raffle(
    program_id: &Pubkey,
    player: &Pubkey,
    raffle_account: &Pubkey,
    amount: u64,
) -> Instruction {
    let (config_account, _) = find_config_address(program_id, raffle_account);
    let data = RaffleInstruction::EnterRaffle { amount }.pack();

    let accounts = vec![
        AccountMeta::new(*player, true),
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new_readonly(config_account, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey, raffle_account: &Pubkey) -> Instruction {
    let (config_account, _) = find_config_address(program_id, raffle_account);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*raffle_account, false),
            AccountMeta::new_readonly(config_account, false),
        ],
        data: RaffleInstruction::CheckUpkeep.pack(),
    }
}

/// Create perform_upkeep instruction
pub fn perform_upkeep(
    program_id: &Pubkey,
    keeper: &Pubkey,
    raffle_account: &Pubkey,
    coordinator_program: &Pubkey,
    subscription: &Pubkey,
) -> Instruction {
    let (config_account, _) = find_config_address(program_id, raffle_account);

    let accounts = vec![
        AccountMeta::new_readonly(*keeper, true),
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new_readonly(config_account, false),
        AccountMeta::new_readonly(*coordinator_program, false),
        AccountMeta::new(*subscription, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: RaffleInstruction::PerformUpkeep.pack(),
    }
}

/// Create fulfill_random_words instruction, as issued by the coordinator.
/// The coordinator signs it with its authority PDA through `invoke_signed`.
pub fn fulfill_random_words(
    program_id: &Pubkey,
    coordinator_program: &Pubkey,
    raffle_account: &Pubkey,
    request_id: u64,
    random_words: Vec<[u8; 32]>,
    candidates: &[Pubkey],
) -> Instruction {
    let (config_account, _) = find_config_address(program_id, raffle_account);
    let (coordinator_authority, _) = find_coordinator_authority(coordinator_program);

    let mut accounts = vec![
        AccountMeta::new_readonly(coordinator_authority, true),
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new_readonly(config_account, false),
    ];
    accounts.extend(candidates.iter().map(|candidate| AccountMeta::new(*candidate, false)));

    Instruction {
        program_id: *program_id,
        accounts,
        data: RaffleInstruction::FulfillRandomWords {
            request_id,
            random_words,
        }
        .pack(),
    }
}

/// Create retry_payout instruction
pub fn retry_payout(program_id: &Pubkey, raffle_account: &Pubkey, winner: &Pubkey) -> Instruction {
    let (config_account, _) = find_config_address(program_id, raffle_account);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*raffle_account, false),
            AccountMeta::new_readonly(config_account, false),
            AccountMeta::new(*winner, false),
        ],
        data: RaffleInstruction::RetryPayout.pack(),
    }
}
