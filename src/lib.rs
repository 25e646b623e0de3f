// Automated raffle
// Entries, keeper-triggered draws and VRF-settled payouts on Solana

// Accounts and errors
pub mod raffle_error;
pub mod raffle_ledger;
pub mod raffle_state;

// Round lifecycle
pub mod raffle_draw;
pub mod raffle_machine;
pub mod raffle_upkeep;

// Program surface
pub mod raffle_entrypoint;
pub mod raffle_events;
pub mod raffle_instruction;
pub mod raffle_processor;
pub mod utils;

// VRF module for randomness
pub mod vrf;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

/// Dispatches an instruction; exposed for `solana-program-test` and CPI callers
pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    raffle_processor::Processor::process(program_id, accounts, instruction_data)
}
