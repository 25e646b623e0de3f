// Raffle program - utility functions
use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
    sysvar::{rent::Rent, Sysvar},
};

use crate::raffle_error::RaffleError;

/// Seed of the per-raffle config PDA
pub const CONFIG_SEED: &[u8] = b"config";

/// Find the config account address of a raffle
pub fn find_config_address(program_id: &Pubkey, raffle: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[CONFIG_SEED, raffle.as_ref()], program_id)
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}

/// Moves `amount` lamports from the raffle account to `winner`, which must be
/// one of `candidates`. The raffle keeps its rent-exempt minimum plus
/// `reserved` lamports (the new pot and escrowed prizes).
pub fn transfer_prize(
    raffle_info: &AccountInfo,
    candidates: &[AccountInfo],
    winner: &Pubkey,
    amount: u64,
    reserved: u64,
) -> ProgramResult {
    let winner_info = candidates
        .iter()
        .find(|candidate| candidate.key == winner)
        .ok_or_else(|| {
            msg!("Winner account {} was not supplied", winner);
            ProgramError::NotEnoughAccountKeys
        })?;
    if !winner_info.is_writable {
        msg!("Winner account {} is not writable", winner);
        return Err(ProgramError::InvalidArgument);
    }

    let rent = Rent::get()?;
    let minimum = rent
        .minimum_balance(raffle_info.data_len())
        .checked_add(reserved)
        .ok_or(RaffleError::Overflow)?;
    let remaining = raffle_info
        .lamports()
        .checked_sub(amount)
        .filter(|remaining| *remaining >= minimum)
        .ok_or_else(|| {
            msg!(
                "Raffle holds {} lamports, cannot release {} and keep {}",
                raffle_info.lamports(),
                amount,
                minimum
            );
            ProgramError::InsufficientFunds
        })?;
    let credited = winner_info
        .lamports()
        .checked_add(amount)
        .ok_or(RaffleError::Overflow)?;

    **raffle_info.try_borrow_mut_lamports()? = remaining;
    **winner_info.try_borrow_mut_lamports()? = credited;

    msg!("Paid {} SOL to {}", lamports_to_sol(amount), winner);
    Ok(())
}
