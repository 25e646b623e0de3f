use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{entrypoint::ProgramResult, log::sol_log_data, msg, program_error::ProgramError, pubkey::Pubkey};
use std::fmt;

/// Notifications emitted for off-chain keepers, indexers and operators
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    /// A player joined the current round
    RaffleEnter {
        raffle: Pubkey,
        player: Pubkey,
        amount: u64,
        entrant_index: u64,
    },
    /// A draw was triggered and randomness requested
    RequestedRaffleWinner {
        raffle: Pubkey,
        request_id: u64,
        entrant_count: u64,
    },
    /// A round was settled
    WinnerPicked {
        raffle: Pubkey,
        winner: Pubkey,
        amount: u64,
        round: u64,
    },
    /// The prize of a settled round did not reach the winner
    PayoutFailed {
        raffle: Pubkey,
        winner: Pubkey,
        amount: u64,
        round: u64,
    },
    /// A fulfillment did not match the pending draw
    UnknownRequest {
        raffle: Pubkey,
        request_id: u64,
        pending_request_id: Option<u64>,
    },
    /// An escrowed prize was delivered
    PayoutRetried {
        raffle: Pubkey,
        winner: Pubkey,
        amount: u64,
        round: u64,
    },
}

impl RaffleEvent {
    /// Logs a readable line and the borsh payload as program data.
    pub fn emit(&self) -> ProgramResult {
        msg!("{}", self);
        let data = self.try_to_vec().map_err(|_| ProgramError::InvalidAccountData)?;
        sol_log_data(&[&data]);
        Ok(())
    }
}

impl fmt::Display for RaffleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RaffleEnter {
                player,
                amount,
                entrant_index,
                ..
            } => write!(f, "RaffleEnter: player={} amount={} index={}", player, amount, entrant_index),
            Self::RequestedRaffleWinner {
                request_id,
                entrant_count,
                ..
            } => write!(f, "RequestedRaffleWinner: request_id={} entrants={}", request_id, entrant_count),
            Self::WinnerPicked {
                winner,
                amount,
                round,
                ..
            } => write!(f, "WinnerPicked: winner={} amount={} round={}", winner, amount, round),
            Self::PayoutFailed {
                winner,
                amount,
                round,
                ..
            } => write!(
                f,
                "ALERT: PayoutFailed: winner={} amount={} round={} needs manual payout",
                winner, amount, round
            ),
            Self::UnknownRequest {
                request_id,
                pending_request_id,
                ..
            } => write!(
                f,
                "SECURITY: UnknownRequest: request_id={} pending={:?}",
                request_id, pending_request_id
            ),
            Self::PayoutRetried {
                winner,
                amount,
                round,
                ..
            } => write!(f, "PayoutRetried: winner={} amount={} round={}", winner, amount, round),
        }
    }
}
