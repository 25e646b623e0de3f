use solana_program::{
    decode_error::DecodeError,
    msg,
    program_error::{PrintProgramError, ProgramError},
};
use thiserror::Error;

/// Errors that may be returned by the raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstructionData,

    /// Raffle account already holds an initialized round
    #[error("Raffle already initialized")]
    AlreadyInitialized,

    /// Raffle or config account has not been initialized
    #[error("Raffle not initialized")]
    NotInitialized,

    /// Raffle parameters rejected at initialization
    #[error("Invalid raffle configuration")]
    InvalidConfig,

    /// Payment is below the entrance fee
    #[error("Payment is below the entrance fee")]
    InsufficientPayment,

    /// Entries are only accepted while the round is open
    #[error("Raffle round is not open")]
    RoundNotOpen,

    /// The raffle account has no room for another entrant
    #[error("Raffle is full")]
    RaffleFull,

    /// A draw was triggered while the upkeep check does not hold
    #[error("Upkeep not needed")]
    UpkeepNotNeeded,

    /// The randomness request to the coordinator failed
    #[error("Randomness request failed")]
    OracleRequestFailed,

    /// Fulfillment does not match the pending draw
    #[error("Unknown randomness request")]
    UnknownRequest,

    /// Fulfillment was not signed by the configured coordinator
    #[error("Fulfillment not signed by the coordinator")]
    UnauthorizedOracle,

    /// Prize transfer to the winner did not complete
    #[error("Prize payout failed")]
    PayoutFailed,

    /// Entrant index outside the current ledger
    #[error("Entrant index out of range")]
    IndexOutOfRange,

    /// No escrowed payout is waiting for this winner
    #[error("No undelivered payout for this winner")]
    NoUndeliveredPayout,

    /// Arithmetic overflow
    #[error("Arithmetic overflow")]
    Overflow,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}
