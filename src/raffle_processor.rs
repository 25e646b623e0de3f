use crate::raffle_error::RaffleError;
use crate::raffle_events::RaffleEvent;
use crate::raffle_instruction::{RaffleInstruction, RaffleParams};
use crate::raffle_state::{Config, PayoutPolicy, Raffle, MAX_ENTRANTS_LIMIT};
use crate::utils::{find_config_address, lamports_to_sol, transfer_prize};
use crate::vrf::{find_coordinator_authority, CoordinatorClient, NUM_WORDS};

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack},
    pubkey::Pubkey,
    system_instruction,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::InitializeRaffle { params } => {
                msg!("Instruction: Initialize Raffle");
                Self::process_initialize_raffle(accounts, params, program_id)
            }
            RaffleInstruction::EnterRaffle { amount } => {
                msg!("Instruction: Enter Raffle");
                Self::process_enter_raffle(accounts, amount, program_id)
            }
            RaffleInstruction::CheckUpkeep => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(accounts, program_id)
            }
            RaffleInstruction::PerformUpkeep => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(accounts, program_id)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(accounts, request_id, &random_words, program_id)
            }
            RaffleInstruction::RetryPayout => {
                msg!("Instruction: Retry Payout");
                Self::process_retry_payout(accounts, program_id)
            }
        }
    }

    /// Process the InitializeRaffle instruction
    ///
    /// Creates the config PDA and opens the first round. The raffle account is
    /// a keypair account created by the client with `Raffle::space` bytes.
    fn process_initialize_raffle(
        accounts: &[AccountInfo],
        params: RaffleParams,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let payer_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !payer_info.is_signer {
            msg!("Payer must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }

        Self::validate_params(&params)?;

        if raffle_info.data_len() < Raffle::space(params.max_entrants) {
            msg!(
                "Raffle account holds {} bytes, {} entrants need {}",
                raffle_info.data_len(),
                params.max_entrants,
                Raffle::space(params.max_entrants)
            );
            return Err(ProgramError::AccountDataTooSmall);
        }

        let rent = Rent::get()?;
        if !rent.is_exempt(raffle_info.lamports(), raffle_info.data_len()) {
            msg!("Raffle account must be rent exempt");
            return Err(ProgramError::AccountNotRentExempt);
        }

        if Raffle::load(raffle_info)?.is_initialized() {
            msg!("Raffle account is already initialized");
            return Err(RaffleError::AlreadyInitialized.into());
        }

        let (expected_config, bump_seed) = find_config_address(program_id, raffle_info.key);
        if *config_info.key != expected_config {
            msg!("Invalid config account address");
            return Err(ProgramError::InvalidArgument);
        }

        if config_info.owner != program_id {
            msg!("Creating config account");
            invoke_signed(
                &system_instruction::create_account(
                    payer_info.key,
                    config_info.key,
                    rent.minimum_balance(Config::LEN),
                    Config::LEN as u64,
                    program_id,
                ),
                &[
                    payer_info.clone(),
                    config_info.clone(),
                    system_program_info.clone(),
                ],
                &[&[b"config", raffle_info.key.as_ref(), &[bump_seed]]],
            )?;
        } else if Config::unpack_unchecked(&config_info.data.borrow())?.is_initialized() {
            msg!("Config account is already initialized");
            return Err(RaffleError::AlreadyInitialized.into());
        }

        let config = Config {
            is_initialized: true,
            raffle: *raffle_info.key,
            coordinator: *coordinator_info.key,
            subscription: *subscription_info.key,
            key_hash: params.key_hash,
            entrance_fee: params.entrance_fee,
            interval: params.interval,
            request_confirmations: params.request_confirmations,
            callback_compute_limit: params.callback_compute_limit,
            num_words: NUM_WORDS,
            max_entrants: params.max_entrants,
            payout_policy: params.payout_policy,
            bump: bump_seed,
        };
        Config::pack(config, &mut config_info.data.borrow_mut())?;

        let clock = Clock::get()?;
        Raffle::new(clock.unix_timestamp).save(raffle_info)?;

        msg!(
            "Raffle initialized: EntranceFee={} SOL, Interval={}s, MaxEntrants={}, Coordinator={}",
            lamports_to_sol(config.entrance_fee),
            config.interval,
            config.max_entrants,
            config.coordinator
        );
        Ok(())
    }

    fn validate_params(params: &RaffleParams) -> ProgramResult {
        if params.max_entrants == 0 || params.max_entrants > MAX_ENTRANTS_LIMIT {
            msg!("Max entrants must be between 1 and {}", MAX_ENTRANTS_LIMIT);
            return Err(RaffleError::InvalidConfig.into());
        }
        if params.request_confirmations == 0 {
            msg!("Request confirmations must be at least 1");
            return Err(RaffleError::InvalidConfig.into());
        }
        if params.callback_compute_limit == 0 {
            msg!("Callback compute limit must be positive");
            return Err(RaffleError::InvalidConfig.into());
        }
        if PayoutPolicy::try_from(params.payout_policy).is_err() {
            msg!("Unknown payout policy {}", params.payout_policy);
            return Err(RaffleError::InvalidConfig.into());
        }
        Ok(())
    }

    /// Process the EnterRaffle instruction
    fn process_enter_raffle(
        accounts: &[AccountInfo],
        amount: u64,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let config = Self::load_config(config_info, raffle_info, program_id)?;
        let mut raffle = Self::load_raffle(raffle_info, program_id)?;

        let entrant_index = raffle
            .enter(&config, *player_info.key, amount)
            .map_err(|err| {
                msg!(
                    "Entry rejected: {} (paid {} lamports, fee {} lamports)",
                    err,
                    amount,
                    config.entrance_fee()
                );
                err
            })?;

        invoke(
            &system_instruction::transfer(player_info.key, raffle_info.key, amount),
            &[
                player_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        raffle.save(raffle_info)?;

        RaffleEvent::RaffleEnter {
            raffle: *raffle_info.key,
            player: *player_info.key,
            amount,
            entrant_index,
        }
        .emit()
    }

    /// Process the CheckUpkeep instruction
    fn process_check_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;

        let config = Self::load_config(config_info, raffle_info, program_id)?;
        let raffle = Self::load_raffle(raffle_info, program_id)?;

        let clock = Clock::get()?;
        let (upkeep_needed, status) = raffle.check_upkeep(&config, clock.unix_timestamp);
        set_return_data(&status.to_return_data());

        msg!(
            "Upkeep needed: {} (open={}, time_passed={}, players={}, balance={})",
            upkeep_needed,
            status.is_open,
            status.time_passed,
            raffle.number_of_players(),
            raffle.pot()
        );
        Ok(())
    }

    /// Process the PerformUpkeep instruction: trigger the draw
    fn process_perform_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let keeper_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;

        if !keeper_info.is_signer {
            msg!("Keeper must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let config = Self::load_config(config_info, raffle_info, program_id)?;
        let mut raffle = Self::load_raffle(raffle_info, program_id)?;

        if coordinator_info.key != config.coordinator() {
            msg!("Coordinator program does not match the raffle config");
            return Err(ProgramError::IncorrectProgramId);
        }

        let clock = Clock::get()?;
        let mut coordinator = CoordinatorClient {
            coordinator_program: coordinator_info,
            subscription: subscription_info,
            consumer: raffle_info,
        };
        let requested = raffle
            .trigger_draw(&config, clock.unix_timestamp, &mut coordinator)
            .map_err(|err| {
                if err == RaffleError::UpkeepNotNeeded {
                    msg!(
                        "Upkeep not needed: balance={}, players={}, state={}",
                        raffle.pot(),
                        raffle.number_of_players(),
                        u8::from(raffle.state())
                    );
                }
                err
            })?;

        raffle.save(raffle_info)?;

        RaffleEvent::RequestedRaffleWinner {
            raffle: *raffle_info.key,
            request_id: requested.request_id,
            entrant_count: requested.entrant_count,
        }
        .emit()
    }

    /// Process the FulfillRandomWords instruction: settle the pending draw
    fn process_fulfill_random_words(
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: &[[u8; 32]],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let candidates = account_info_iter.as_slice();

        let config = Self::load_config(config_info, raffle_info, program_id)?;
        let mut raffle = Self::load_raffle(raffle_info, program_id)?;

        let (coordinator_authority, _) = find_coordinator_authority(config.coordinator());
        if !authority_info.is_signer || *authority_info.key != coordinator_authority {
            msg!("SECURITY: fulfillment not signed by coordinator authority {}", coordinator_authority);
            return Err(RaffleError::UnauthorizedOracle.into());
        }

        let pending_request_id = raffle.pending_draw().map(|pending| pending.request_id);
        let settling_round = raffle.round();
        let settling_pot = raffle.pot();
        let clock = Clock::get()?;

        let result = raffle.on_randomness_fulfilled(
            &config,
            request_id,
            random_words,
            clock.unix_timestamp,
            |raffle, winner, amount| {
                // Commit the new round before any lamports move
                raffle.save(raffle_info)?;
                let reserved = raffle
                    .pot()
                    .checked_add(raffle.undelivered_total())
                    .ok_or(RaffleError::Overflow)?;
                transfer_prize(raffle_info, candidates, winner, amount, reserved)
            },
        );

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(RaffleError::UnknownRequest) => {
                RaffleEvent::UnknownRequest {
                    raffle: *raffle_info.key,
                    request_id,
                    pending_request_id,
                }
                .emit()?;
                return Err(RaffleError::UnknownRequest.into());
            }
            Err(RaffleError::PayoutFailed) => {
                if let Some(winner) = raffle.recent_winner() {
                    RaffleEvent::PayoutFailed {
                        raffle: *raffle_info.key,
                        winner,
                        amount: settling_pot,
                        round: settling_round,
                    }
                    .emit()?;
                }
                return Err(RaffleError::PayoutFailed.into());
            }
            Err(err) => return Err(err.into()),
        };

        raffle.save(raffle_info)?;

        let payout = outcome.payout;
        RaffleEvent::WinnerPicked {
            raffle: *raffle_info.key,
            winner: payout.winner,
            amount: payout.amount,
            round: payout.round,
        }
        .emit()?;

        if !outcome.delivered {
            RaffleEvent::PayoutFailed {
                raffle: *raffle_info.key,
                winner: payout.winner,
                amount: payout.amount,
                round: payout.round,
            }
            .emit()?;
        }
        Ok(())
    }

    /// Process the RetryPayout instruction: deliver an escrowed prize
    fn process_retry_payout(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        Self::load_config(config_info, raffle_info, program_id)?;
        let mut raffle = Self::load_raffle(raffle_info, program_id)?;

        let delivered = raffle.retry_payout(winner_info.key, |raffle, winner, amount| {
            raffle.save(raffle_info)?;
            let reserved = raffle
                .pot()
                .checked_add(raffle.undelivered_total())
                .ok_or(RaffleError::Overflow)?;
            transfer_prize(
                raffle_info,
                std::slice::from_ref(winner_info),
                winner,
                amount,
                reserved,
            )
        })?;

        raffle.save(raffle_info)?;

        RaffleEvent::PayoutRetried {
            raffle: *raffle_info.key,
            winner: delivered.winner,
            amount: delivered.amount,
            round: delivered.round,
        }
        .emit()
    }

    fn load_config(
        config_info: &AccountInfo,
        raffle_info: &AccountInfo,
        program_id: &Pubkey,
    ) -> Result<Config, ProgramError> {
        if config_info.owner != program_id {
            msg!("Config account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let config = Config::unpack(&config_info.data.borrow())
            .map_err(|_| ProgramError::from(RaffleError::NotInitialized))?;
        if config.raffle != *raffle_info.key {
            msg!("Config account belongs to raffle {}", config.raffle);
            return Err(ProgramError::InvalidArgument);
        }
        Ok(config)
    }

    fn load_raffle(raffle_info: &AccountInfo, program_id: &Pubkey) -> Result<Raffle, ProgramError> {
        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let raffle = Raffle::load(raffle_info)?;
        if !raffle.is_initialized() {
            return Err(RaffleError::NotInitialized.into());
        }
        Ok(raffle)
    }
}
