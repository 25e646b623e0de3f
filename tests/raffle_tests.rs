use borsh::BorshDeserialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    instruction::{AccountMeta, Instruction, InstructionError},
    program::{invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    system_program,
    sysvar::{clock::Clock, rent::Rent},
};
use solana_program_test::*;
use solana_sdk::{
    account::Account,
    signature::{Keypair, Signer},
    transaction::{Transaction, TransactionError},
};

use autoraffle::{
    process_instruction,
    raffle_error::RaffleError,
    raffle_instruction::{self, RaffleParams},
    raffle_state::{Config, PayoutPolicy, Raffle, RaffleState},
    raffle_upkeep::UpkeepStatus,
    utils::find_config_address,
    vrf::{
        find_coordinator_authority, random_word_from_u64, CoordinatorInstruction,
        COORDINATOR_AUTHORITY_SEED,
    },
};

const ENTRANCE_FEE: u64 = 10_000_000; // 0.01 SOL
const INTERVAL: i64 = 30;
const MAX_ENTRANTS: u32 = 16;
const REQUEST_FEE: u64 = 100;
const PLAYER_LAMPORTS: u64 = 1_000_000_000;

// Mock VRF coordinator
//
// The subscription account holds `[balance: u64, last_request_id: u64]`.
// Tag 0 bills the subscription and answers with the next request id, tag 1
// delivers `[request_id: u64, value: u64]` to a raffle signed by the
// coordinator authority PDA.

fn mock_coordinator_process(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    input: &[u8],
) -> ProgramResult {
    match input.split_first() {
        Some((1, rest)) => mock_fulfill(program_id, accounts, rest),
        _ => mock_request(accounts, input),
    }
}

fn mock_request(accounts: &[AccountInfo], input: &[u8]) -> ProgramResult {
    let CoordinatorInstruction::RequestRandomWords { num_words, .. } =
        CoordinatorInstruction::unpack(input)?;
    assert_eq!(num_words, 1);

    let account_info_iter = &mut accounts.iter();
    let subscription_info = next_account_info(account_info_iter)?;
    let _consumer_info = next_account_info(account_info_iter)?;

    let mut data = subscription_info.try_borrow_mut_data()?;
    let balance = u64::from_le_bytes(data[0..8].try_into().unwrap());
    if balance < REQUEST_FEE {
        return Err(ProgramError::InsufficientFunds);
    }
    let request_id = u64::from_le_bytes(data[8..16].try_into().unwrap()) + 1;
    data[0..8].copy_from_slice(&(balance - REQUEST_FEE).to_le_bytes());
    data[8..16].copy_from_slice(&request_id.to_le_bytes());

    set_return_data(&request_id.to_le_bytes());
    Ok(())
}

fn mock_fulfill(program_id: &Pubkey, accounts: &[AccountInfo], input: &[u8]) -> ProgramResult {
    let request_id = u64::from_le_bytes(input[0..8].try_into().unwrap());
    let value = u64::from_le_bytes(input[8..16].try_into().unwrap());

    let account_info_iter = &mut accounts.iter();
    let authority_info = next_account_info(account_info_iter)?;
    let raffle_program_info = next_account_info(account_info_iter)?;
    let raffle_info = next_account_info(account_info_iter)?;
    let config_info = next_account_info(account_info_iter)?;
    let candidates = account_info_iter.as_slice();

    let (authority, bump) = find_coordinator_authority(program_id);
    assert_eq!(*authority_info.key, authority);

    let candidate_keys: Vec<Pubkey> = candidates.iter().map(|info| *info.key).collect();
    let instruction = raffle_instruction::fulfill_random_words(
        raffle_program_info.key,
        program_id,
        raffle_info.key,
        request_id,
        vec![random_word_from_u64(value)],
        &candidate_keys,
    );

    let mut account_infos = vec![
        authority_info.clone(),
        raffle_info.clone(),
        config_info.clone(),
    ];
    account_infos.extend(candidates.iter().cloned());
    account_infos.push(raffle_program_info.clone());

    invoke_signed(
        &instruction,
        &account_infos,
        &[&[COORDINATOR_AUTHORITY_SEED, &[bump]]],
    )
}

struct TestEnv {
    context: ProgramTestContext,
    program_id: Pubkey,
    coordinator_id: Pubkey,
    raffle: Pubkey,
    subscription: Pubkey,
    players: Vec<Keypair>,
}

fn raffle_params(payout_policy: PayoutPolicy) -> RaffleParams {
    RaffleParams {
        entrance_fee: ENTRANCE_FEE,
        interval: INTERVAL as u64,
        key_hash: [7u8; 32],
        request_confirmations: 3,
        callback_compute_limit: 200_000,
        max_entrants: MAX_ENTRANTS,
        payout_policy: payout_policy.into(),
    }
}

fn subscription_data(balance: u64) -> Vec<u8> {
    let mut data = balance.to_le_bytes().to_vec();
    data.extend_from_slice(&0u64.to_le_bytes());
    data
}

// Setup program test with a raffle account, a funded subscription and players
async fn setup(subscription_balance: u64) -> TestEnv {
    let program_id = Pubkey::new_unique();
    let coordinator_id = Pubkey::new_unique();
    let raffle = Pubkey::new_unique();
    let subscription = Pubkey::new_unique();

    let mut program_test = ProgramTest::new(
        "autoraffle",
        program_id,
        processor!(process_instruction),
    );
    program_test.add_program(
        "mock_vrf_coordinator",
        coordinator_id,
        processor!(mock_coordinator_process),
    );

    let space = Raffle::space(MAX_ENTRANTS);
    program_test.add_account(
        raffle,
        Account {
            lamports: Rent::default().minimum_balance(space),
            data: vec![0; space],
            owner: program_id,
            ..Account::default()
        },
    );
    program_test.add_account(
        subscription,
        Account {
            lamports: Rent::default().minimum_balance(16),
            data: subscription_data(subscription_balance),
            owner: coordinator_id,
            ..Account::default()
        },
    );

    let players: Vec<Keypair> = (0..3).map(|_| Keypair::new()).collect();
    for player in &players {
        program_test.add_account(
            player.pubkey(),
            Account::new(PLAYER_LAMPORTS, 0, &system_program::id()),
        );
    }

    let context = program_test.start_with_context().await;

    TestEnv {
        context,
        program_id,
        coordinator_id,
        raffle,
        subscription,
        players,
    }
}

async fn setup_initialized(subscription_balance: u64, payout_policy: PayoutPolicy) -> TestEnv {
    let mut env = setup(subscription_balance).await;
    let instruction = raffle_instruction::initialize_raffle(
        &env.program_id,
        &env.context.payer.pubkey(),
        &env.raffle,
        &env.coordinator_id,
        &env.subscription,
        raffle_params(payout_policy),
    );
    send(&mut env.context, &[instruction], &[]).await.unwrap();
    env
}

async fn send(
    context: &mut ProgramTestContext,
    instructions: &[Instruction],
    signers: &[&Keypair],
) -> Result<(), TransactionError> {
    let mut all_signers = vec![&context.payer];
    all_signers.extend_from_slice(signers);

    let mut transaction = Transaction::new_with_payer(instructions, Some(&context.payer.pubkey()));
    transaction.sign(&all_signers, context.last_blockhash);

    context
        .banks_client
        .process_transaction(transaction)
        .await
        .map_err(|err| err.unwrap())
}

fn custom_error(error: RaffleError) -> TransactionError {
    TransactionError::InstructionError(0, InstructionError::Custom(error as u32))
}

async fn send_with_logs(
    context: &mut ProgramTestContext,
    instructions: &[Instruction],
) -> (Result<(), TransactionError>, Vec<String>) {
    let mut transaction = Transaction::new_with_payer(instructions, Some(&context.payer.pubkey()));
    transaction.sign(&[&context.payer], context.last_blockhash);

    let outcome = context
        .banks_client
        .process_transaction_with_metadata(transaction)
        .await
        .unwrap();
    let logs = outcome
        .metadata
        .map(|metadata| metadata.log_messages)
        .unwrap_or_default();
    (outcome.result, logs)
}

async fn raffle_data(env: &mut TestEnv) -> Vec<u8> {
    env.context
        .banks_client
        .get_account(env.raffle)
        .await
        .unwrap()
        .unwrap()
        .data
}

async fn load_raffle(env: &mut TestEnv) -> Raffle {
    let account = env
        .context
        .banks_client
        .get_account(env.raffle)
        .await
        .unwrap()
        .unwrap();
    Raffle::deserialize(&mut account.data.as_slice()).unwrap()
}

async fn lamports(context: &mut ProgramTestContext, address: Pubkey) -> u64 {
    context
        .banks_client
        .get_account(address)
        .await
        .unwrap()
        .map(|account| account.lamports)
        .unwrap_or(0)
}

async fn advance_clock(env: &mut TestEnv, seconds: i64) {
    let mut clock: Clock = env.context.banks_client.get_sysvar().await.unwrap();
    clock.unix_timestamp += seconds;
    env.context.set_sysvar(&clock);
}

async fn enter(env: &mut TestEnv, player_index: usize, amount: u64) -> Result<(), TransactionError> {
    let player = Keypair::from_bytes(&env.players[player_index].to_bytes()).unwrap();
    let instruction =
        raffle_instruction::enter_raffle(&env.program_id, &player.pubkey(), &env.raffle, amount);
    send(&mut env.context, &[instruction], &[&player]).await
}

async fn perform_upkeep(env: &mut TestEnv) -> Result<(), TransactionError> {
    // Fresh keeper per attempt keeps retried transactions distinct
    let keeper = Keypair::new();
    let instruction = raffle_instruction::perform_upkeep(
        &env.program_id,
        &keeper.pubkey(),
        &env.raffle,
        &env.coordinator_id,
        &env.subscription,
    );
    send(&mut env.context, &[instruction], &[&keeper]).await
}

fn coordinator_fulfill_instruction(
    env: &TestEnv,
    request_id: u64,
    value: u64,
    candidates: &[Pubkey],
) -> Instruction {
    let (authority, _) = find_coordinator_authority(&env.coordinator_id);
    let (config, _) = find_config_address(&env.program_id, &env.raffle);

    let mut accounts = vec![
        AccountMeta::new_readonly(authority, false),
        AccountMeta::new_readonly(env.program_id, false),
        AccountMeta::new(env.raffle, false),
        AccountMeta::new_readonly(config, false),
    ];
    accounts.extend(candidates.iter().map(|candidate| AccountMeta::new(*candidate, false)));

    let mut data = vec![1];
    data.extend_from_slice(&request_id.to_le_bytes());
    data.extend_from_slice(&value.to_le_bytes());

    Instruction {
        program_id: env.coordinator_id,
        accounts,
        data,
    }
}

async fn coordinator_fulfill(
    env: &mut TestEnv,
    request_id: u64,
    value: u64,
    candidates: &[Pubkey],
) -> Result<(), TransactionError> {
    let instruction = coordinator_fulfill_instruction(env, request_id, value, candidates);
    send(&mut env.context, &[instruction], &[]).await
}

// Runs `CheckUpkeep` paid by `fee_payer` and decodes the return data as a keeper would
async fn check_upkeep(env: &mut TestEnv, fee_payer: &Keypair) -> UpkeepStatus {
    let instruction = raffle_instruction::check_upkeep(&env.program_id, &env.raffle);
    let mut transaction = Transaction::new_with_payer(&[instruction], Some(&fee_payer.pubkey()));
    transaction.sign(&[fee_payer], env.context.last_blockhash);

    let outcome = env
        .context
        .banks_client
        .process_transaction_with_metadata(transaction)
        .await
        .unwrap();
    outcome.result.unwrap();

    let return_data = outcome.metadata.unwrap().return_data.unwrap();
    assert_eq!(return_data.program_id, env.program_id);
    UpkeepStatus::from_return_data(&return_data.data).unwrap()
}

fn player_keys(env: &TestEnv) -> Vec<Pubkey> {
    env.players.iter().map(|player| player.pubkey()).collect()
}

#[tokio::test]
async fn test_initialize_raffle() {
    let mut env = setup_initialized(1_000, PayoutPolicy::Propagate).await;

    let (config_pubkey, bump) = find_config_address(&env.program_id, &env.raffle);
    let config_account = env
        .context
        .banks_client
        .get_account(config_pubkey)
        .await
        .unwrap()
        .unwrap();
    let config = Config::unpack(&config_account.data).unwrap();

    assert!(config.is_initialized);
    assert_eq!(config.raffle, env.raffle);
    assert_eq!(config.coordinator, env.coordinator_id);
    assert_eq!(config.subscription, env.subscription);
    assert_eq!(config.entrance_fee, ENTRANCE_FEE);
    assert_eq!(config.interval, INTERVAL as u64);
    assert_eq!(config.num_words, 1);
    assert_eq!(config.max_entrants, MAX_ENTRANTS);
    assert_eq!(config.payout_policy().unwrap(), PayoutPolicy::Propagate);
    assert_eq!(config.bump, bump);

    let raffle = load_raffle(&mut env).await;
    assert_eq!(raffle.state(), RaffleState::Open);
    assert_eq!(raffle.number_of_players(), 0);
    assert_eq!(raffle.round(), 0);

    // Second initialization with different parameters is refused
    let mut params = raffle_params(PayoutPolicy::Propagate);
    params.entrance_fee += 1;
    let instruction = raffle_instruction::initialize_raffle(
        &env.program_id,
        &env.context.payer.pubkey(),
        &env.raffle,
        &env.coordinator_id,
        &env.subscription,
        params,
    );
    assert_eq!(
        send(&mut env.context, &[instruction], &[]).await,
        Err(custom_error(RaffleError::AlreadyInitialized))
    );
}

#[tokio::test]
async fn test_initialize_rejects_invalid_config() {
    let mut env = setup(1_000).await;

    let mut params = raffle_params(PayoutPolicy::Propagate);
    params.max_entrants = 0;
    let instruction = raffle_instruction::initialize_raffle(
        &env.program_id,
        &env.context.payer.pubkey(),
        &env.raffle,
        &env.coordinator_id,
        &env.subscription,
        params,
    );
    assert_eq!(
        send(&mut env.context, &[instruction], &[]).await,
        Err(custom_error(RaffleError::InvalidConfig))
    );

    let mut params = raffle_params(PayoutPolicy::Propagate);
    params.payout_policy = 9;
    let instruction = raffle_instruction::initialize_raffle(
        &env.program_id,
        &env.context.payer.pubkey(),
        &env.raffle,
        &env.coordinator_id,
        &env.subscription,
        params,
    );
    assert_eq!(
        send(&mut env.context, &[instruction], &[]).await,
        Err(custom_error(RaffleError::InvalidConfig))
    );
}

#[tokio::test]
async fn test_enter_raffle() {
    let mut env = setup_initialized(1_000, PayoutPolicy::Propagate).await;
    let raffle_before = lamports(&mut env.context, env.raffle).await;

    enter(&mut env, 0, ENTRANCE_FEE).await.unwrap();
    enter(&mut env, 1, ENTRANCE_FEE * 2).await.unwrap();

    let raffle = load_raffle(&mut env).await;
    assert_eq!(raffle.entrants(), &player_keys(&env)[..2]);
    assert_eq!(raffle.pot(), ENTRANCE_FEE * 3);
    assert_eq!(lamports(&mut env.context, env.raffle).await, raffle_before + ENTRANCE_FEE * 3);
    assert_eq!(
        lamports(&mut env.context, env.players[1].pubkey()).await,
        PLAYER_LAMPORTS - ENTRANCE_FEE * 2
    );

    assert_eq!(
        enter(&mut env, 2, ENTRANCE_FEE - 1).await,
        Err(custom_error(RaffleError::InsufficientPayment))
    );
    assert_eq!(load_raffle(&mut env).await.number_of_players(), 2);
}

#[tokio::test]
async fn test_upkeep_not_needed_before_interval() {
    let mut env = setup_initialized(1_000, PayoutPolicy::Propagate).await;

    // Nobody entered yet
    advance_clock(&mut env, INTERVAL).await;
    assert_eq!(
        perform_upkeep(&mut env).await,
        Err(custom_error(RaffleError::UpkeepNotNeeded))
    );

    enter(&mut env, 0, ENTRANCE_FEE).await.unwrap();
    let raffle = load_raffle(&mut env).await;
    assert_eq!(raffle.state(), RaffleState::Open);
    assert!(raffle.pending_draw().is_none());
}

#[tokio::test]
async fn test_full_round() {
    let mut env = setup_initialized(1_000, PayoutPolicy::Propagate).await;
    let players = player_keys(&env);

    for index in 0..3 {
        enter(&mut env, index, ENTRANCE_FEE).await.unwrap();
    }
    let rent_minimum = lamports(&mut env.context, env.raffle).await - ENTRANCE_FEE * 3;

    assert_eq!(
        perform_upkeep(&mut env).await,
        Err(custom_error(RaffleError::UpkeepNotNeeded))
    );

    advance_clock(&mut env, INTERVAL).await;
    perform_upkeep(&mut env).await.unwrap();

    let raffle = load_raffle(&mut env).await;
    assert_eq!(raffle.state(), RaffleState::Drawing);
    let pending = *raffle.pending_draw().unwrap();
    assert_eq!(pending.request_id, 1);
    assert_eq!(pending.entrant_count, 3);

    let subscription = env
        .context
        .banks_client
        .get_account(env.subscription)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.data, {
        let mut data = (1_000 - REQUEST_FEE).to_le_bytes().to_vec();
        data.extend_from_slice(&1u64.to_le_bytes());
        data
    });

    // Entries and draws are closed while the draw is pending
    assert_eq!(
        enter(&mut env, 0, ENTRANCE_FEE).await,
        Err(custom_error(RaffleError::RoundNotOpen))
    );
    assert_eq!(
        perform_upkeep(&mut env).await,
        Err(custom_error(RaffleError::UpkeepNotNeeded))
    );

    let winner_before = lamports(&mut env.context, players[1]).await;
    coordinator_fulfill(&mut env, pending.request_id, 7, &players)
        .await
        .unwrap();

    let raffle = load_raffle(&mut env).await;
    assert_eq!(raffle.state(), RaffleState::Open);
    assert_eq!(raffle.number_of_players(), 0);
    assert_eq!(raffle.pot(), 0);
    assert!(raffle.pending_draw().is_none());
    assert_eq!(raffle.recent_winner(), Some(players[1]));
    assert_eq!(raffle.round(), 1);

    assert_eq!(
        lamports(&mut env.context, players[1]).await,
        winner_before + ENTRANCE_FEE * 3
    );
    assert_eq!(lamports(&mut env.context, env.raffle).await, rent_minimum);

    // The request id is spent
    assert_eq!(
        coordinator_fulfill(&mut env, pending.request_id, 8, &players).await,
        Err(custom_error(RaffleError::UnknownRequest))
    );

    // A new round opens right away
    enter(&mut env, 2, ENTRANCE_FEE).await.unwrap();
    assert_eq!(load_raffle(&mut env).await.entrants(), &[players[2]]);
}

#[tokio::test]
async fn test_check_upkeep_reports_status() {
    let mut env = setup_initialized(1_000, PayoutPolicy::Propagate).await;
    let payer = Keypair::from_bytes(&env.context.payer.to_bytes()).unwrap();
    let second_payer = Keypair::from_bytes(&env.players[1].to_bytes()).unwrap();
    let third_payer = Keypair::from_bytes(&env.players[2].to_bytes()).unwrap();

    let data_before = raffle_data(&mut env).await;
    let status = check_upkeep(&mut env, &payer).await;
    assert!(!status.upkeep_needed());
    assert!(status.is_open);
    assert!(!status.time_passed);
    assert!(!status.has_players);
    assert!(!status.has_balance);
    assert_eq!(raffle_data(&mut env).await, data_before);

    enter(&mut env, 0, ENTRANCE_FEE).await.unwrap();
    let status = check_upkeep(&mut env, &second_payer).await;
    assert!(!status.upkeep_needed());
    assert!(status.has_players && status.has_balance);
    assert!(!status.time_passed);

    advance_clock(&mut env, INTERVAL).await;
    let data_before = raffle_data(&mut env).await;
    let status = check_upkeep(&mut env, &third_payer).await;
    assert!(status.upkeep_needed());
    assert!(status.time_passed);
    assert!(status.elapsed >= INTERVAL as u64);
    assert_eq!(raffle_data(&mut env).await, data_before);
    assert_eq!(load_raffle(&mut env).await.state(), RaffleState::Open);
}

#[tokio::test]
async fn test_payout_failure_reverts_fulfillment() {
    let mut env = setup_initialized(1_000, PayoutPolicy::Propagate).await;
    let winner = env.players[0].pubkey();

    enter(&mut env, 0, ENTRANCE_FEE).await.unwrap();
    advance_clock(&mut env, INTERVAL).await;
    perform_upkeep(&mut env).await.unwrap();

    let before = load_raffle(&mut env).await;
    let raffle_lamports = lamports(&mut env.context, env.raffle).await;
    let winner_lamports = lamports(&mut env.context, winner).await;

    // The coordinator does not forward the winner account
    let instruction = coordinator_fulfill_instruction(&env, 1, 0, &[]);
    let (result, logs) = send_with_logs(&mut env.context, &[instruction]).await;
    assert_eq!(result, Err(custom_error(RaffleError::PayoutFailed)));
    assert!(logs.iter().any(|line| {
        line.contains("ALERT: PayoutFailed")
            && line.contains(&winner.to_string())
            && line.contains(&format!("amount={} round=0", ENTRANCE_FEE))
    }));

    let raffle = load_raffle(&mut env).await;
    assert_eq!(raffle, before);
    assert_eq!(raffle.state(), RaffleState::Drawing);
    assert_eq!(raffle.pending_draw(), before.pending_draw());
    assert_eq!(raffle.pending_draw().unwrap().request_id, 1);
    assert!(raffle.undelivered().is_empty());
    assert_eq!(lamports(&mut env.context, env.raffle).await, raffle_lamports);
    assert_eq!(lamports(&mut env.context, winner).await, winner_lamports);

    // The coordinator can deliver again with the winner account
    coordinator_fulfill(&mut env, 1, 0, &[winner]).await.unwrap();
    assert_eq!(
        lamports(&mut env.context, winner).await,
        winner_lamports + ENTRANCE_FEE
    );
    assert_eq!(load_raffle(&mut env).await.state(), RaffleState::Open);
}

#[tokio::test]
async fn test_unknown_request_rejected() {
    let mut env = setup_initialized(1_000, PayoutPolicy::Propagate).await;
    let players = player_keys(&env);

    enter(&mut env, 0, ENTRANCE_FEE).await.unwrap();
    advance_clock(&mut env, INTERVAL).await;
    perform_upkeep(&mut env).await.unwrap();
    let before = load_raffle(&mut env).await;

    assert_eq!(
        coordinator_fulfill(&mut env, 42, 0, &players).await,
        Err(custom_error(RaffleError::UnknownRequest))
    );
    assert_eq!(load_raffle(&mut env).await, before);
}

#[tokio::test]
async fn test_fulfill_requires_coordinator_signature() {
    let mut env = setup_initialized(1_000, PayoutPolicy::Propagate).await;
    let players = player_keys(&env);

    enter(&mut env, 0, ENTRANCE_FEE).await.unwrap();
    advance_clock(&mut env, INTERVAL).await;
    perform_upkeep(&mut env).await.unwrap();

    let impostor = Keypair::new();
    let mut instruction = raffle_instruction::fulfill_random_words(
        &env.program_id,
        &env.coordinator_id,
        &env.raffle,
        1,
        vec![random_word_from_u64(0)],
        &players,
    );
    instruction.accounts[0] = AccountMeta::new_readonly(impostor.pubkey(), true);

    assert_eq!(
        send(&mut env.context, &[instruction], &[&impostor]).await,
        Err(custom_error(RaffleError::UnauthorizedOracle))
    );
    assert_eq!(load_raffle(&mut env).await.state(), RaffleState::Drawing);
}

#[tokio::test]
async fn test_unfunded_subscription_keeps_round_open() {
    let mut env = setup_initialized(REQUEST_FEE - 1, PayoutPolicy::Propagate).await;

    enter(&mut env, 0, ENTRANCE_FEE).await.unwrap();
    advance_clock(&mut env, INTERVAL).await;

    assert_eq!(
        perform_upkeep(&mut env).await,
        Err(custom_error(RaffleError::OracleRequestFailed))
    );

    let raffle = load_raffle(&mut env).await;
    assert_eq!(raffle.state(), RaffleState::Open);
    assert!(raffle.pending_draw().is_none());
    assert_eq!(raffle.number_of_players(), 1);
}

#[tokio::test]
async fn test_escrowed_payout_is_retried() {
    let mut env = setup_initialized(1_000, PayoutPolicy::Escrow).await;
    let winner = env.players[0].pubkey();

    enter(&mut env, 0, ENTRANCE_FEE).await.unwrap();
    advance_clock(&mut env, INTERVAL).await;
    perform_upkeep(&mut env).await.unwrap();

    // The coordinator does not forward the winner account
    coordinator_fulfill(&mut env, 1, 0, &[]).await.unwrap();

    let raffle = load_raffle(&mut env).await;
    assert_eq!(raffle.state(), RaffleState::Open);
    assert_eq!(raffle.recent_winner(), Some(winner));
    assert_eq!(raffle.undelivered().len(), 1);
    assert_eq!(raffle.undelivered()[0].amount, ENTRANCE_FEE);

    // Entries of the next round do not cover the escrowed prize
    enter(&mut env, 1, ENTRANCE_FEE).await.unwrap();

    let winner_before = lamports(&mut env.context, winner).await;
    let instruction = raffle_instruction::retry_payout(&env.program_id, &env.raffle, &winner);
    send(&mut env.context, &[instruction], &[]).await.unwrap();

    assert_eq!(lamports(&mut env.context, winner).await, winner_before + ENTRANCE_FEE);
    let raffle = load_raffle(&mut env).await;
    assert!(raffle.undelivered().is_empty());
    assert_eq!(raffle.pot(), ENTRANCE_FEE);

    let bystander = env.players[2].pubkey();
    let instruction = raffle_instruction::retry_payout(&env.program_id, &env.raffle, &bystander);
    assert_eq!(
        send(&mut env.context, &[instruction], &[]).await,
        Err(custom_error(RaffleError::NoUndeliveredPayout))
    );
}
