//! Round lifecycle: `Open` -> (`trigger_draw`) -> `Drawing` -> (`on_randomness_fulfilled`) -> `Open`.
//!
//! Every transition runs to completion on an owned `Raffle`. External effects
//! go through two seams: a [`RandomnessRequestor`] for the outbound request and
//! a `pay` callback for the prize. The callback receives the raffle after the
//! round reset has been committed, so anything it does observes the new round.

use solana_program::{clock::UnixTimestamp, program_error::ProgramError, pubkey::Pubkey};

use crate::raffle_draw::{resolve_draw, WinnerPayout};
use crate::raffle_error::RaffleError;
use crate::raffle_state::{
    Config, PayoutPolicy, PendingDraw, Raffle, RaffleState, UndeliveredPayout, MAX_UNDELIVERED,
};
use crate::raffle_upkeep::{check_upkeep, UpkeepStatus};
use crate::vrf::{RandomWordsRequest, RandomnessRequestor};

/// A draw accepted by the coordinator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawRequested {
    pub request_id: u64,
    pub entrant_count: u64,
    pub requested_at: UnixTimestamp,
}

/// Result of a settled draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawOutcome {
    pub payout: WinnerPayout,
    /// False when the prize went to escrow instead of the winner
    pub delivered: bool,
}

impl Raffle {
    /// Fresh raffle whose first round starts at `now`
    pub fn new(now: UnixTimestamp) -> Self {
        Self {
            is_initialized: true,
            last_timestamp: now,
            ..Self::default()
        }
    }

    /// Records a paid entry and returns its position in the round.
    pub fn enter(&mut self, config: &Config, entrant: Pubkey, paid: u64) -> Result<u64, RaffleError> {
        if self.state != RaffleState::Open {
            return Err(RaffleError::RoundNotOpen);
        }
        if paid < config.entrance_fee() {
            return Err(RaffleError::InsufficientPayment);
        }
        self.ledger.record(entrant, paid, config.max_entrants())
    }

    pub fn entrant_at(&self, index: u64) -> Result<&Pubkey, RaffleError> {
        self.ledger.entrant_at(index)
    }

    pub fn check_upkeep(&self, config: &Config, now: UnixTimestamp) -> (bool, UpkeepStatus) {
        check_upkeep(self, config, now)
    }

    /// Moves the round to `Drawing` and records the coordinator's request id.
    ///
    /// All or nothing: if the request fails the raffle stays `Open` and
    /// unchanged.
    pub fn trigger_draw<R: RandomnessRequestor + ?Sized>(
        &mut self,
        config: &Config,
        now: UnixTimestamp,
        requestor: &mut R,
    ) -> Result<DrawRequested, RaffleError> {
        let (upkeep_needed, _) = self.check_upkeep(config, now);
        if !upkeep_needed {
            return Err(RaffleError::UpkeepNotNeeded);
        }

        let entrant_count = self.ledger.count();
        self.state = RaffleState::Drawing;

        let request_id = match requestor.request_random_words(&RandomWordsRequest::from_config(config)) {
            Ok(request_id) => request_id,
            Err(_) => {
                self.state = RaffleState::Open;
                return Err(RaffleError::OracleRequestFailed);
            }
        };

        self.pending_draw = Some(PendingDraw {
            request_id,
            requested_at: now,
            entrant_count,
        });
        Ok(DrawRequested {
            request_id,
            entrant_count,
            requested_at: now,
        })
    }

    /// Settles the pending draw with the coordinator's random words.
    ///
    /// The round is reset and reopened before `pay` runs. A failed `pay` is
    /// handled according to the configured payout policy; the reset is kept
    /// either way.
    pub fn on_randomness_fulfilled<F>(
        &mut self,
        config: &Config,
        request_id: u64,
        random_words: &[[u8; 32]],
        now: UnixTimestamp,
        pay: F,
    ) -> Result<DrawOutcome, RaffleError>
    where
        F: FnOnce(&mut Self, &Pubkey, u64) -> Result<(), ProgramError>,
    {
        let payout = resolve_draw(self, request_id, random_words)?;

        self.ledger.reset();
        self.pending_draw = None;
        self.state = RaffleState::Open;
        self.last_timestamp = now;
        self.recent_winner = Some(payout.winner);
        self.round = self.round.saturating_add(1);

        match pay(self, &payout.winner, payout.amount) {
            Ok(()) => Ok(DrawOutcome {
                payout,
                delivered: true,
            }),
            Err(_) => self.escrow_or_fail(config, payout),
        }
    }

    fn escrow_or_fail(&mut self, config: &Config, payout: WinnerPayout) -> Result<DrawOutcome, RaffleError> {
        let policy = config
            .payout_policy()
            .map_err(|_| RaffleError::PayoutFailed)?;
        if policy != PayoutPolicy::Escrow || self.undelivered.len() >= MAX_UNDELIVERED {
            return Err(RaffleError::PayoutFailed);
        }

        self.undelivered.push(UndeliveredPayout {
            winner: payout.winner,
            amount: payout.amount,
            round: payout.round,
        });
        Ok(DrawOutcome {
            payout,
            delivered: false,
        })
    }

    /// Delivers the oldest escrowed prize of `winner`.
    pub fn retry_payout<F>(&mut self, winner: &Pubkey, pay: F) -> Result<UndeliveredPayout, RaffleError>
    where
        F: FnOnce(&mut Self, &Pubkey, u64) -> Result<(), ProgramError>,
    {
        let position = self
            .undelivered
            .iter()
            .position(|payout| payout.winner == *winner)
            .ok_or(RaffleError::NoUndeliveredPayout)?;
        let payout = self.undelivered.remove(position);

        if pay(self, &payout.winner, payout.amount).is_err() {
            let position = position.min(self.undelivered.len());
            self.undelivered.insert(position, payout);
            return Err(RaffleError::PayoutFailed);
        }
        Ok(payout)
    }
}
