use solana_program::clock::UnixTimestamp;

use crate::raffle_state::{Config, Raffle, RaffleState};

/// Length of the `CheckUpkeep` return data
pub const UPKEEP_STATUS_LEN: usize = 5 + 8;

/// Individual conditions behind the upkeep decision, reported to keepers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpkeepStatus {
    pub is_open: bool,
    pub time_passed: bool,
    pub has_players: bool,
    pub has_balance: bool,
    /// Seconds since the current round started
    pub elapsed: u64,
}

impl UpkeepStatus {
    pub fn upkeep_needed(&self) -> bool {
        self.is_open && self.time_passed && self.has_players && self.has_balance
    }

    pub fn to_return_data(&self) -> [u8; UPKEEP_STATUS_LEN] {
        let mut buf = [0u8; UPKEEP_STATUS_LEN];
        buf[0] = self.upkeep_needed() as u8;
        buf[1] = self.is_open as u8;
        buf[2] = self.time_passed as u8;
        buf[3] = self.has_players as u8;
        buf[4] = self.has_balance as u8;
        buf[5..].copy_from_slice(&self.elapsed.to_le_bytes());
        buf
    }

    /// Decodes `CheckUpkeep` return data, as a keeper would.
    pub fn from_return_data(data: &[u8]) -> Option<Self> {
        if data.len() != UPKEEP_STATUS_LEN {
            return None;
        }
        let mut elapsed = [0u8; 8];
        elapsed.copy_from_slice(&data[5..]);
        Some(Self {
            is_open: data[1] != 0,
            time_passed: data[2] != 0,
            has_players: data[3] != 0,
            has_balance: data[4] != 0,
            elapsed: u64::from_le_bytes(elapsed),
        })
    }
}

/// Whether a draw is due at `now`. Never mutates the raffle.
pub fn check_upkeep(raffle: &Raffle, config: &Config, now: UnixTimestamp) -> (bool, UpkeepStatus) {
    let elapsed = u64::try_from(now.saturating_sub(raffle.last_timestamp())).unwrap_or(0);
    let status = UpkeepStatus {
        is_open: raffle.state() == RaffleState::Open,
        time_passed: elapsed >= config.interval(),
        has_players: raffle.number_of_players() >= 1,
        has_balance: raffle.pot() > 0,
        elapsed,
    };
    (status.upkeep_needed(), status)
}
