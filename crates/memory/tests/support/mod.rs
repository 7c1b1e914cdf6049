//! Shared fixture domain for the integration suite: account balances
//! reduced from transfer records (live/batch paths) and trading-pair
//! volumes reduced from transfer events (snapshot path).
#![allow(dead_code)]

use async_trait::async_trait;

use reprise_core::error::ReduceResult;
use reprise_core::models::{
    ChainMark, LogRecord, RecordStatus, ReduceEvent, ReduceSnapshot, RevertableEntity,
};
use reprise_core::ports::{EntityReducer, MarkService, SnapshotReducer};
use reprise_memory::{EntityIdentity, KeyedData};

// =============================================================================
// Live/batch path: balances
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceRecord {
    pub account: String,
    pub mark: ChainMark,
    pub status: Option<RecordStatus>,
    pub delta: i64,
}

impl BalanceRecord {
    pub fn confirmed(account: &str, height: u64, delta: i64) -> Self {
        Self {
            account: account.into(),
            mark: ChainMark::new(height, 0),
            status: Some(RecordStatus::Confirmed),
            delta,
        }
    }

    pub fn reverted(account: &str, height: u64, delta: i64) -> Self {
        Self {
            status: Some(RecordStatus::Reverted),
            ..Self::confirmed(account, height, delta)
        }
    }

    pub fn malformed(account: &str, height: u64) -> Self {
        Self {
            status: None,
            ..Self::confirmed(account, height, 0)
        }
    }
}

impl LogRecord for BalanceRecord {
    fn status(&self) -> Option<RecordStatus> {
        self.status
    }

    fn is_same_record(&self, other: &Self) -> bool {
        self.account == other.account && self.mark == other.mark && self.delta == other.delta
    }
}

/// Balance entity. `history` records the marks in application order, so
/// tests can tell application order apart from arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    pub account: String,
    pub value: i64,
    pub history: Vec<ChainMark>,
    pub records: Vec<BalanceRecord>,
}

impl RevertableEntity<String, BalanceRecord> for Balance {
    fn id(&self) -> &String {
        &self.account
    }

    fn records(&self) -> &[BalanceRecord] {
        &self.records
    }

    fn with_records(mut self, records: Vec<BalanceRecord>) -> Self {
        self.records = records;
        self
    }
}

pub struct BalanceIdentity;

impl EntityIdentity<String, BalanceRecord, Balance> for BalanceIdentity {
    fn entity_id(&self, record: &BalanceRecord) -> String {
        record.account.clone()
    }

    fn template(&self, id: &String) -> Balance {
        Balance {
            account: id.clone(),
            value: 0,
            history: Vec::new(),
            records: Vec::new(),
        }
    }
}

pub struct BalanceReducer;

#[async_trait]
impl EntityReducer<BalanceRecord, Balance> for BalanceReducer {
    async fn reduce(&self, mut entity: Balance, record: &BalanceRecord) -> ReduceResult<Balance> {
        match record.status {
            Some(status) if status.is_additive() => {
                entity.value += record.delta;
                entity.history.push(record.mark);
            }
            Some(_) => {
                entity.value -= record.delta;
                entity.history.retain(|mark| *mark != record.mark);
            }
            None => {}
        }
        Ok(entity)
    }
}

/// Marks below `stable_below` can no longer be reverted.
pub struct ConfirmationMarks {
    pub stable_below: u64,
}

impl MarkService<BalanceRecord, ChainMark> for ConfirmationMarks {
    fn mark(&self, record: &BalanceRecord) -> ChainMark {
        record.mark
    }

    fn is_stable(&self, mark: &ChainMark) -> bool {
        mark.height < self.stable_below
    }
}

// =============================================================================
// Snapshot path: volumes
// =============================================================================

#[derive(Debug, Clone)]
pub struct TransferEvent {
    pub pair: String,
    pub mark: ChainMark,
    pub amount: i64,
}

pub fn transfer(pair: &str, height: u64, amount: i64) -> TransferEvent {
    TransferEvent {
        pair: pair.into(),
        mark: ChainMark::new(height, 0),
        amount,
    }
}

impl ReduceEvent<ChainMark> for TransferEvent {
    fn mark(&self) -> ChainMark {
        self.mark
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub pair: String,
    pub total: i64,
}

impl KeyedData<String> for Volume {
    fn data_key(&self) -> String {
        self.pair.clone()
    }
}

pub struct VolumeReducer;

#[async_trait]
impl SnapshotReducer<String, ChainMark, TransferEvent, Volume> for VolumeReducer {
    fn data_key(&self, event: &TransferEvent) -> String {
        event.pair.clone()
    }

    fn initial_data(&self, key: &String) -> Volume {
        Volume {
            pair: key.clone(),
            total: 0,
        }
    }

    async fn reduce_window(
        &self,
        data: Volume,
        window: &[TransferEvent],
    ) -> ReduceResult<ReduceSnapshot<ChainMark, Volume>> {
        let total = window.iter().fold(data.total, |acc, event| acc + event.amount);
        let mark = window.last().map(|event| event.mark).unwrap_or_default();
        Ok(ReduceSnapshot::new(
            mark,
            Volume {
                pair: data.pair,
                total,
            },
        ))
    }
}
