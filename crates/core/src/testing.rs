//! In-memory collaborators for pipeline tests.

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use sentinel_api::{ChannelCredentials, NotificationChannel, TransportError};
use sentinel_chain::{
    AccountSnapshot, BlockData, BlockRef, ChainFeed, FetchError, HeadStream, ProtocolClient,
    ReserveDebt, TxSummary,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

use crate::config::MonitorConfig;
use crate::dedup::Clock;

/// supply(address,uint256,address,uint16)
pub const SUPPLY: [u8; 4] = [0x61, 0x7b, 0xa0, 0x37];
/// borrow(address,uint256,uint256,uint16,address)
pub const BORROW: [u8; 4] = [0xa4, 0x15, 0xbc, 0xad];
/// transfer(address,uint256)
pub const TRANSFER: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

pub const POOL: u8 = 0xF0;
pub const ASSET: u8 = 0xA0;

pub fn addr(n: u8) -> Address {
    Address::repeat_byte(n)
}

/// Valid configuration: pool `addr(0xF0)`, one asset `addr(0xA0)`,
/// minimum 1000, no admins, near-zero retry delays.
pub fn test_config() -> MonitorConfig {
    let mut config = MonitorConfig::from_toml("").unwrap();
    config.name = "test".to_string();
    config.rpc.http_url = "http://localhost:8545".to_string();
    config.rpc.ws_url = "ws://localhost:8546".to_string();
    config.protocol.pool = addr(POOL);
    config.protocol.data_provider = addr(0xF1);
    config.protocol.monitored_assets = vec![addr(ASSET)];
    config.notifier.bot_token = "123:abc".to_string();
    config.notifier.chat_id = "-100200".to_string();
    config.notifier.retry_delay_ms = 1;
    config.pipeline.fetch_retries = 1;
    config.pipeline.fetch_retry_delay_ms = 1;
    config
}

pub fn snapshot(user: Address, collateral: u64, debt: u64, health_factor: U256) -> AccountSnapshot {
    AccountSnapshot {
        user,
        total_collateral: U256::from(collateral),
        total_debt: U256::from(debt),
        available_borrows: U256::ZERO,
        liquidation_threshold: U256::from(8250u64),
        loan_to_value: U256::from(8000u64),
        health_factor,
    }
}

/// Deterministic hash for height `number` on chain branch `fork`.
pub fn block_hash(number: u64, fork: u8) -> B256 {
    let mut bytes = [fork; 32];
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    B256::from(bytes)
}

/// A call from `from` to `to` with `selector` and zeroed arguments.
pub fn call(from: Address, to: Option<Address>, selector: &[u8; 4]) -> TxSummary {
    let mut input = selector.to_vec();
    input.extend_from_slice(&[0u8; 64]);
    TxSummary {
        hash: B256::ZERO,
        from,
        to,
        input: Bytes::from(input),
    }
}

pub fn block_on_fork(
    number: u64,
    fork: u8,
    parent_fork: u8,
    transactions: Vec<TxSummary>,
) -> BlockData {
    BlockData {
        number,
        hash: block_hash(number, fork),
        parent_hash: block_hash(number.saturating_sub(1), parent_fork),
        timestamp: 1_700_000_000 + number * 12,
        transactions,
    }
}

pub fn block_with(number: u64, transactions: Vec<TxSummary>) -> BlockData {
    block_on_fork(number, 0, 0, transactions)
}

/// Manually advanced wall clock.
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap())),
        }
    }

    pub fn advance(&self, secs: i64) {
        *self.now.lock() += chrono::Duration::seconds(secs);
    }

    pub fn clock(&self) -> Clock {
        let now = self.now.clone();
        Arc::new(move || *now.lock())
    }
}

/// Protocol with scripted accounts. Unknown users are healthy with no debt.
#[derive(Default)]
pub struct MockProtocol {
    accounts: DashMap<Address, AccountSnapshot>,
    debts: DashMap<(Address, Address), ReserveDebt>,
    failing: Mutex<HashSet<Address>>,
    health_reads: AtomicUsize,
    debt_reads: AtomicUsize,
}

impl MockProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_account(&self, snapshot: AccountSnapshot) {
        self.accounts.insert(snapshot.user, snapshot);
    }

    pub fn set_debt(&self, user: Address, asset: Address, stable: u64, variable: u64) {
        self.debts.insert(
            (user, asset),
            ReserveDebt {
                stable_debt: U256::from(stable),
                variable_debt: U256::from(variable),
            },
        );
    }

    /// Every read for `user` fails.
    pub fn fail_user(&self, user: Address) {
        self.failing.lock().insert(user);
    }

    pub fn health_reads(&self) -> usize {
        self.health_reads.load(Ordering::SeqCst)
    }

    pub fn debt_reads(&self) -> usize {
        self.debt_reads.load(Ordering::SeqCst)
    }

    fn check(&self, user: &Address) -> Result<(), FetchError> {
        if self.failing.lock().contains(user) {
            return Err(FetchError::Rpc("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProtocolClient for MockProtocol {
    async fn get_account_health(&self, user: Address) -> Result<AccountSnapshot, FetchError> {
        self.health_reads.fetch_add(1, Ordering::SeqCst);
        self.check(&user)?;
        Ok(self
            .accounts
            .get(&user)
            .map(|s| s.value().clone())
            .unwrap_or_else(|| snapshot(user, 0, 0, U256::MAX)))
    }

    async fn get_user_reserve_debt(
        &self,
        user: Address,
        asset: Address,
    ) -> Result<ReserveDebt, FetchError> {
        self.debt_reads.fetch_add(1, Ordering::SeqCst);
        self.check(&user)?;
        Ok(self.debts.get(&(user, asset)).map(|d| *d).unwrap_or_default())
    }
}

/// Chain with empty blocks by default and manually pushed heads.
pub struct MockFeed {
    height: AtomicU64,
    blocks: Mutex<HashMap<u64, BlockData>>,
    failing: Mutex<HashSet<u64>>,
    fetched: Mutex<Vec<u64>>,
    heads_tx: mpsc::UnboundedSender<BlockRef>,
    heads_rx: Mutex<Option<mpsc::UnboundedReceiver<BlockRef>>>,
}

impl MockFeed {
    pub fn new(height: u64) -> Self {
        let (heads_tx, heads_rx) = mpsc::unbounded_channel();
        Self {
            height: AtomicU64::new(height),
            blocks: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            fetched: Mutex::new(Vec::new()),
            heads_tx,
            heads_rx: Mutex::new(Some(heads_rx)),
        }
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// Serve `block` for its height (replacing any previous one).
    pub fn insert_block(&self, block: BlockData) {
        self.height.fetch_max(block.number, Ordering::SeqCst);
        self.blocks.lock().insert(block.number, block);
    }

    /// Every fetch of `number` fails.
    pub fn fail_block(&self, number: u64) {
        self.failing.lock().insert(number);
    }

    pub fn recover_block(&self, number: u64) {
        self.failing.lock().remove(&number);
    }

    pub fn push_head(&self, head: BlockRef) {
        self.height.fetch_max(head.number, Ordering::SeqCst);
        let _ = self.heads_tx.send(head);
    }

    /// Heights requested so far, in order (retries included).
    pub fn fetched(&self) -> Vec<u64> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl ChainFeed for MockFeed {
    async fn current_height(&self) -> Result<u64, FetchError> {
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn get_block(&self, number: u64) -> Result<BlockData, FetchError> {
        self.fetched.lock().push(number);
        if self.failing.lock().contains(&number) {
            return Err(FetchError::Rpc("upstream timeout".to_string()));
        }
        if number > self.height.load(Ordering::SeqCst) {
            return Err(FetchError::BlockNotFound(number));
        }
        let block = self.blocks.lock().get(&number).cloned();
        Ok(block.unwrap_or_else(|| block_with(number, Vec::new())))
    }

    async fn subscribe_heads(&self) -> Result<HeadStream, FetchError> {
        let rx = self
            .heads_rx
            .lock()
            .take()
            .ok_or_else(|| FetchError::Subscription("already subscribed".to_string()))?;

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            let head = rx.recv().await?;
            Some((head, rx))
        });
        Ok(Box::pin(stream))
    }
}

type ErrorFactory = Box<dyn Fn() -> TransportError + Send + Sync>;

/// Recording notification channel with scripted failures.
#[derive(Default)]
pub struct MockChannel {
    sent: Mutex<Vec<String>>,
    credentials: Mutex<Vec<ChannelCredentials>>,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
    failure: Mutex<Option<ErrorFactory>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

/// Blocks every send until released.
pub struct Gate(Arc<Semaphore>);

impl Gate {
    pub fn release(&self) {
        self.0.close();
    }
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send.
    pub fn fail_with(&self, error: impl Fn() -> TransportError + Send + Sync + 'static) {
        self.fail_times(usize::MAX, error);
    }

    /// Fail the next `times` sends.
    pub fn fail_times(
        &self,
        times: usize,
        error: impl Fn() -> TransportError + Send + Sync + 'static,
    ) {
        *self.failure.lock() = Some(Box::new(error));
        self.failures_left.store(times, Ordering::SeqCst);
    }

    pub fn hold(&self) -> Gate {
        let semaphore = Arc::new(Semaphore::new(0));
        *self.gate.lock() = Some(semaphore.clone());
        Gate(semaphore)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn credentials_seen(&self) -> Vec<ChannelCredentials> {
        self.credentials.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn wait_for_attempts(&self, n: usize) {
        while self.attempts() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    fn scripted_failure(&self) -> Option<TransportError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left == 0 {
            return None;
        }
        if left != usize::MAX {
            self.failures_left.store(left - 1, Ordering::SeqCst);
        }
        self.failure.lock().as_ref().map(|make| make())
    }
}

#[async_trait]
impl NotificationChannel for MockChannel {
    async fn send(
        &self,
        credentials: &ChannelCredentials,
        text: &str,
    ) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }

        if let Some(error) = self.scripted_failure() {
            return Err(error);
        }

        self.credentials.lock().push(credentials.clone());
        self.sent.lock().push(text.to_string());
        Ok(())
    }
}
