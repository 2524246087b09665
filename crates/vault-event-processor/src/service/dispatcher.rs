//! # Dispatcher
//!
//! The control loop: turns block notifications into per-block transactions.
//!
//! ```text
//! Idle ──→ AwaitingNotification ──notification──→ ProcessingBatch ──→ Idle
//!                 │                                     │
//!                 └── source closed ──→ Stopped         └── batch error: logged, loop continues
//! ```
//!
//! Exactly one notification is processed at a time, and the events of one
//! block are processed in sequence inside one store transaction. A failing
//! event rolls the whole block back. Only a failed subscription or a closed
//! notification source ends the loop.

use super::{apply_event, revert_event};
use crate::config::{DispatcherConfig, RevertOrder};
use crate::domain::{BatchError, DispatcherError, Event, ProcessingError};
use crate::ports::{
    BatchDirection, BatchReport, BlockEventProcessorApi, CorrelationId, DispatcherStats,
    EventDecoder, EventStore, MaterializedStore, NotificationSource, StoreTransaction,
};
use async_trait::async_trait;
use shared_bus::{BlockSignal, Notification};
use shared_types::BlockNumber;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

/// Where the dispatcher loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatcherState {
    Idle,
    AwaitingNotification,
    ProcessingBatch,
    Stopped,
}

#[derive(Default)]
struct StatsCounters {
    batches_applied: AtomicU64,
    batches_reverted: AtomicU64,
    batches_failed: AtomicU64,
    events_applied: AtomicU64,
    events_reverted: AtomicU64,
    payloads_rejected: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            batches_applied: self.batches_applied.load(Ordering::Relaxed),
            batches_reverted: self.batches_reverted.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            events_applied: self.events_applied.load(Ordering::Relaxed),
            events_reverted: self.events_reverted.load(Ordering::Relaxed),
            payloads_rejected: self.payloads_rejected.load(Ordering::Relaxed),
        }
    }

    fn record(&self, report: &BatchReport) {
        let events = report.events_processed as u64;
        match report.direction {
            BatchDirection::Apply => {
                self.batches_applied.fetch_add(1, Ordering::Relaxed);
                self.events_applied.fetch_add(events, Ordering::Relaxed);
            }
            BatchDirection::Revert => {
                self.batches_reverted.fetch_add(1, Ordering::Relaxed);
                self.events_reverted.fetch_add(events, Ordering::Relaxed);
            }
        }
    }
}

/// Block event dispatcher.
pub struct BlockEventDispatcher<S, D>
where
    S: MaterializedStore + EventStore,
    D: EventDecoder,
{
    config: DispatcherConfig,
    store: Arc<S>,
    decoder: Arc<D>,
    state: watch::Sender<DispatcherState>,
    counters: StatsCounters,
}

impl<S, D> BlockEventDispatcher<S, D>
where
    S: MaterializedStore + EventStore,
    D: EventDecoder,
{
    pub fn new(config: DispatcherConfig, store: Arc<S>, decoder: Arc<D>) -> Self {
        let (state, _) = watch::channel(DispatcherState::Idle);
        Self {
            config,
            store,
            decoder,
            state,
            counters: StatsCounters::default(),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Current loop state.
    pub fn state(&self) -> DispatcherState {
        *self.state.borrow()
    }

    /// Watch loop state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<DispatcherState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: DispatcherState) {
        self.state.send_replace(state);
    }

    /// Run the loop until the source fails.
    ///
    /// Listens on both configured channels first; failing that is fatal.
    /// After that only closure or failure of the source ends the loop.
    pub async fn run<N>(&self, notifications: &mut N) -> Result<(), DispatcherError>
    where
        N: NotificationSource,
    {
        for channel in [
            &self.config.block_ready_channel,
            &self.config.block_reverted_channel,
        ] {
            if let Err(source) = notifications.listen(channel).await {
                error!(channel = %channel, error = %source, "Subscription failed");
                self.set_state(DispatcherState::Stopped);
                return Err(DispatcherError::Subscription {
                    channel: channel.clone(),
                    source,
                });
            }
        }

        info!(
            block_ready = %self.config.block_ready_channel,
            block_reverted = %self.config.block_reverted_channel,
            revert_order = %self.config.revert_order,
            "[vault-events] Waiting for notifications"
        );

        loop {
            self.set_state(DispatcherState::AwaitingNotification);
            let notification = match notifications.wait_for_notification().await {
                Ok(notification) => notification,
                Err(e) => {
                    warn!(error = %e, "[vault-events] Notification source ended, stopping");
                    self.set_state(DispatcherState::Stopped);
                    return Err(e.into());
                }
            };

            self.set_state(DispatcherState::ProcessingBatch);
            if let Ok(report) = self.handle_notification(&notification) {
                debug!(
                    block_number = report.block_number,
                    direction = %report.direction,
                    events = report.events_processed,
                    "Notification handled"
                );
            }
            self.set_state(DispatcherState::Idle);
        }
    }

    fn classify(&self, channel: &str) -> Option<BatchDirection> {
        if channel == self.config.block_ready_channel {
            Some(BatchDirection::Apply)
        } else if channel == self.config.block_reverted_channel {
            Some(BatchDirection::Revert)
        } else {
            None
        }
    }

    fn handle_notification(&self, notification: &Notification) -> Result<BatchReport, BatchError> {
        let Some(direction) = self.classify(&notification.channel) else {
            warn!(channel = %notification.channel, "Notification on unknown channel skipped");
            return Err(BatchError::UnknownChannel {
                channel: notification.channel.clone(),
            });
        };

        let signal = BlockSignal::parse(&notification.payload).map_err(|e| {
            self.counters
                .payloads_rejected
                .fetch_add(1, Ordering::Relaxed);
            warn!(
                channel = %notification.channel,
                payload = %notification.payload,
                error = %e,
                "Rejected notification payload"
            );
            BatchError::InvalidPayload {
                channel: notification.channel.clone(),
                reason: e.to_string(),
            }
        })?;

        self.process_block(signal.block_number, direction)
    }

    /// Run one block as one transaction, logging and counting the outcome.
    fn process_block(
        &self,
        block_number: BlockNumber,
        direction: BatchDirection,
    ) -> Result<BatchReport, BatchError> {
        let correlation_id = Uuid::new_v4();
        let span = info_span!(
            "batch",
            block_number,
            direction = %direction,
            correlation_id = %correlation_id
        );
        let _guard = span.enter();

        let result = self.run_batch(block_number, direction, correlation_id);
        match &result {
            Ok(report) => {
                self.counters.record(report);
                info!(events = report.events_processed, "Batch committed");
                if report.direction == BatchDirection::Apply {
                    self.prune_undo_state(block_number);
                }
            }
            Err(e) => {
                self.counters.batches_failed.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Batch aborted");
            }
        }
        result
    }

    /// Let the store forget undo state that fell out of the retention window.
    fn prune_undo_state(&self, applied: BlockNumber) {
        let Some(horizon) = self.config.undo_horizon(applied) else {
            return;
        };
        match self.store.prune_undo_state(horizon) {
            Ok(0) => {}
            Ok(dropped) => debug!(horizon, dropped, "Undo state pruned"),
            Err(e) => warn!(horizon, error = %e, "Pruning undo state failed"),
        }
    }

    fn run_batch(
        &self,
        block_number: BlockNumber,
        direction: BatchDirection,
        correlation_id: CorrelationId,
    ) -> Result<BatchReport, BatchError> {
        let mut events = self
            .store
            .events_by_block(block_number)
            .map_err(|source| BatchError::EventFetch {
                block_number,
                source,
            })?;
        if direction == BatchDirection::Revert && self.config.revert_order == RevertOrder::Reverse
        {
            events.reverse();
        }

        let mut tx = self
            .store
            .begin()
            .map_err(|source| BatchError::Begin { source })?;

        for (position, event) in events.iter().enumerate() {
            debug!(position, event = %event.event_name, "Processing event");
            if let Err(source) = self.process_event(&mut tx, direction, event) {
                tx.rollback();
                return Err(BatchError::Event {
                    block_number,
                    position,
                    event_name: event.event_name.clone(),
                    source,
                });
            }
        }

        tx.commit().map_err(|source| BatchError::Commit {
            block_number,
            source,
        })?;

        Ok(BatchReport {
            block_number,
            direction,
            events_processed: events.len(),
            correlation_id,
        })
    }

    fn process_event(
        &self,
        tx: &mut S::Transaction,
        direction: BatchDirection,
        event: &Event,
    ) -> Result<(), ProcessingError> {
        let decoded = self.decoder.decode(event)?;
        let ctx = event.context();
        match direction {
            BatchDirection::Apply => apply_event(tx, &ctx, &decoded),
            BatchDirection::Revert => revert_event(tx, &ctx, &decoded),
        }
    }
}

#[async_trait]
impl<S, D> BlockEventProcessorApi for BlockEventDispatcher<S, D>
where
    S: MaterializedStore + EventStore + 'static,
    D: EventDecoder + 'static,
{
    async fn apply_block(&self, block_number: BlockNumber) -> Result<BatchReport, BatchError> {
        self.process_block(block_number, BatchDirection::Apply)
    }

    async fn revert_block(&self, block_number: BlockNumber) -> Result<BatchReport, BatchError> {
        self.process_block(block_number, BatchDirection::Revert)
    }

    async fn process_notification(
        &self,
        notification: &Notification,
    ) -> Result<BatchReport, BatchError> {
        self.handle_notification(notification)
    }

    fn stats(&self) -> DispatcherStats {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryStore, JsonEventDecoder};
    use crate::domain::{SourceError, StoreError, Vault};
    use crate::test_utils::*;
    use parking_lot::Mutex;
    use shared_bus::{BLOCK_READY_CHANNEL, BLOCK_REVERTED_CHANNEL};
    use shared_types::U256;
    use std::collections::VecDeque;

    // Mock notification source: replays a script, then closes.
    struct MockNotificationSource {
        script: VecDeque<Notification>,
        listened: Vec<String>,
        refuse: Option<String>,
    }

    impl MockNotificationSource {
        fn new(script: Vec<Notification>) -> Self {
            Self {
                script: script.into(),
                listened: Vec::new(),
                refuse: None,
            }
        }

        fn refusing(channel: &str) -> Self {
            Self {
                refuse: Some(channel.to_string()),
                ..Self::new(Vec::new())
            }
        }
    }

    #[async_trait]
    impl NotificationSource for MockNotificationSource {
        async fn listen(&mut self, channel: &str) -> Result<(), SourceError> {
            if self.refuse.as_deref() == Some(channel) {
                return Err(SourceError::Subscription {
                    channel: channel.to_string(),
                    reason: "permission denied".into(),
                });
            }
            self.listened.push(channel.to_string());
            Ok(())
        }

        async fn wait_for_notification(&mut self) -> Result<Notification, SourceError> {
            self.script.pop_front().ok_or(SourceError::Closed)
        }
    }

    // Mock event store whose fetch fails for one block.
    struct FailingEventStore {
        inner: InMemoryStore,
        failing_block: BlockNumber,
        fetches: Mutex<Vec<BlockNumber>>,
    }

    impl EventStore for FailingEventStore {
        fn events_by_block(&self, block_number: BlockNumber) -> Result<Vec<Event>, StoreError> {
            self.fetches.lock().push(block_number);
            if block_number == self.failing_block {
                return Err(StoreError::Backend {
                    reason: "connection reset".into(),
                });
            }
            self.inner.events_by_block(block_number)
        }
    }

    impl MaterializedStore for FailingEventStore {
        type Transaction = <InMemoryStore as MaterializedStore>::Transaction;

        fn begin(&self) -> Result<Self::Transaction, StoreError> {
            self.inner.begin()
        }
    }

    fn make_dispatcher(
        store: Arc<InMemoryStore>,
    ) -> BlockEventDispatcher<InMemoryStore, JsonEventDecoder> {
        BlockEventDispatcher::new(
            DispatcherConfig::default(),
            store,
            Arc::new(JsonEventDecoder),
        )
    }

    fn funded_store() -> Arc<InMemoryStore> {
        let store = InMemoryStore::new();
        store.seed_vault(Vault {
            unlocked_balance: U256::from(1_000),
            ..Vault::new(vault_address())
        });
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_subscription_failure_is_fatal() {
        let dispatcher = make_dispatcher(funded_store());
        let mut source = MockNotificationSource::refusing(BLOCK_REVERTED_CHANNEL);

        let result = dispatcher.run(&mut source).await;

        assert!(matches!(
            result,
            Err(DispatcherError::Subscription { ref channel, .. }) if channel == BLOCK_REVERTED_CHANNEL
        ));
        assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    }

    #[tokio::test]
    async fn test_listens_on_configured_channels() {
        let dispatcher = make_dispatcher(funded_store());
        let mut source = MockNotificationSource::new(Vec::new());

        let result = dispatcher.run(&mut source).await;

        assert_eq!(result, Err(DispatcherError::SourceClosed));
        assert_eq!(
            source.listened,
            vec![BLOCK_READY_CHANNEL.to_string(), BLOCK_REVERTED_CHANNEL.to_string()]
        );
        assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    }

    #[tokio::test]
    async fn test_bad_payload_does_not_stop_loop() {
        let store = funded_store();
        store.insert_event(deposit_event(7, 5, 100, 1_100));
        let dispatcher = make_dispatcher(store.clone());
        let mut source = MockNotificationSource::new(vec![
            Notification::new(BLOCK_READY_CHANNEL, "not json"),
            Notification::new(BLOCK_READY_CHANNEL, r#"{"blockNumber":"7"}"#),
            Notification::new("new_event", r#"{"blockNumber":7}"#),
            Notification::block(BLOCK_READY_CHANNEL, 7),
        ]);

        let _ = dispatcher.run(&mut source).await;

        let stats = dispatcher.stats();
        assert_eq!(stats.payloads_rejected, 2);
        assert_eq!(stats.batches_applied, 1);
        assert_eq!(stats.events_applied, 1);
        assert_eq!(
            store.vault(&vault_address()).unwrap().unlocked_balance,
            U256::from(1_100)
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_only_that_batch() {
        let inner = InMemoryStore::new();
        inner.seed_vault(Vault::new(vault_address()));
        inner.insert_event(deposit_event(2, 5, 10, 10));
        let store = Arc::new(FailingEventStore {
            inner,
            failing_block: 1,
            fetches: Mutex::new(Vec::new()),
        });
        let dispatcher =
            BlockEventDispatcher::new(DispatcherConfig::default(), store.clone(), Arc::new(JsonEventDecoder));

        assert!(matches!(
            dispatcher.apply_block(1).await,
            Err(BatchError::EventFetch { block_number: 1, .. })
        ));
        assert!(dispatcher.apply_block(2).await.is_ok());
        assert_eq!(*store.fetches.lock(), vec![1, 2]);
        assert_eq!(dispatcher.stats().batches_failed, 1);
    }

    #[tokio::test]
    async fn test_empty_block_commits_empty_transaction() {
        let store = funded_store();
        let version = store.version();
        let dispatcher = make_dispatcher(store.clone());

        let report = dispatcher.apply_block(42).await.unwrap();

        assert_eq!(report.events_processed, 0);
        assert_eq!(report.direction, BatchDirection::Apply);
        assert_eq!(store.version(), version + 1);
    }

    #[tokio::test]
    async fn test_failed_event_reports_position_and_name() {
        let store = funded_store();
        store.insert_event(deposit_event(3, 5, 100, 1_100));
        store.insert_event(stored_event(3, "Mystery", serde_json::json!({})));
        let dispatcher = make_dispatcher(store.clone());

        let error = dispatcher.apply_block(3).await.unwrap_err();

        assert!(matches!(
            error,
            BatchError::Event {
                block_number: 3,
                position: 1,
                ref event_name,
                source: ProcessingError::Decode(_),
            } if event_name == "Mystery"
        ));
        assert!(store
            .liquidity_provider(&vault_address(), &shared_types::Felt::from(5))
            .is_none());
    }

    #[tokio::test]
    async fn test_state_is_published() {
        let dispatcher = make_dispatcher(funded_store());
        let mut states = dispatcher.subscribe_state();
        assert_eq!(*states.borrow_and_update(), DispatcherState::Idle);

        let mut source = MockNotificationSource::new(Vec::new());
        let _ = dispatcher.run(&mut source).await;

        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), DispatcherState::Stopped);
    }

    #[tokio::test]
    async fn test_custom_channel_names_drive_classification() {
        let store = funded_store();
        store.insert_event(deposit_event(9, 5, 100, 1_100));
        let config = DispatcherConfig {
            block_ready_channel: "ready".into(),
            block_reverted_channel: "reorg".into(),
            ..DispatcherConfig::default()
        };
        let dispatcher = BlockEventDispatcher::new(config, store.clone(), Arc::new(JsonEventDecoder));

        assert!(matches!(
            dispatcher
                .process_notification(&Notification::block(BLOCK_READY_CHANNEL, 9))
                .await,
            Err(BatchError::UnknownChannel { .. })
        ));
        let report = dispatcher
            .process_notification(&Notification::block("ready", 9))
            .await
            .unwrap();
        assert_eq!(report.direction, BatchDirection::Apply);

        let report = dispatcher
            .process_notification(&Notification::block("reorg", 9))
            .await
            .unwrap();
        assert_eq!(report.direction, BatchDirection::Revert);
        assert_eq!(
            store.vault(&vault_address()).unwrap().unlocked_balance,
            U256::from(1_000)
        );
    }
}
