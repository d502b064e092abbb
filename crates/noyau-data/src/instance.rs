//! A live data-source instance: cached value, status, bindings and the
//! tasks working on its behalf.
//!
//! Every fetch, poll loop and push loop runs in a spawned task whose
//! `AbortHandle` the instance keeps. `stop()` aborts them all and marks the
//! instance stopped, so a completion that races the abort never publishes.
//! Deliveries run under a read guard that `stop()` takes for writing: once
//! it returns, no further event reaches the sink or the broadcast channel.
//! A sink must therefore not unbind the instance it is being fed by.

use crate::config::DataSourceConfig;
use crate::error::DataSourceError;
use crate::event::{DataSink, DataUpdateEvent, InstanceSnapshot, SourceStatus};
use crate::provider::SourceDriver;
use noyau_core::{JsonMap, NodeId};
use noyau_script::CompiledScript;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};

/// Fan-out point for update events.
pub(crate) struct Hub {
    events: broadcast::Sender<DataUpdateEvent>,
    sink: RwLock<Option<Arc<dyn DataSink>>>,
}

impl Hub {
    pub(crate) fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            events,
            sink: RwLock::new(None),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<DataUpdateEvent> {
        self.events.subscribe()
    }

    pub(crate) fn set_sink(&self, sink: Option<Arc<dyn DataSink>>) {
        *self.sink.write() = sink;
    }

    fn deliver(&self, event: DataUpdateEvent) {
        let sink = self.sink.read().clone();
        if let Some(sink) = sink {
            sink.apply(&event);
        }
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

#[derive(Default)]
struct InstanceState {
    value: Value,
    status: SourceStatus,
    error: Option<String>,
    last_updated: Option<i64>,
    bindings: Vec<(NodeId, String)>,
    tasks: Vec<AbortHandle>,
    push_task: Option<AbortHandle>,
    stopped: bool,
    /// Gave up for good (WebSocket past its reconnect budget).
    terminal: bool,
}

pub(crate) struct Instance {
    pub(crate) id: String,
    pub(crate) share_key: String,
    config: DataSourceConfig,
    driver: SourceDriver,
    transform: Option<CompiledScript>,
    hub: Arc<Hub>,
    state: Mutex<InstanceState>,
    /// `true` once stopped; held for reading while events go out.
    cutoff: RwLock<bool>,
}

impl Instance {
    pub(crate) fn new(
        config: DataSourceConfig,
        driver: SourceDriver,
        transform: Option<CompiledScript>,
        hub: Arc<Hub>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            share_key: config.share_key(),
            config,
            driver,
            transform,
            hub,
            state: Mutex::new(InstanceState::default()),
            cutoff: RwLock::new(false),
        }
    }

    // ─── Bindings ────────────────────────────────────────────────────────

    pub(crate) fn add_binding(&self, node_id: NodeId, data_key: &str) {
        let mut state = self.state.lock();
        if !state.bindings.iter().any(|(n, k)| *n == node_id && k == data_key) {
            state.bindings.push((node_id, data_key.to_string()));
        }
    }

    /// Drop one binding; returns how many remain.
    pub(crate) fn remove_binding(&self, node_id: NodeId, data_key: &str) -> usize {
        let mut state = self.state.lock();
        state.bindings.retain(|(n, k)| !(*n == node_id && k == data_key));
        state.bindings.len()
    }

    /// Push the cached value to a binding that joined after it was fetched.
    pub(crate) fn replay_to(&self, node_id: NodeId, data_key: &str) {
        let event = {
            let state = self.state.lock();
            if state.status != SourceStatus::Success {
                return;
            }
            DataUpdateEvent {
                node_id,
                data_key: data_key.to_string(),
                value: state.value.clone(),
                prev_value: Value::Null,
                timestamp: state.last_updated.unwrap_or_else(now_ms),
                source_type: self.config.type_name().to_string(),
            }
        };
        self.deliver(std::iter::once(event));
    }

    // ─── Reads ───────────────────────────────────────────────────────────

    pub(crate) fn type_name(&self) -> &'static str {
        self.config.type_name()
    }

    pub(crate) fn value(&self) -> Value {
        self.state.lock().value.clone()
    }

    pub(crate) fn snapshot(&self) -> InstanceSnapshot {
        let state = self.state.lock();
        InstanceSnapshot {
            id: self.id.clone(),
            config: self.config.clone(),
            value: state.value.clone(),
            status: state.status,
            error: state.error.clone(),
            last_updated: state.last_updated,
            ref_count: state.bindings.len(),
        }
    }

    fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Kick off the instance. For pull sources the returned handle
    /// completes when the initial fetch has been published. Disabled
    /// configs stay idle.
    pub(crate) fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            log::debug!("data source {} disabled, staying idle", self.id);
            return None;
        }
        match &self.driver {
            SourceDriver::Pull(source) => {
                let initial = self.spawn_tracked(self.clone().run_fetch());
                if self.config.poll_interval > 0 && source.polls() {
                    let period = Duration::from_millis(self.config.poll_interval);
                    self.spawn_tracked(self.clone().poll_loop(period));
                }
                Some(initial)
            }
            SourceDriver::Push(_) => {
                self.spawn_push();
                None
            }
        }
    }

    /// Re-run the fetch pipeline outside the poll schedule. Push sources
    /// are only restarted when their loop has ended and is not terminal.
    pub(crate) fn refresh(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        {
            let state = self.state.lock();
            if state.stopped || !self.config.enabled {
                return None;
            }
        }
        match &self.driver {
            SourceDriver::Pull(_) => Some(self.spawn_tracked(self.clone().run_fetch())),
            SourceDriver::Push(_) => {
                let restart = {
                    let state = self.state.lock();
                    !state.terminal && state.push_task.as_ref().is_none_or(|t| t.is_finished())
                };
                if restart {
                    self.spawn_push();
                }
                None
            }
        }
    }

    /// Abort every task and refuse further publishes. Waits for a delivery
    /// already in progress to finish.
    pub(crate) fn stop(&self) {
        {
            let mut state = self.state.lock();
            state.stopped = true;
            for task in state.tasks.drain(..) {
                task.abort();
            }
            if let Some(task) = state.push_task.take() {
                task.abort();
            }
        }
        *self.cutoff.write() = true;
        log::debug!("data source {} stopped", self.id);
    }

    fn deliver(&self, events: impl IntoIterator<Item = DataUpdateEvent>) {
        let stopped = self.cutoff.read();
        if *stopped {
            return;
        }
        for event in events {
            self.hub.deliver(event);
        }
    }

    fn spawn_tracked<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        let mut state = self.state.lock();
        state.tasks.retain(|t| !t.is_finished());
        if state.stopped {
            handle.abort();
        } else {
            state.tasks.push(handle.abort_handle());
        }
        handle
    }

    fn spawn_push(self: &Arc<Self>) {
        let SourceDriver::Push(source) = &self.driver else {
            return;
        };
        let source = source.clone();
        let link = SourceLink {
            instance: self.clone(),
        };
        link.loading();
        let handle = tokio::spawn(async move { source.run(link).await });
        let mut state = self.state.lock();
        if state.stopped {
            handle.abort();
        } else {
            state.push_task = Some(handle.abort_handle());
        }
    }

    async fn poll_loop(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.is_stopped() {
                break;
            }
            log::trace!("poll tick for {}", self.id);
            self.clone().run_fetch().await;
        }
    }

    async fn run_fetch(self: Arc<Self>) {
        let SourceDriver::Pull(source) = &self.driver else {
            return;
        };
        if !self.set_loading() {
            return;
        }
        match source.fetch().await {
            Ok(value) => self.publish(value),
            Err(err) => self.fail(&err, false),
        }
    }

    // ─── State transitions ───────────────────────────────────────────────

    fn set_loading(&self) -> bool {
        let mut state = self.state.lock();
        if state.stopped {
            return false;
        }
        state.status = SourceStatus::Loading;
        true
    }

    fn publish(&self, raw: Value) {
        let value = match self.apply_transform(raw) {
            Ok(v) => v,
            Err(err) => return self.fail(&err, false),
        };
        let now = now_ms();
        let (prev, bindings) = {
            let mut state = self.state.lock();
            if state.stopped {
                return;
            }
            let prev = std::mem::replace(&mut state.value, value.clone());
            state.status = SourceStatus::Success;
            state.error = None;
            state.last_updated = Some(now);
            (prev, state.bindings.clone())
        };
        let source_type = self.config.type_name();
        self.deliver(bindings.into_iter().map(|(node_id, data_key)| DataUpdateEvent {
            node_id,
            data_key,
            value: value.clone(),
            prev_value: prev.clone(),
            timestamp: now,
            source_type: source_type.to_string(),
        }));
    }

    fn apply_transform(&self, value: Value) -> Result<Value, DataSourceError> {
        let Some(transform) = &self.transform else {
            return Ok(value);
        };
        let mut bindings = JsonMap::new();
        bindings.insert("data".into(), value);
        Ok(transform.call(&bindings)?)
    }

    fn fail(&self, err: &DataSourceError, terminal: bool) {
        let mut state = self.state.lock();
        if state.stopped {
            return;
        }
        log::warn!("data source {} ({}) failed: {err}", self.id, self.config.type_name());
        state.status = SourceStatus::Error;
        state.error = Some(err.to_string());
        state.terminal |= terminal;
    }
}

/// A push source's handle back into its instance.
#[derive(Clone)]
pub struct SourceLink {
    instance: Arc<Instance>,
}

impl SourceLink {
    /// Publish a value (after the instance transform) to every binding.
    pub fn publish(&self, value: Value) {
        self.instance.publish(value);
    }

    pub fn loading(&self) {
        self.instance.set_loading();
    }

    /// Record a retryable failure.
    pub fn fail(&self, err: &DataSourceError) {
        self.instance.fail(err, false);
    }

    /// Record a failure the source will not recover from on its own.
    pub fn fail_terminal(&self, err: &DataSourceError) {
        self.instance.fail(err, true);
    }

    pub fn is_stopped(&self) -> bool {
        self.instance.is_stopped()
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
