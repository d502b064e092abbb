//! The data-source executor.
//!
//! Binds `(nodeId, dataKey)` pairs to provider instances. Instances are
//! shared between bindings whose configs serialize identically and are
//! reference counted by their binding list: when the last binding goes,
//! the instance is stopped (tasks aborted) and evicted.
//!
//! Fetch failures never fail the caller; they show up as the instance's
//! `error` status. Only validation and configuration problems make
//! `bind_data_source` return `Err`.
//!
//! Update events for one binding arrive in completion order. A manual
//! refresh racing a poll tick may therefore publish out of request order.

use crate::config::{DataSourceConfig, ExecutorConfig};
use crate::error::DataSourceError;
use crate::event::{DataSink, DataUpdateEvent, InstanceSnapshot};
use crate::instance::{Hub, Instance};
use crate::provider::{DataSourceProvider, ProviderContext};
use crate::providers::{HttpProvider, ScriptProvider, StaticProvider, WebSocketProvider};
use noyau_core::NodeId;
use noyau_script::ScriptEngine;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Default)]
struct Tables {
    /// instance id → instance
    instances: HashMap<String, Arc<Instance>>,
    /// share key → instance id
    shared: HashMap<String, String>,
    /// node → data key → instance id
    bindings: HashMap<NodeId, HashMap<String, String>>,
}

impl Tables {
    fn instance_for(&self, node_id: NodeId, data_key: &str) -> Option<Arc<Instance>> {
        let id = self.bindings.get(&node_id)?.get(data_key)?;
        self.instances.get(id).cloned()
    }

    /// Detach one binding from an instance. Returns the instance when that
    /// was its last binding; the caller stops it outside the lock.
    fn release(&mut self, instance_id: &str, node_id: NodeId, data_key: &str) -> Option<Arc<Instance>> {
        let instance = self.instances.get(instance_id).cloned()?;
        if instance.remove_binding(node_id, data_key) > 0 {
            return None;
        }
        self.instances.remove(instance_id);
        self.shared.remove(&instance.share_key);
        Some(instance)
    }
}

struct ExecutorInner {
    context: ProviderContext,
    providers: RwLock<HashMap<String, Arc<dyn DataSourceProvider>>>,
    tables: Mutex<Tables>,
    hub: Arc<Hub>,
}

impl Drop for ExecutorInner {
    fn drop(&mut self) {
        for instance in self.tables.get_mut().instances.values() {
            instance.stop();
        }
    }
}

/// Cloneable handle to one executor.
#[derive(Clone)]
pub struct DataSourceExecutor {
    inner: Arc<ExecutorInner>,
}

impl Default for DataSourceExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl DataSourceExecutor {
    /// An executor with the static, http, websocket and script providers.
    pub fn new(settings: ExecutorConfig) -> Self {
        Self::with_scripts(settings, ScriptEngine::default())
    }

    pub fn with_scripts(settings: ExecutorConfig, scripts: ScriptEngine) -> Self {
        let http = reqwest::Client::builder()
            .build()
            .unwrap_or_else(|err| {
                log::warn!("http client setup failed ({err}), using defaults");
                reqwest::Client::new()
            });
        let hub = Arc::new(Hub::new(settings.event_capacity));
        let executor = Self {
            inner: Arc::new(ExecutorInner {
                context: ProviderContext {
                    scripts,
                    http,
                    settings,
                },
                providers: RwLock::new(HashMap::new()),
                tables: Mutex::new(Tables::default()),
                hub,
            }),
        };
        executor.register_provider(Arc::new(StaticProvider));
        executor.register_provider(Arc::new(HttpProvider));
        executor.register_provider(Arc::new(WebSocketProvider));
        executor.register_provider(Arc::new(ScriptProvider));
        executor
    }

    pub fn settings(&self) -> &ExecutorConfig {
        &self.inner.context.settings
    }

    // ─── Providers & outputs ─────────────────────────────────────────────

    /// Add or replace the provider for its `kind()`.
    pub fn register_provider(&self, provider: Arc<dyn DataSourceProvider>) {
        let kind = provider.kind().to_string();
        log::debug!("registered data source provider `{kind}`");
        self.inner.providers.write().insert(kind, provider);
    }

    pub fn provider_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.inner.providers.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    fn provider(&self, kind: &str) -> Result<Arc<dyn DataSourceProvider>, DataSourceError> {
        self.inner
            .providers
            .read()
            .get(kind)
            .cloned()
            .ok_or_else(|| DataSourceError::UnknownProvider(kind.to_string()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataUpdateEvent> {
        self.inner.hub.subscribe()
    }

    /// Route every update event into `sink` (e.g. a `CanvasHandle`).
    pub fn set_sink(&self, sink: Option<Arc<dyn DataSink>>) {
        self.inner.hub.set_sink(sink);
    }

    // ─── Binding ─────────────────────────────────────────────────────────

    /// Bind `config` to `node_id.data_key` and start it. Resolves once the
    /// initial fetch of a new pull instance has been published. Returns
    /// the instance id.
    ///
    /// A previous binding on the same key is only released once the new
    /// instance exists, so a rejected config leaves it running.
    pub async fn bind_data_source(
        &self,
        node_id: NodeId,
        data_key: &str,
        config: DataSourceConfig,
    ) -> Result<String, DataSourceError> {
        let provider = self.provider(config.type_name())?;
        provider.validate(&config)?;

        let share_key = config.share_key();
        let live = self.inner.tables.lock().shared.contains_key(&share_key);
        let candidate = if live {
            None
        } else {
            Some(Arc::new(self.create_instance(provider.as_ref(), config.clone())?))
        };

        let (instance, fresh, released) = {
            let mut guard = self.inner.tables.lock();
            let tables = &mut *guard;
            let live = tables
                .shared
                .get(&share_key)
                .and_then(|id| tables.instances.get(id))
                .cloned();
            let (instance, fresh) = match (live, candidate) {
                (Some(instance), _) => (instance, false),
                (None, Some(instance)) => (instance, true),
                // The shared instance went away while the candidate was skipped.
                (None, None) => (Arc::new(self.create_instance(provider.as_ref(), config)?), true),
            };
            if fresh {
                tables.shared.insert(share_key, instance.id.clone());
                tables.instances.insert(instance.id.clone(), instance.clone());
            }
            instance.add_binding(node_id, data_key);
            let previous = tables
                .bindings
                .entry(node_id)
                .or_default()
                .insert(data_key.to_string(), instance.id.clone());
            let released = previous
                .filter(|id| *id != instance.id)
                .and_then(|id| tables.release(&id, node_id, data_key));
            (instance, fresh, released)
        };
        if let Some(old) = released {
            old.stop();
            log::debug!("evicted data source {}", old.id);
        }

        log::debug!(
            "bound {node_id}.{data_key} -> {} ({}, {})",
            instance.id,
            instance.type_name(),
            if fresh { "new" } else { "shared" }
        );
        if fresh {
            if let Some(initial) = instance.start() {
                // Cancelled when unbound mid-fetch; nothing to report.
                let _ = initial.await;
            }
        } else {
            instance.replay_to(node_id, data_key);
        }
        Ok(instance.id.clone())
    }

    fn create_instance(
        &self,
        provider: &dyn DataSourceProvider,
        config: DataSourceConfig,
    ) -> Result<Instance, DataSourceError> {
        let ctx = &self.inner.context;
        let driver = provider.create(&config, ctx)?;
        let transform = config
            .transform_script
            .as_deref()
            .map(|body| ctx.scripts.compile_function(body, &["data"]))
            .transpose()?;
        Ok(Instance::new(config, driver, transform, self.inner.hub.clone()))
    }

    /// Bind every key concurrently. One key failing never affects the
    /// others; each key gets its own result.
    pub async fn bind_data_sources(
        &self,
        node_id: NodeId,
        configs: impl IntoIterator<Item = (String, DataSourceConfig)>,
    ) -> HashMap<String, Result<String, DataSourceError>> {
        let binds = configs.into_iter().map(|(key, config)| async move {
            let result = self.bind_data_source(node_id, &key, config).await;
            if let Err(err) = &result {
                log::warn!("bind {node_id}.{key} failed: {err}");
            }
            (key, result)
        });
        futures::future::join_all(binds).await.into_iter().collect()
    }

    /// Remove one binding; stops and evicts the instance when it was the
    /// last one. Returns whether a binding existed.
    pub fn unbind_data_source(&self, node_id: NodeId, data_key: &str) -> bool {
        let evicted = {
            let mut guard = self.inner.tables.lock();
            let tables = &mut *guard;
            let Some(keys) = tables.bindings.get_mut(&node_id) else {
                return false;
            };
            let Some(instance_id) = keys.remove(data_key) else {
                return false;
            };
            if keys.is_empty() {
                tables.bindings.remove(&node_id);
            }
            tables.release(&instance_id, node_id, data_key)
        };
        if let Some(instance) = evicted {
            instance.stop();
            log::debug!("evicted data source {}", instance.id);
        }
        true
    }

    pub fn unbind_data_sources(&self, node_id: NodeId) {
        let keys: Vec<String> = self
            .inner
            .tables
            .lock()
            .bindings
            .get(&node_id)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default();
        for key in keys {
            self.unbind_data_source(node_id, &key);
        }
    }

    // ─── Refresh ─────────────────────────────────────────────────────────

    /// Re-run the fetch for one binding and wait for it to publish.
    pub async fn refresh_data_source(&self, node_id: NodeId, data_key: &str) -> bool {
        let Some(instance) = self.inner.tables.lock().instance_for(node_id, data_key) else {
            return false;
        };
        if let Some(fetch) = instance.refresh() {
            let _ = fetch.await;
        }
        true
    }

    /// Refresh every instance bound to `node_id` (shared ones once).
    pub async fn refresh_data_sources(&self, node_id: NodeId) {
        let instances: Vec<Arc<Instance>> = {
            let tables = self.inner.tables.lock();
            let mut seen: Vec<Arc<Instance>> = Vec::new();
            for id in tables.bindings.get(&node_id).into_iter().flat_map(|keys| keys.values()) {
                if let Some(instance) = tables.instances.get(id)
                    && !seen.iter().any(|s| s.id == instance.id)
                {
                    seen.push(instance.clone());
                }
            }
            seen
        };
        let fetches = instances.iter().filter_map(|instance| instance.refresh());
        futures::future::join_all(fetches).await;
    }

    // ─── Reads ───────────────────────────────────────────────────────────

    /// Cached value for one binding.
    pub fn get_data_source_value(&self, node_id: NodeId, data_key: &str) -> Option<Value> {
        self.inner
            .tables
            .lock()
            .instance_for(node_id, data_key)
            .map(|instance| instance.value())
    }

    /// Cached values for every key bound on `node_id`.
    pub fn get_data_source_values(&self, node_id: NodeId) -> HashMap<String, Value> {
        let tables = self.inner.tables.lock();
        let Some(keys) = tables.bindings.get(&node_id) else {
            return HashMap::new();
        };
        keys.iter()
            .filter_map(|(key, id)| tables.instances.get(id).map(|i| (key.clone(), i.value())))
            .collect()
    }

    pub fn instance_snapshot(&self, node_id: NodeId, data_key: &str) -> Option<InstanceSnapshot> {
        self.inner
            .tables
            .lock()
            .instance_for(node_id, data_key)
            .map(|instance| instance.snapshot())
    }

    pub fn active_instance_count(&self) -> usize {
        self.inner.tables.lock().instances.len()
    }

    pub fn bound_keys(&self, node_id: NodeId) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .tables
            .lock()
            .bindings
            .get(&node_id)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Every node with at least one binding.
    pub fn bound_nodes(&self) -> Vec<NodeId> {
        self.inner.tables.lock().bindings.keys().copied().collect()
    }

    /// Stop every instance and drop all bindings.
    pub fn shutdown(&self) {
        let tables = std::mem::take(&mut *self.inner.tables.lock());
        let count = tables.instances.len();
        for instance in tables.instances.values() {
            instance.stop();
        }
        log::info!("data source executor shut down ({count} instance(s) stopped)");
    }
}
