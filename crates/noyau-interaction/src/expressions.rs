//! Compiled-expression cache shared by conditions and value expressions.
//!
//! Every expression is compiled once per distinct (source, scope names)
//! pair; compile failures are cached too so a broken condition does not
//! recompile on every event. Each entry owns a whole Lua state, so the cache
//! is bounded and evicts the least recently used expression.

use lru::LruCache;
use noyau_core::JsonMap;
use noyau_script::{CompiledScript, ScriptEngine, ScriptError, is_truthy};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

type Compiled = Result<Arc<CompiledScript>, ScriptError>;

/// Names bound for response conditions.
pub const CONDITION_SCOPE: [&str; 3] = ["node", "event", "extra"];

const DEFAULT_CAPACITY: usize = 256;

pub struct Expressions {
    engine: ScriptEngine,
    cache: Mutex<LruCache<(String, Vec<String>), Compiled>>,
}

impl Default for Expressions {
    fn default() -> Self {
        Self::new(ScriptEngine::default())
    }
}

impl fmt::Debug for Expressions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.cache.lock();
        f.debug_struct("Expressions")
            .field("cached", &cache.len())
            .field("capacity", &cache.cap())
            .finish()
    }
}

impl Expressions {
    pub fn new(engine: ScriptEngine) -> Self {
        Self::with_capacity(engine, DEFAULT_CAPACITY)
    }

    /// A zero capacity falls back to the default.
    pub fn with_capacity(engine: ScriptEngine, capacity: usize) -> Self {
        let capacity = if capacity == 0 { DEFAULT_CAPACITY } else { capacity };
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            engine,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn compiled(&self, expr: &str, params: &[&str]) -> Compiled {
        let key = (expr.to_string(), params.iter().map(|p| p.to_string()).collect::<Vec<_>>());
        let mut cache = self.cache.lock();
        if let Some(hit) = cache.get(&key) {
            return hit.clone();
        }
        let compiled = self.engine.compile_expression(expr, params).map(Arc::new);
        cache.put(key, compiled.clone());
        compiled
    }

    /// Compile without running, for validation.
    pub fn check(&self, expr: &str, params: &[&str]) -> Result<(), ScriptError> {
        self.compiled(expr, params).map(|_| ())
    }

    /// Evaluate `expr` with every key of `scope` bound by name.
    pub fn evaluate(&self, expr: &str, scope: &JsonMap) -> Result<Value, ScriptError> {
        let names: Vec<&str> = scope.keys().map(String::as_str).collect();
        self.compiled(expr, &names)?.call(scope)
    }

    /// Evaluate a response condition. Any compile or runtime failure counts
    /// as `false`.
    pub fn condition_holds(&self, expr: &str, scope: &JsonMap) -> bool {
        let script = match self.compiled(expr, &CONDITION_SCOPE) {
            Ok(script) => script,
            Err(e) => {
                log::warn!("condition `{expr}` does not compile: {e}");
                return false;
            }
        };
        match script.call(scope) {
            Ok(value) => is_truthy(&value),
            Err(e) => {
                log::warn!("condition `{expr}` failed: {e}");
                false
            }
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }
}
