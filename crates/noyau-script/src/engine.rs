//! Sandboxed Lua 5.4 evaluator.
//!
//! Each compiled script gets its own Lua state with only the `table`,
//! `string`, `math` and `utf8` libraries loaded: no `io`, `os`, `package`,
//! `debug` or `load`-from-file. A memory limit caps every state, and an
//! instruction hook aborts any single call that runs past its time budget.
//!
//! Values cross the boundary as `serde_json::Value`. JSON `null` becomes
//! Lua `nil` and back.

use crate::error::ScriptError;
use mlua::{
    DeserializeOptions, Function, HookTriggers, Lua, LuaOptions, LuaSerdeExt, MultiValue, SerializeOptions, StdLib,
    VmState,
};
use noyau_core::JsonMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

/// VM instructions between deadline checks.
const HOOK_INTERVAL: u32 = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptConfig {
    pub memory_limit_bytes: usize,
    /// Wall-clock budget for one call, in milliseconds.
    pub time_limit_ms: u64,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: 16 * 1024 * 1024,
            time_limit_ms: 1_000,
        }
    }
}

impl ScriptConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }
}

/// Deadline of the call in progress, kept as Lua app data.
struct Deadline(Instant);

/// Compiles source strings into [`CompiledScript`]s.
#[derive(Debug, Clone, Default)]
pub struct ScriptEngine {
    config: ScriptConfig,
}

impl ScriptEngine {
    pub fn new(config: ScriptConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// Compile a single expression, e.g. `node.data.value > 10`, as a
    /// function of `params`.
    pub fn compile_expression(&self, expr: &str, params: &[&str]) -> Result<CompiledScript, ScriptError> {
        if expr.trim().is_empty() {
            return Err(ScriptError::Syntax("empty expression".into()));
        }
        self.compile(&format!("return {expr}"), params)
    }

    /// Compile a function body (which `return`s its result) taking `params`.
    pub fn compile_function(&self, body: &str, params: &[&str]) -> Result<CompiledScript, ScriptError> {
        self.compile(body, params)
    }

    /// Compile and run an expression once.
    pub fn evaluate(&self, expr: &str, bindings: &JsonMap) -> Result<Value, ScriptError> {
        let names: Vec<&str> = bindings.keys().map(String::as_str).collect();
        self.compile_expression(expr, &names)?.call(bindings)
    }

    fn compile(&self, body: &str, params: &[&str]) -> Result<CompiledScript, ScriptError> {
        for p in params {
            if !is_identifier(p) {
                return Err(ScriptError::Syntax(format!("invalid parameter name `{p}`")));
            }
        }
        let lua = sandbox(&self.config)?;
        let source = format!("return function({})\n{body}\nend", params.join(", "));
        let function: Function = lua.load(source).set_name("script").eval()?;
        log::trace!("compiled script with params {params:?}");
        Ok(CompiledScript {
            lua,
            function,
            params: params.iter().map(|p| p.to_string()).collect(),
            time_limit: self.config.time_limit(),
        })
    }
}

fn sandbox(config: &ScriptConfig) -> Result<Lua, ScriptError> {
    let libs = StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8;
    let lua = Lua::new_with(libs, LuaOptions::default())?;
    // The base library is always present; strip its file and chunk loaders.
    let globals = lua.globals();
    for name in ["dofile", "loadfile", "load", "require", "collectgarbage"] {
        globals.set(name, mlua::Value::Nil)?;
    }
    lua.set_memory_limit(config.memory_limit_bytes)?;
    let budget = config.time_limit_ms;
    lua.set_hook(HookTriggers::new().every_nth_instruction(HOOK_INTERVAL), move |lua, _| {
        match lua.app_data_ref::<Deadline>() {
            Some(deadline) if Instant::now() >= deadline.0 => Err(mlua::Error::runtime(format!(
                "time budget of {budget} ms exceeded"
            ))),
            _ => Ok(VmState::Continue),
        }
    })?;
    Ok(lua)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A compiled, invocable script. Arguments are taken from a bindings map
/// by parameter name; missing bindings are `nil`.
#[derive(Debug)]
pub struct CompiledScript {
    lua: Lua,
    function: Function,
    params: Vec<String>,
    time_limit: Duration,
}

impl CompiledScript {
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn call(&self, bindings: &JsonMap) -> Result<Value, ScriptError> {
        let to_lua = SerializeOptions::new()
            .serialize_none_to_null(false)
            .serialize_unit_to_null(false);
        let mut args = Vec::with_capacity(self.params.len());
        for name in &self.params {
            let arg = match bindings.get(name) {
                Some(value) => self.lua.to_value_with(value, to_lua)?,
                None => mlua::Value::Nil,
            };
            args.push(arg);
        }
        self.lua.set_app_data(Deadline(Instant::now() + self.time_limit));
        let result: mlua::Value = self.function.call(args.into_iter().collect::<MultiValue>())?;
        let from_lua = DeserializeOptions::new().deny_unsupported_types(false);
        Ok(self.lua.from_value_with(result, from_lua)?)
    }

    /// Call and reduce the result with Lua truthiness.
    pub fn call_truthy(&self, bindings: &JsonMap) -> Result<bool, ScriptError> {
        self.call(bindings).map(|v| is_truthy(&v))
    }
}

/// Lua truthiness: only `nil` (JSON `null`) and `false` are false.
pub fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}
