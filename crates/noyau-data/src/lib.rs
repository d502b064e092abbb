//! Noyau data-source executor.
//!
//! Binds node data keys to live sources ([`DataSourceConfig`]) through
//! pluggable [`DataSourceProvider`]s, keeps one shared instance per
//! distinct config, and pushes every value change to subscribers and to an
//! optional [`DataSink`] (the canvas).
//!
//! ```rust,ignore
//! let executor = DataSourceExecutor::default();
//! executor.set_sink(Some(Arc::new(canvas.clone())));
//! executor
//!     .bind_data_source(gauge, "value", DataSourceConfig::http("https://api/temp").with_poll_interval(5_000))
//!     .await?;
//! ```

mod config;
mod error;
mod event;
mod executor;
mod instance;
mod provider;
pub mod providers;

pub use config::{
    DataSourceConfig, DeviceApiSource, ExecutorConfig, HttpSource, ScriptSource, SourceKind, StaticSource,
    WebSocketSource,
};
pub use error::DataSourceError;
pub use event::{DataSink, DataUpdateEvent, InstanceSnapshot, SourceStatus};
pub use executor::DataSourceExecutor;
pub use instance::SourceLink;
pub use provider::{DataSourceProvider, ProviderContext, PullSource, PushSource, SourceDriver};
