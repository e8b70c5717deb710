//! Lull: per-scope `sleep_ms` delay injection for HTTP pipelines.
//!
//! A `sleep_ms` directive is declared at the global, server, or route level
//! of the configuration, inherits downward, and is resolved once per request
//! (a literal millisecond count or a `${request.*}` expression) into a
//! cooperative pause performed in the host's rewrite phase.

pub mod config;
pub mod delay;
pub mod handler;
pub mod metrics;
pub mod pipeline;
pub mod routing;
pub mod template;

pub use config::{CompiledConfig, Config};
pub use delay::{DelaySpec, RawDelay, ResolveError};
pub use handler::{init, DelayHandler};
pub use pipeline::{PhaseHandler, PhaseOutcome, Pipeline};
pub use template::RequestData;
