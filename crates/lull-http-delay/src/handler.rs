//! The delay directive evaluator: resolves the effective `sleep_ms` for one
//! request and performs the pause.
//!
//! Runs once per request in the rewrite phase, before any downstream handler.
//! Resolution failures are best-effort by design: they are logged and the
//! request continues undelayed. The handler never produces a response and
//! never aborts a request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::config::CompiledConfig;
use crate::config::scope::{FrozenScopes, ScopeId};
use crate::metrics;
use crate::pipeline::{PhaseHandler, PhaseOutcome, Pipeline};
use crate::routing::ScopeRouter;
use crate::template::RequestData;

/// Outcome of resolving one request's delay. Ephemeral; computed once per
/// request and discarded after the pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolvedDelay {
    Skip,
    Sleep(u64),
}

pub struct DelayHandler {
    scopes: FrozenScopes,
    router: ScopeRouter,
}

impl DelayHandler {
    pub fn new(config: CompiledConfig) -> Self {
        Self {
            scopes: config.scopes,
            router: config.router,
        }
    }

    /// Resolve the effective spec for one scope. Zero resolves to a silent
    /// skip; an unresolvable dynamic value is logged at error severity and
    /// also skips, the request is never failed by a bad delay value.
    fn resolve(&self, scope: ScopeId, request_data: &RequestData) -> ResolvedDelay {
        let Some(spec) = self.scopes.spec(scope) else {
            return ResolvedDelay::Skip;
        };

        match spec.resolve(request_data) {
            Ok(0) => ResolvedDelay::Skip,
            Ok(ms) => ResolvedDelay::Sleep(ms),
            Err(e) => {
                error!(scope = %self.scopes.name(scope), "invalid sleep_ms value: {e}");
                metrics::UNRESOLVED_DELAY_VALUES_TOTAL
                    .with_label_values(&[self.scopes.name(scope)])
                    .inc();
                ResolvedDelay::Skip
            }
        }
    }
}

#[async_trait]
impl PhaseHandler for DelayHandler {
    async fn handle(&self, request_data: &RequestData) -> PhaseOutcome {
        let scope = self.router.route(request_data);
        let ms = match self.resolve(scope, request_data) {
            ResolvedDelay::Skip => {
                debug!(path = %request_data.path, "no delay applies");
                return PhaseOutcome::Continue;
            }
            ResolvedDelay::Sleep(ms) => ms,
        };

        info!(scope = %self.scopes.name(scope), "sleeping for {ms} ms");
        metrics::DELAYS_INJECTED_TOTAL
            .with_label_values(&[self.scopes.name(scope)])
            .inc();
        metrics::DELAY_INJECTED_MS
            .with_label_values(&[self.scopes.name(scope)])
            .observe(ms as f64);

        // Suspends only this request's task. Dropping the future cancels the
        // timer and skips the completion log.
        tokio::time::sleep(Duration::from_millis(ms)).await;

        info!(scope = %self.scopes.name(scope), "finished sleeping for {ms} ms");
        PhaseOutcome::Continue
    }
}

/// One-time startup registration: install a single [`DelayHandler`] instance
/// into the host's rewrite phase.
pub fn init(pipeline: &mut Pipeline, config: CompiledConfig) -> Arc<DelayHandler> {
    let handler = Arc::new(DelayHandler::new(config));
    pipeline.register_rewrite(handler.clone());
    handler
}
