//! Minimal host-pipeline seam.
//!
//! The real pipeline (connection I/O, phase dispatch, response production)
//! lives in the host. This module is the contract the delay layer registers
//! against: a rewrite phase, run before routing and any downstream handler,
//! whose handlers may postpone but never produce the response.

use std::sync::Arc;

use async_trait::async_trait;

use crate::template::RequestData;

/// What a phase handler tells the pipeline. A handler never returns a final
/// response; it either lets the request continue or reports an internal
/// failure of its own machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Not handled, continue the pipeline.
    Continue,
    /// Handler machinery failed; the host decides what to do.
    InternalError,
}

#[async_trait]
pub trait PhaseHandler: Send + Sync {
    async fn handle(&self, request_data: &RequestData) -> PhaseOutcome;
}

/// Phase registry. Handlers are registered once at startup; dispatch is
/// read-only afterwards.
#[derive(Default)]
pub struct Pipeline {
    rewrite: Vec<Arc<dyn PhaseHandler>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a handler into the rewrite (pre-routing) phase.
    pub fn register_rewrite(&mut self, handler: Arc<dyn PhaseHandler>) {
        self.rewrite.push(handler);
    }

    /// Run the rewrite phase for one request. Handlers run in registration
    /// order; the first internal error short-circuits.
    pub async fn run_rewrite(&self, request_data: &RequestData) -> PhaseOutcome {
        for handler in &self.rewrite {
            if handler.handle(request_data).await == PhaseOutcome::InternalError {
                return PhaseOutcome::InternalError;
            }
        }
        PhaseOutcome::Continue
    }
}
