//! Concurrent optimization of many portfolios
//!
//! COMPLIANCE:
//! - Bounded concurrency via semaphore
//! - Cooperative cancellation checked before each optimization starts
//! - One request's failure never affects another

use crate::error::{EngineError, EngineResult};
use crate::portfolio::OptimizationOutcome;
use crate::{OptimizationRequest, PortfolioOptimizationService};
use std::sync::Arc;
use tokio::sync::{Semaphore, watch};
use tracing::{info, warn};

/// Outcome of one request in a batch
#[derive(Debug)]
pub struct BatchItem {
    pub portfolio_id: u64,
    pub outcome: EngineResult<OptimizationOutcome>,
}

/// Runs optimization requests as tokio tasks
pub struct BatchOptimizer {
    service: Arc<PortfolioOptimizationService>,
    semaphore: Arc<Semaphore>,
    cancel_tx: watch::Sender<bool>,
}

impl BatchOptimizer {
    /// Create new batch runner limited by `max_concurrency` from the service config
    pub fn new(service: Arc<PortfolioOptimizationService>) -> Self {
        let permits = service.config().max_concurrency.max(1);
        let (cancel_tx, _) = watch::channel(false);
        Self {
            service,
            semaphore: Arc::new(Semaphore::new(permits)),
            cancel_tx,
        }
    }

    /// Stop starting new optimizations; running ones finish
    pub fn cancel(&self) {
        info!("Batch optimization cancelled");
        self.cancel_tx.send_replace(true);
    }

    /// Allow optimizations to start again
    pub fn reset(&self) {
        self.cancel_tx.send_replace(false);
    }

    /// True once `cancel` was called
    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Run every request; results come back in request order
    pub async fn run(&self, requests: Vec<OptimizationRequest>) -> Vec<BatchItem> {
        let mut handles = Vec::with_capacity(requests.len());

        for request in requests {
            let portfolio_id = request.portfolio_id;
            let service = Arc::clone(&self.service);
            let semaphore = Arc::clone(&self.semaphore);
            let cancel_rx = self.cancel_tx.subscribe();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return Err(EngineError::Cancelled { portfolio_id });
                };
                if *cancel_rx.borrow() {
                    return Err(EngineError::Cancelled { portfolio_id });
                }
                service.execute(&request).await
            });
            handles.push((portfolio_id, handle));
        }

        let mut items = Vec::with_capacity(handles.len());
        for (portfolio_id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(portfolio_id, error = %e, "Optimization task aborted");
                    Err(EngineError::Cancelled { portfolio_id })
                }
            };
            if let Err(e) = &outcome {
                if e.is_input_error() {
                    warn!(portfolio_id, error = %e, "Optimization rejected its inputs");
                }
            }
            items.push(BatchItem {
                portfolio_id,
                outcome,
            });
        }

        let succeeded = items.iter().filter(|i| i.outcome.is_ok()).count();
        info!(total = items.len(), succeeded, "Batch optimization finished");
        items
    }
}
