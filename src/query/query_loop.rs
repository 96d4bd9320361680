use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};

use crate::error::Result;
use crate::services::{ServiceDescriptor, ServiceSet};
use crate::votable::VoTable;

/// What to do when one search of a multi-search run fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorHandling {
    /// Stop on the first failed search and return its error
    StopOnFirstError,
    /// Record the failure in an empty table and carry on
    #[default]
    ContinueOnError,
}

/// A single search against one service with one parameter set.
#[async_trait]
pub trait OneSearch: Send + Sync {
    type Params: Send + Sync + std::fmt::Debug;

    /// Short protocol name used in logs and metrics
    fn protocol(&self) -> &'static str;

    async fn search(&self, service: &ServiceDescriptor, params: &Self::Params) -> Result<VoTable>;
}

/// Run `searcher` for every service and every parameter set, services outermost.
///
/// Results come back in visiting order, one table per (service, params) pair.
pub async fn query_loop<S: OneSearch>(
    searcher: &S,
    services: &ServiceSet,
    params: &[S::Params],
    strategy: ErrorHandling,
) -> Result<Vec<VoTable>> {
    let mut results = Vec::with_capacity(services.len() * params.len());
    for (svc_index, service) in services.iter().enumerate() {
        for (param_index, param) in params.iter().enumerate() {
            let span = info_span!(
                "search",
                protocol = searcher.protocol(),
                service = %service.label(),
                svc_index,
                param_index,
                query_id = %uuid::Uuid::new_v4()
            );
            let outcome = searcher.search(service, param).instrument(span).await;
            match outcome {
                Ok(table) => {
                    info!(
                        protocol = searcher.protocol(),
                        service = %service.label(),
                        rows = table.len(),
                        "search finished"
                    );
                    results.push(table);
                }
                Err(err) => match strategy {
                    ErrorHandling::StopOnFirstError => return Err(err),
                    ErrorHandling::ContinueOnError => {
                        warn!(
                            protocol = searcher.protocol(),
                            service = %service.label(),
                            params = ?param,
                            error = %err,
                            "search failed, continuing"
                        );
                        results.push(VoTable::failed(&service.access_url, err.to_string()));
                    }
                },
            }
        }
    }
    Ok(results)
}
