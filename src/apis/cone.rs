//! Simple Cone Search.

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use super::registry::{Registry, RegistryFilter};
use super::QueryContext;
use crate::app::ports::HttpRequest;
use crate::constants::{CONE_SERVICE, CAP_TYPE_CONE};
use crate::coords::{CoordList, RadiusArg, SkyPosition};
use crate::error::Result;
use crate::query::{query_loop, try_query, OneSearch, RetryPolicy};
use crate::services::{ServiceDescriptor, ServiceSet};
use crate::votable::{votable_from_response, VoTable};

/// One cone: centre and radius in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeParams {
    pub position: SkyPosition,
    pub radius: f64,
}

/// Knobs that only matter when cone services come from the registry.
#[derive(Debug, Clone, Default)]
pub struct ConeOptions {
    /// Overrides `[query] max_services` from the configuration
    pub max_services: Option<usize>,
    pub registry: RegistryFilter,
}

pub struct Cone {
    ctx: QueryContext,
    policy: RetryPolicy,
}

impl Cone {
    pub fn new(ctx: QueryContext) -> Self {
        let policy = ctx.config.cone.retry_policy(ctx.config.http.retry_backoff_ms);
        Self { ctx, policy }
    }

    /// Cone search every position against `services`, or against registry cone
    /// services when `services` is `None`.
    pub async fn query(
        &self,
        coords: impl Into<CoordList>,
        radius: impl Into<RadiusArg>,
        services: Option<ServiceSet>,
    ) -> Result<Vec<VoTable>> {
        self.query_with(coords, radius, services, &ConeOptions::default())
            .await
    }

    pub async fn query_with(
        &self,
        coords: impl Into<CoordList>,
        radius: impl Into<RadiusArg>,
        services: Option<ServiceSet>,
        options: &ConeOptions,
    ) -> Result<Vec<VoTable>> {
        let coords = coords.into();
        let radius = radius.into();
        let params: Vec<ConeParams> = self
            .ctx
            .positions(&coords, &radius)
            .await?
            .into_iter()
            .map(|(position, radius)| ConeParams { position, radius })
            .collect();

        let services = match services {
            Some(services) => services,
            None => {
                let mut filter = options.registry.clone();
                filter.service_type = Some(CAP_TYPE_CONE.to_string());
                Registry::new(self.ctx.clone()).services(&filter).await?
            }
        };
        if services.is_empty() {
            warn!("no cone search services to query");
            return Ok(Vec::new());
        }
        let max_services = options
            .max_services
            .unwrap_or(self.ctx.config.query.max_services);
        let services = services.limit(max_services);

        info!(
            services = services.len(),
            positions = params.len(),
            "starting cone search"
        );
        query_loop(self, &services, &params, self.ctx.config.query.error_handling).await
    }
}

#[async_trait]
impl OneSearch for Cone {
    type Params = ConeParams;

    fn protocol(&self) -> &'static str {
        CONE_SERVICE
    }

    #[instrument(skip(self, service), fields(service = %service.label()))]
    async fn search(&self, service: &ServiceDescriptor, params: &ConeParams) -> Result<VoTable> {
        let request = HttpRequest::get(
            service.access_url.clone(),
            vec![
                ("RA".to_string(), params.position.ra_deg.to_string()),
                ("DEC".to_string(), params.position.dec_deg.to_string()),
                ("SR".to_string(), params.radius.to_string()),
            ],
        );
        let response = try_query(self.ctx.http.as_ref(), request, &self.policy, CONE_SERVICE).await?;
        match votable_from_response(&response) {
            Ok(table) => Ok(table),
            Err(err) => {
                // Keep the raw reply so the caller can see what came back
                warn!(url = %response.url, error = %err, "unreadable cone search response");
                Ok(VoTable::empty_with_meta(&response, Some(err.to_string())))
            }
        }
    }
}
