//! Simple Spectral Access (SSA).

use async_trait::async_trait;
use tracing::{info, instrument};

use super::image::format_param;
use super::{PositionalParams, QueryContext};
use crate::app::ports::HttpRequest;
use crate::constants::{DEFAULT_POINT_RADIUS_DEG, SPECTRA_SERVICE};
use crate::coords::{CoordList, RadiusArg};
use crate::error::Result;
use crate::query::{query_loop, try_query, OneSearch, RetryPolicy};
use crate::services::{ServiceDescriptor, ServiceSet};
use crate::votable::{votable_from_response, Field, VoTable};

/// Well-known SSA result columns, identified by utype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectraColumn {
    AccessUrl,
    Format,
    Title,
    TargetName,
    Size,
}

impl SpectraColumn {
    pub fn utype(&self) -> &'static str {
        match self {
            SpectraColumn::AccessUrl => "ssa:Access.Reference",
            SpectraColumn::Format => "ssa:Access.Format",
            SpectraColumn::Title => "ssa:DataID.Title",
            SpectraColumn::TargetName => "ssa:Target.Name",
            SpectraColumn::Size => "ssa:Access.Size",
        }
    }
}

pub fn get_column(table: &VoTable, mnemonic: SpectraColumn) -> Option<&Field> {
    table.find_column_by_utype(mnemonic.utype())
}

pub fn get_column_name(table: &VoTable, mnemonic: SpectraColumn) -> Option<&str> {
    get_column(table, mnemonic).map(|f| f.name.as_str())
}

pub struct Spectra {
    ctx: QueryContext,
    policy: RetryPolicy,
}

impl Spectra {
    pub fn new(ctx: QueryContext) -> Self {
        let policy = ctx.config.spectra.retry_policy(ctx.config.http.retry_backoff_ms);
        Self { ctx, policy }
    }

    /// Spectral search around every position. `radius` defaults to a point search;
    /// `format` takes the same values as image searches.
    pub async fn query(
        &self,
        services: impl Into<ServiceSet>,
        coords: impl Into<CoordList>,
        radius: Option<RadiusArg>,
        format: Option<&str>,
    ) -> Result<Vec<VoTable>> {
        let format = format_param(format)?;
        let radius = radius.unwrap_or(RadiusArg::Single(DEFAULT_POINT_RADIUS_DEG));
        let params: Vec<PositionalParams> = self
            .ctx
            .positions(&coords.into(), &radius)
            .await?
            .into_iter()
            .map(|(position, radius)| PositionalParams {
                position,
                radius,
                format: format.clone(),
            })
            .collect();
        let services = services.into().limit(self.ctx.config.query.max_services);

        info!(services = services.len(), positions = params.len(), "starting spectral search");
        query_loop(self, &services, &params, self.ctx.config.query.error_handling).await
    }
}

#[async_trait]
impl OneSearch for Spectra {
    type Params = PositionalParams;

    fn protocol(&self) -> &'static str {
        SPECTRA_SERVICE
    }

    #[instrument(skip(self, service), fields(service = %service.label()))]
    async fn search(&self, service: &ServiceDescriptor, params: &PositionalParams) -> Result<VoTable> {
        let request = HttpRequest::get(service.access_url.clone(), params.to_query());
        let response = try_query(self.ctx.http.as_ref(), request, &self.policy, SPECTRA_SERVICE).await?;
        votable_from_response(&response)
    }
}
