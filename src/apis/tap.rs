//! Synchronous Table Access Protocol queries.

use tracing::{debug, instrument};

use super::QueryContext;
use crate::app::ports::HttpRequest;
use crate::constants::{TAP_LANG, TAP_REQUEST, TAP_SERVICE, TAP_SYNC_SUFFIX};
use crate::error::{Result, VoError};
use crate::query::try_query;
use crate::services::ServiceDescriptor;
use crate::votable::{votable_from_response, VoTable};

/// Synchronous endpoint for a TAP base URL; URLs already ending in `/sync` are kept.
pub fn sync_url(access_url: &str) -> String {
    let base = access_url.trim().trim_end_matches(['?', '/']);
    if base.ends_with(TAP_SYNC_SUFFIX) {
        base.to_string()
    } else {
        format!("{}{}", base, TAP_SYNC_SUFFIX)
    }
}

pub struct Tap {
    ctx: QueryContext,
}

impl Tap {
    pub fn new(ctx: QueryContext) -> Self {
        Self { ctx }
    }

    /// Run `adql` against a TAP service.
    pub async fn query(&self, service: impl Into<ServiceDescriptor>, adql: &str) -> Result<VoTable> {
        self.query_with(&service.into(), adql, None).await
    }

    /// As [`Tap::query`], optionally capping the rows with `MAXREC`.
    #[instrument(skip(self, service), fields(service = %service.label()))]
    pub async fn query_with(
        &self,
        service: &ServiceDescriptor,
        adql: &str,
        maxrec: Option<u64>,
    ) -> Result<VoTable> {
        if adql.trim().is_empty() {
            return Err(VoError::invalid("ADQL query is empty"));
        }
        let url = sync_url(&service.access_url);
        let mut form = vec![
            ("request".to_string(), TAP_REQUEST.to_string()),
            ("lang".to_string(), TAP_LANG.to_string()),
            ("query".to_string(), adql.to_string()),
        ];
        if let Some(maxrec) = maxrec {
            form.push(("maxrec".to_string(), maxrec.to_string()));
        }
        debug!(%url, %adql, "TAP query");

        let policy = self.ctx.config.tap.retry_policy(self.ctx.config.http.retry_backoff_ms);
        let response = try_query(
            self.ctx.http.as_ref(),
            HttpRequest::post(url, form),
            &policy,
            TAP_SERVICE,
        )
        .await?;
        votable_from_response(&response)
    }
}
