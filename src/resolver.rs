//! Object name resolution through the CDS Sesame service.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::app::ports::{HttpClientPort, HttpRequest, NameResolver};
use crate::coords::SkyPosition;
use crate::error::{Result, VoError};
use crate::query::{try_query, RetryPolicy};

pub struct SesameResolver {
    http: Arc<dyn HttpClientPort>,
    base_url: String,
    policy: RetryPolicy,
}

impl SesameResolver {
    pub fn new(http: Arc<dyn HttpClientPort>, base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            policy,
        }
    }

    /// `<base>/-ox/~SNV?<name>`: XML output, Simbad then NED then VizieR.
    fn lookup_url(&self, name: &str) -> Result<String> {
        let base = format!("{}/-ox/~SNV", self.base_url.trim_end_matches('/'));
        let mut url = Url::parse(&base)
            .map_err(|e| VoError::Config(format!("invalid Sesame URL '{}': {}", base, e)))?;
        url.set_query(Some(name));
        Ok(url.to_string())
    }
}

#[async_trait]
impl NameResolver for SesameResolver {
    #[instrument(skip(self))]
    async fn resolve(&self, name: &str) -> Result<SkyPosition> {
        let url = self.lookup_url(name)?;
        let response = try_query(
            self.http.as_ref(),
            HttpRequest::get(url, Vec::new()),
            &self.policy,
            "sesame",
        )
        .await?;
        if !response.is_success() {
            return Err(VoError::Resolver(format!(
                "Sesame answered HTTP {} for '{}'",
                response.status, name
            )));
        }
        let position = parse_sesame(&response.body)?
            .ok_or_else(|| VoError::Resolver(format!("no position found for '{}'", name)))?;
        debug!(%name, ra = position.ra_deg, dec = position.dec_deg, "resolved object name");
        Ok(position)
    }
}

/// First `Resolver` block carrying both `jradeg` and `jdedeg`.
pub fn parse_sesame(bytes: &[u8]) -> Result<Option<SkyPosition>> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut current: Option<Vec<u8>> = None;
    let mut ra: Option<f64> = None;
    let mut dec: Option<f64> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"Resolver" {
                    ra = None;
                    dec = None;
                }
                current = Some(name);
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape()?;
                match current.as_deref() {
                    Some(b"jradeg") => ra = text.trim().parse().ok(),
                    Some(b"jdedeg") => dec = text.trim().parse().ok(),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"Resolver" {
                    if let (Some(ra), Some(dec)) = (ra, dec) {
                        return SkyPosition::new(ra, dec).map(Some);
                    }
                }
                current = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(VoError::Resolver(format!("malformed Sesame reply: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    match (ra, dec) {
        (Some(ra), Some(dec)) => SkyPosition::new(ra, dec).map(Some),
        _ => Ok(None),
    }
}
