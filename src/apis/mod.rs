//! One module per VO protocol. Each helper shares a [`QueryContext`] holding
//! the HTTP port, the name resolver and the loaded configuration.

pub mod cone;
pub mod image;
pub mod registry;
pub mod spectra;
pub mod tap;

use std::sync::Arc;

use crate::app::ports::{HttpClientPort, NameResolver};
use crate::config::Config;
use crate::coords::{CoordList, RadiusArg, SkyPosition};
use crate::error::{Result, VoError};

/// Shared state handed to every protocol helper.
#[derive(Clone)]
pub struct QueryContext {
    pub http: Arc<dyn HttpClientPort>,
    pub resolver: Option<Arc<dyn NameResolver>>,
    pub config: Arc<Config>,
}

impl QueryContext {
    pub fn new(
        http: Arc<dyn HttpClientPort>,
        resolver: Option<Arc<dyn NameResolver>>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            http,
            resolver,
            config,
        }
    }

    /// Resolve every coordinate and pair it with its radius.
    pub(crate) async fn positions(
        &self,
        coords: &CoordList,
        radius: &RadiusArg,
    ) -> Result<Vec<(SkyPosition, f64)>> {
        if coords.is_empty() {
            return Err(VoError::invalid("at least one coordinate is required"));
        }
        let radii = radius.expand(coords.len())?;
        let positions = coords.resolve_all(self.resolver.as_deref()).await?;
        Ok(positions.into_iter().zip(radii).collect())
    }
}

/// Position plus search size for SIA and SSA requests.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionalParams {
    pub position: SkyPosition,
    pub radius: f64,
    pub format: Option<String>,
}

impl PositionalParams {
    /// `POS=ra,dec`, `SIZE=2*radius` and `FORMAT` when set.
    ///
    /// SIA and SSA take SIZE as a diameter.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            (
                "POS".to_string(),
                format!("{},{}", self.position.ra_deg, self.position.dec_deg),
            ),
            ("SIZE".to_string(), (2.0 * self.radius).to_string()),
        ];
        if let Some(format) = &self.format {
            query.push(("FORMAT".to_string(), format.clone()));
        }
        query
    }
}
