use std::sync::Arc;

use crate::apis::cone::Cone;
use crate::apis::image::Image;
use crate::apis::registry::Registry;
use crate::apis::spectra::Spectra;
use crate::apis::tap::Tap;
use crate::apis::QueryContext;
use crate::app::ports::{HttpClientPort, NameResolver};
use crate::config::Config;
use crate::error::Result;
use crate::infra::http_client::ReqwestHttp;
use crate::resolver::SesameResolver;

/// Entry point tying the HTTP client, name resolver and configuration together.
#[derive(Clone)]
pub struct VoClient {
    ctx: QueryContext,
}

impl VoClient {
    /// Client backed by `reqwest` and the Sesame resolver named in `config`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let http: Arc<dyn HttpClientPort> = Arc::new(ReqwestHttp::new(&config.http.user_agent)?);
        Ok(Self::with_http(http, config))
    }

    /// Client over any HTTP port; object names resolve through Sesame on the same port.
    pub fn with_http(http: Arc<dyn HttpClientPort>, config: Config) -> Self {
        let resolver: Arc<dyn NameResolver> = Arc::new(SesameResolver::new(
            http.clone(),
            config.resolver.sesame_url.clone(),
            config.resolver_policy(),
        ));
        Self {
            ctx: QueryContext::new(http, Some(resolver), Arc::new(config)),
        }
    }

    /// Replace the name resolver, or drop it so that only coordinates are accepted.
    pub fn with_resolver(mut self, resolver: Option<Arc<dyn NameResolver>>) -> Self {
        self.ctx.resolver = resolver;
        self
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    pub fn resolver(&self) -> Option<&dyn NameResolver> {
        self.ctx.resolver.as_deref()
    }

    pub fn cone(&self) -> Cone {
        Cone::new(self.ctx.clone())
    }

    pub fn image(&self) -> Image {
        Image::new(self.ctx.clone())
    }

    pub fn spectra(&self) -> Spectra {
        Spectra::new(self.ctx.clone())
    }

    pub fn tap(&self) -> Tap {
        Tap::new(self.ctx.clone())
    }

    pub fn registry(&self) -> Registry {
        Registry::new(self.ctx.clone())
    }
}
