//! Service descriptors and their coercion from the shapes users pass in.

use serde::Serialize;
use tracing::warn;

use crate::votable::{RowRef, Value, VoTable};

/// One VO service endpoint, as typed by hand or returned by the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceDescriptor {
    pub access_url: String,
    pub short_name: Option<String>,
    pub ivoid: Option<String>,
    pub waveband: Option<String>,
    pub res_description: Option<String>,
    pub reference_url: Option<String>,
}

impl ServiceDescriptor {
    pub fn new(access_url: impl Into<String>) -> Self {
        Self {
            access_url: access_url.into(),
            ..Self::default()
        }
    }

    /// Short name when known, otherwise the access URL
    pub fn label(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.access_url)
    }

    /// Build from a registry result row; rows without an access URL yield `None`.
    pub fn from_row(row: &RowRef<'_>) -> Option<Self> {
        let text = |name: &str| -> Option<String> {
            match row.get(name)? {
                Value::Null => None,
                value => Some(value.to_string().trim().to_string()).filter(|s| !s.is_empty()),
            }
        };
        let access_url = unescape_html(&text("access_url")?);
        Some(Self {
            access_url,
            short_name: text("short_name"),
            ivoid: text("ivoid"),
            waveband: text("waveband"),
            res_description: text("res_description"),
            reference_url: text("reference_url"),
        })
    }
}

impl From<&str> for ServiceDescriptor {
    fn from(url: &str) -> Self {
        ServiceDescriptor::new(url)
    }
}

impl From<String> for ServiceDescriptor {
    fn from(url: String) -> Self {
        ServiceDescriptor::new(url)
    }
}

impl From<&ServiceDescriptor> for ServiceDescriptor {
    fn from(service: &ServiceDescriptor) -> Self {
        service.clone()
    }
}

/// Registry URLs sometimes arrive HTML-escaped twice; undo the leftovers.
fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Rows of a registry table as descriptors, skipping rows without an access URL.
pub fn services_from_table(table: &VoTable) -> Vec<ServiceDescriptor> {
    table
        .iter_rows()
        .filter_map(|row| ServiceDescriptor::from_row(&row))
        .collect()
}

/// The services a query should visit, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceSet(pub Vec<ServiceDescriptor>);

impl ServiceSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServiceDescriptor> {
        self.0.iter()
    }

    /// Keep at most `max_services`, warning when some are dropped.
    pub fn limit(mut self, max_services: usize) -> Self {
        if self.0.len() > max_services {
            warn!(
                requested = self.0.len(),
                max_services,
                "asked to query more services than allowed; only the first {} will be queried (raise max_services to query more)",
                max_services
            );
            self.0.truncate(max_services);
        }
        self
    }
}

impl From<&str> for ServiceSet {
    fn from(url: &str) -> Self {
        ServiceSet(vec![ServiceDescriptor::new(url)])
    }
}

impl From<String> for ServiceSet {
    fn from(url: String) -> Self {
        ServiceSet(vec![ServiceDescriptor::new(url)])
    }
}

impl From<ServiceDescriptor> for ServiceSet {
    fn from(service: ServiceDescriptor) -> Self {
        ServiceSet(vec![service])
    }
}

impl From<Vec<ServiceDescriptor>> for ServiceSet {
    fn from(services: Vec<ServiceDescriptor>) -> Self {
        ServiceSet(services)
    }
}

impl From<Vec<&str>> for ServiceSet {
    fn from(urls: Vec<&str>) -> Self {
        ServiceSet(urls.into_iter().map(ServiceDescriptor::new).collect())
    }
}

impl From<&VoTable> for ServiceSet {
    fn from(table: &VoTable) -> Self {
        ServiceSet(services_from_table(table))
    }
}

impl<'a> From<RowRef<'a>> for ServiceSet {
    fn from(row: RowRef<'a>) -> Self {
        ServiceSet(ServiceDescriptor::from_row(&row).into_iter().collect())
    }
}
