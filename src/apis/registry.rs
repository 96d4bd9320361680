//! Service discovery through a RegTAP registry.

use tracing::{debug, info, instrument};

use super::tap::sync_url;
use super::QueryContext;
use crate::app::ports::HttpRequest;
use crate::constants::{service_type_to_cap_type, TAP_LANG, TAP_REQUEST};
use crate::error::Result;
use crate::query::try_query;
use crate::services::{services_from_table, ServiceSet};
use crate::votable::{votable_from_response, RowRef, Value, VoTable};

const SELECT_COLUMNS: &str = "res.waveband, res.short_name, cap.ivoid, res.res_description, \
int.access_url, res.reference_url";
const FROM_TABLES: &str =
    "rr.capability cap natural join rr.resource res natural join rr.interface int";

/// Constraints for a registry search. Unset fields add no constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryFilter {
    pub service_type: Option<String>,
    pub keyword: Option<String>,
    pub waveband: Option<String>,
    pub source: Option<String>,
    pub order_by: Option<String>,
    /// Joins the WHERE clauses; usually `" and "` or `" or "`
    pub logic: String,
}

impl Default for RegistryFilter {
    fn default() -> Self {
        Self {
            service_type: None,
            keyword: None,
            waveband: None,
            source: None,
            order_by: None,
            logic: " and ".to_string(),
        }
    }
}

impl RegistryFilter {
    pub fn service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn waveband(mut self, waveband: impl Into<String>) -> Self {
        self.waveband = Some(waveband.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn logic(mut self, logic: impl Into<String>) -> Self {
        self.logic = logic.into();
        self
    }
}

fn quote(value: &str) -> String {
    value.replace('\'', "''")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// ADQL for a RegTAP search matching `filter`.
pub fn build_adql(filter: &RegistryFilter) -> String {
    let cap_type = service_type_to_cap_type(filter.service_type.as_deref().unwrap_or(""));
    let mut wheres = vec![format!("cap.cap_type='{}'", cap_type)];

    if let Some(source) = non_empty(&filter.source) {
        wheres.push(format!("cap.ivoid like '%{}%'", quote(source)));
    }
    if let Some(waveband) = non_empty(&filter.waveband) {
        wheres.push(format!("res.waveband like '%{}%'", quote(waveband)));
    }
    if let Some(keyword) = non_empty(&filter.keyword) {
        let k = quote(keyword);
        wheres.push(format!(
            "(res.res_description like '%{k}%' or res.res_title like '%{k}%' or cap.ivoid like '%{k}%')"
        ));
    }

    let mut adql = format!(
        "select {} from {} where {}",
        SELECT_COLUMNS,
        FROM_TABLES,
        wheres.join(&filter.logic)
    );
    if let Some(order_by) = non_empty(&filter.order_by) {
        adql.push_str(" order by ");
        adql.push_str(order_by);
    }
    adql
}

pub struct Registry {
    ctx: QueryContext,
}

impl Registry {
    pub fn new(ctx: QueryContext) -> Self {
        Self { ctx }
    }

    /// Run the registry search and return the raw result table.
    #[instrument(skip(self))]
    pub async fn query(&self, filter: &RegistryFilter) -> Result<VoTable> {
        let adql = build_adql(filter);
        let url = sync_url(&self.ctx.config.registry.tap_url);
        debug!(%url, %adql, "registry query");

        let request = HttpRequest::post(
            url,
            vec![
                ("request".to_string(), TAP_REQUEST.to_string()),
                ("lang".to_string(), TAP_LANG.to_string()),
                ("query".to_string(), adql),
            ],
        );
        let response = try_query(
            self.ctx.http.as_ref(),
            request,
            &self.ctx.config.registry_policy(),
            "registry",
        )
        .await?;
        debug!(queried = %response.url, "registry answered");
        let table = votable_from_response(&response)?;
        info!(rows = table.len(), "registry search finished");
        Ok(table)
    }

    /// Registry search as a list of services ready for a protocol query.
    pub async fn services(&self, filter: &RegistryFilter) -> Result<ServiceSet> {
        let table = self.query(filter).await?;
        Ok(ServiceSet(services_from_table(&table)))
    }
}

/// One registry row as a short Markdown-ish block.
pub fn format_registry_row(row: &RowRef<'_>) -> String {
    let text = |name: &str| -> String {
        match row.get(name) {
            Some(Value::Null) | None => String::new(),
            Some(value) => value.to_string().trim().to_string(),
        }
    };
    format!(
        "### {} ({})\n{}\nMore info: {}\nAccess URL: {}\n",
        text("short_name"),
        text("ivoid"),
        text("res_description"),
        text("reference_url"),
        text("access_url")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::votable::Field;

    #[test]
    fn default_filter_selects_tap_services() {
        let adql = build_adql(&RegistryFilter::default());
        assert!(adql.starts_with("select res.waveband, res.short_name, cap.ivoid"));
        assert!(adql.contains("from rr.capability cap natural join rr.resource res"));
        assert!(adql.ends_with("where cap.cap_type='tableaccess'"));
    }

    #[test]
    fn clauses_are_joined_by_logic() {
        let filter = RegistryFilter::default()
            .service_type("image")
            .waveband("x-ray")
            .source("heasarc")
            .order_by("short_name");
        let adql = build_adql(&filter);
        assert!(adql.contains(
            "where cap.cap_type='simpleimageaccess' and cap.ivoid like '%heasarc%' and res.waveband like '%x-ray%'"
        ));
        assert!(adql.ends_with(" order by short_name"));

        let or_adql = build_adql(&RegistryFilter::default().service_type("cone").keyword("swift").logic(" or "));
        assert!(or_adql.contains(
            "cap.cap_type='conesearch' or (res.res_description like '%swift%' or res.res_title like '%swift%' or cap.ivoid like '%swift%')"
        ));
    }

    #[test]
    fn single_quotes_are_doubled() {
        let adql = build_adql(&RegistryFilter::default().keyword("o'brien"));
        assert!(adql.contains("like '%o''brien%'"));
    }

    #[test]
    fn blank_values_add_no_constraint() {
        let adql = build_adql(&RegistryFilter::default().service_type("spectra").waveband("  "));
        assert!(adql.ends_with("where cap.cap_type='simplespectralaccess'"));
    }

    #[test]
    fn formats_row_for_display() {
        let names = ["short_name", "ivoid", "res_description", "reference_url", "access_url"];
        let table = VoTable {
            fields: names
                .iter()
                .map(|n| Field {
                    name: n.to_string(),
                    datatype: "char".into(),
                    ..Field::default()
                })
                .collect(),
            rows: vec![vec![
                Value::Text("Chandra".into()),
                Value::Text("ivo://cxc.harvard.edu/cxcsia".into()),
                Value::Text("Chandra X-ray images".into()),
                Value::Null,
                Value::Text("https://cda.harvard.edu/cxcsia?".into()),
            ]],
            ..VoTable::default()
        };
        let text = format_registry_row(&table.row(0).unwrap());
        assert_eq!(
            text,
            "### Chandra (ivo://cxc.harvard.edu/cxcsia)\nChandra X-ray images\nMore info: \nAccess URL: https://cda.harvard.edu/cxcsia?\n"
        );
    }
}
