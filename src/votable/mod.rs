//! VOTABLE responses as in-memory tables.

pub mod parser;
pub mod table;

pub use parser::parse_votable;
pub use table::{Field, Info, Param, RowRef, TableMeta, Value, VoTable};

use tracing::{debug, warn};

use crate::app::ports::HttpResponse;
use crate::error::{Result, VoError};
use crate::observability::metrics;

const SNIPPET_CHARS: usize = 200;

/// Parse a service response and attach its provenance (raw XML, URL, time).
///
/// A body that is not a VOTABLE is reported as `HttpStatus` when the service
/// also answered with a non-success status, since the status is then the
/// more useful explanation.
pub fn votable_from_response(response: &HttpResponse) -> Result<VoTable> {
    match parse_votable(&response.body) {
        Ok(mut table) => {
            table.meta = TableMeta::from_response(response);
            metrics::votable::parsed(table.len());
            if let Some(message) = table.error_message() {
                warn!(url = %response.url, error = %message, "service reported an error");
                table.meta.error.push(message);
            } else {
                debug!(url = %response.url, rows = table.len(), "parsed VOTABLE");
            }
            Ok(table)
        }
        Err(err) => {
            metrics::votable::parse_error();
            if response.is_success() {
                Err(err)
            } else {
                Err(VoError::HttpStatus {
                    url: response.url.clone(),
                    status: response.status,
                    snippet: response.text_lossy().chars().take(SNIPPET_CHARS).collect(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            url: "http://svc.example/cone?RA=1&DEC=2&SR=0.1".into(),
            content_type: "text/xml".into(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn attaches_provenance() {
        let body = r#"<VOTABLE><RESOURCE><TABLE><FIELD name="a" datatype="int"/>
            <DATA><TABLEDATA><TR><TD>7</TD></TR></TABLEDATA></DATA></TABLE></RESOURCE></VOTABLE>"#;
        let table = votable_from_response(&response(200, body)).unwrap();
        assert_eq!(table.meta.url, vec!["http://svc.example/cone?RA=1&DEC=2&SR=0.1"]);
        assert_eq!(table.meta.xml_raw, vec![body.to_string()]);
        assert_eq!(table.meta.queried_at.len(), 1);
        assert!(table.meta.error.is_empty());
    }

    #[test]
    fn service_errors_are_recorded_in_meta() {
        let body = r#"<VOTABLE><INFO name="Error" value="Unknown table foobar"/></VOTABLE>"#;
        let table = votable_from_response(&response(200, body)).unwrap();
        assert_eq!(table.meta.error, vec!["Unknown table foobar"]);
    }

    #[test]
    fn non_votable_with_bad_status_reports_status() {
        let err = votable_from_response(&response(500, "Internal Server Error")).unwrap_err();
        match err {
            VoError::HttpStatus { status, snippet, .. } => {
                assert_eq!(status, 500);
                assert_eq!(snippet, "Internal Server Error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_votable_with_ok_status_is_votable_error() {
        let err = votable_from_response(&response(200, "<html/>")).unwrap_err();
        assert!(matches!(err, VoError::Votable(_)));
    }
}
