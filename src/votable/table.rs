use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::app::ports::HttpResponse;
use crate::constants::{ERROR_INFO, QUERY_STATUS_INFO};
use crate::error::{Result, VoError};

/// Column definition taken from a VOTABLE `FIELD`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub id: Option<String>,
    pub datatype: String,
    pub arraysize: Option<String>,
    pub unit: Option<String>,
    pub ucd: Option<String>,
    pub utype: Option<String>,
    pub description: Option<String>,
    /// Sentinel from `<VALUES null="...">`
    pub null_value: Option<String>,
}

impl Field {
    pub fn is_character(&self) -> bool {
        matches!(self.datatype.as_str(), "char" | "unicodeChar")
    }
}

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(values: &[T]) -> String {
            values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        }
        match self {
            Value::Null => write!(f, "--"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::IntArray(v) => write!(f, "{}", join(v)),
            Value::FloatArray(v) => write!(f, "{}", join(v)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub value: String,
    pub datatype: Option<String>,
    pub unit: Option<String>,
    pub ucd: Option<String>,
    pub utype: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Info {
    pub name: String,
    pub value: Option<String>,
    pub content: Option<String>,
}

impl Info {
    /// Content if present, otherwise the value attribute
    pub fn message(&self) -> Option<&str> {
        self.content
            .as_deref()
            .filter(|c| !c.is_empty())
            .or(self.value.as_deref())
    }
}

/// Provenance kept with every table. Each entry is a list so that stacked
/// tables remember every request they came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableMeta {
    pub xml_raw: Vec<String>,
    pub url: Vec<String>,
    pub queried_at: Vec<DateTime<Utc>>,
    pub error: Vec<String>,
}

impl TableMeta {
    pub fn from_response(response: &HttpResponse) -> Self {
        Self {
            xml_raw: vec![response.text_lossy()],
            url: vec![response.url.clone()],
            queried_at: vec![Utc::now()],
            error: Vec::new(),
        }
    }

    pub fn extend(&mut self, other: &TableMeta) {
        self.xml_raw.extend(other.xml_raw.iter().cloned());
        self.url.extend(other.url.iter().cloned());
        self.queried_at.extend(other.queried_at.iter().cloned());
        self.error.extend(other.error.iter().cloned());
    }
}

/// In-memory result table built from the first `TABLE` of a VOTABLE document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VoTable {
    pub description: Option<String>,
    pub fields: Vec<Field>,
    pub rows: Vec<Vec<Value>>,
    pub params: Vec<Param>,
    pub infos: Vec<Info>,
    pub meta: TableMeta,
}

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    table: &'a VoTable,
    index: usize,
}

impl<'a> RowRef<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let col = self.table.column_index(column)?;
        self.table.rows[self.index].get(col)
    }

    pub fn get_at(&self, col: usize) -> Option<&'a Value> {
        self.table.rows[self.index].get(col)
    }

    pub fn values(&self) -> &'a [Value] {
        &self.table.rows[self.index]
    }
}

impl VoTable {
    /// Empty table that still records where it came from.
    pub fn empty_with_meta(response: &HttpResponse, error: Option<String>) -> Self {
        let mut meta = TableMeta::from_response(response);
        meta.error.extend(error);
        Self {
            meta,
            ..Self::default()
        }
    }

    /// Empty table for a request that never produced a response.
    pub fn failed(url: &str, error: String) -> Self {
        Self {
            meta: TableMeta {
                url: vec![url.to_string()],
                queried_at: vec![Utc::now()],
                error: vec![error],
                ..TableMeta::default()
            },
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Index of a column by name; exact match first, then case-insensitive.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .or_else(|| self.fields.iter().position(|f| f.name.eq_ignore_ascii_case(name)))
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|row| row.get(col)).collect())
    }

    pub fn row(&self, index: usize) -> Option<RowRef<'_>> {
        (index < self.rows.len()).then_some(RowRef { table: self, index })
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        (0..self.rows.len()).map(move |index| RowRef { table: self, index })
    }

    /// First column whose UCD equals `ucd`.
    pub fn find_column_by_ucd(&self, ucd: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.ucd.as_deref() == Some(ucd))
    }

    /// First column whose utype matches `utype`, ignoring case.
    pub fn find_column_by_utype(&self, utype: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.utype.as_deref().is_some_and(|u| u.eq_ignore_ascii_case(utype)))
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn info(&self, name: &str) -> Option<&Info> {
        self.infos.iter().find(|i| i.name.eq_ignore_ascii_case(name))
    }

    /// Value of the `QUERY_STATUS` INFO, if the service sent one.
    pub fn query_status(&self) -> Option<&str> {
        self.info(QUERY_STATUS_INFO).and_then(|i| i.value.as_deref())
    }

    /// Error reported by the service inside the document.
    ///
    /// Recognises `QUERY_STATUS=ERROR` and the cone-search convention of an
    /// `INFO` or `PARAM` named `Error`.
    pub fn error_message(&self) -> Option<String> {
        if let Some(info) = self.info(QUERY_STATUS_INFO) {
            if info.value.as_deref().is_some_and(|v| v.eq_ignore_ascii_case("ERROR")) {
                return Some(info.content.clone().unwrap_or_else(|| "ERROR".to_string()));
            }
        }
        if let Some(info) = self.info(ERROR_INFO) {
            return info.message().map(str::to_string);
        }
        self.param(ERROR_INFO).map(|p| p.value.clone())
    }

    /// Append rows of tables that share this table's column names.
    pub fn vstack(tables: Vec<VoTable>) -> Result<VoTable> {
        let mut iter = tables.into_iter();
        let Some(mut stacked) = iter.next() else {
            return Ok(VoTable::default());
        };
        for table in iter {
            if stacked.fields.is_empty() && stacked.rows.is_empty() {
                // An empty error table adopts the next table's columns
                let meta = std::mem::take(&mut stacked.meta);
                let table_meta = table.meta.clone();
                stacked = VoTable { meta, ..table };
                stacked.meta.extend(&table_meta);
                continue;
            }
            if !table.fields.is_empty() && table.column_names() != stacked.column_names() {
                return Err(VoError::invalid(format!(
                    "cannot stack tables with different columns: {:?} vs {:?}",
                    stacked.column_names(),
                    table.column_names()
                )));
            }
            stacked.rows.extend(table.rows);
            stacked.infos.extend(table.infos);
            stacked.meta.extend(&table.meta);
        }
        Ok(stacked)
    }
}
