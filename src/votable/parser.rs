use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::table::{Field, Info, Param, Value, VoTable};
use crate::error::{Result, VoError};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Stage {
    #[default]
    BeforeTable,
    InTable,
    AfterTable,
}

/// Streaming state while walking the document.
#[derive(Default)]
struct ParseState {
    table: VoTable,
    saw_root: bool,
    closed_root: bool,
    stage: Stage,
    field: Option<Field>,
    param: Option<Param>,
    info: Option<Info>,
    row: Option<Vec<Value>>,
    cell: Option<String>,
    description: Option<String>,
}

/// Parse the first `TABLE` of a VOTABLE document.
///
/// Only the `TABLEDATA` serialization is understood. `INFO` and `PARAM`
/// elements are collected from every level of the document; `FIELD`s and
/// rows only from the first table.
pub fn parse_votable(bytes: &[u8]) -> Result<VoTable> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut state = ParseState::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => state.start(&e)?,
            Ok(Event::Empty(e)) => {
                state.start(&e)?;
                state.end(e.local_name().as_ref());
            }
            Ok(Event::End(e)) => state.end(e.local_name().as_ref()),
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| VoError::votable(format!("bad character data: {}", e)))?;
                state.text(&text);
            }
            Ok(Event::CData(c)) => state.text(&String::from_utf8_lossy(&c.into_inner())),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(VoError::votable(format!(
                    "malformed XML near byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    state.finish()
}

impl ParseState {
    fn start(&mut self, e: &BytesStart) -> Result<()> {
        let local = e.local_name();
        let name = local.as_ref();

        if !self.saw_root {
            if name != b"VOTABLE" {
                return Err(VoError::votable(format!(
                    "expected a VOTABLE document, found <{}>",
                    String::from_utf8_lossy(name)
                )));
            }
            self.saw_root = true;
            return Ok(());
        }

        let in_table = self.stage == Stage::InTable;
        match name {
            b"TABLE" if self.stage == Stage::BeforeTable => self.stage = Stage::InTable,
            b"FIELD" if in_table => self.field = Some(field_from(e)?),
            b"VALUES" => {
                if let Some(field) = self.field.as_mut() {
                    field.null_value = attr(e, b"null")?;
                }
            }
            b"PARAM" => self.param = Some(param_from(e)?),
            b"INFO" => {
                self.info = Some(Info {
                    name: attr(e, b"name")?.unwrap_or_default(),
                    value: attr(e, b"value")?,
                    content: None,
                })
            }
            b"DESCRIPTION" => self.description = Some(String::new()),
            b"TR" if in_table => self.row = Some(Vec::with_capacity(self.table.fields.len())),
            b"TD" if self.row.is_some() => self.cell = Some(String::new()),
            b"BINARY" | b"BINARY2" | b"FITS" if in_table => {
                return Err(VoError::votable(format!(
                    "unsupported serialization {}",
                    String::from_utf8_lossy(name)
                )))
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some(cell) = self.cell.as_mut() {
            cell.push_str(text);
        } else if let Some(desc) = self.description.as_mut() {
            desc.push_str(text);
        } else if let Some(info) = self.info.as_mut() {
            info.content.get_or_insert_with(String::new).push_str(text);
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"VOTABLE" => self.closed_root = true,
            b"TABLE" if self.stage == Stage::InTable => self.stage = Stage::AfterTable,
            b"FIELD" => {
                if let Some(field) = self.field.take() {
                    self.table.fields.push(field);
                }
            }
            b"PARAM" => {
                if let Some(param) = self.param.take() {
                    self.table.params.push(param);
                }
            }
            b"INFO" => {
                if let Some(info) = self.info.take() {
                    self.table.infos.push(info);
                }
            }
            b"DESCRIPTION" => {
                let Some(desc) = self.description.take() else {
                    return;
                };
                if let Some(field) = self.field.as_mut() {
                    field.description = Some(desc);
                } else if self.param.is_none()
                    && self.stage != Stage::AfterTable
                    && self.table.description.is_none()
                {
                    self.table.description = Some(desc);
                }
            }
            b"TD" => {
                if let (Some(raw), Some(row)) = (self.cell.take(), self.row.as_mut()) {
                    let field = self.table.fields.get(row.len());
                    row.push(convert_cell(field, &raw));
                }
            }
            b"TR" => {
                if let Some(mut row) = self.row.take() {
                    if row.len() < self.table.fields.len() {
                        row.resize(self.table.fields.len(), Value::Null);
                    }
                    self.table.rows.push(row);
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> Result<VoTable> {
        if !self.saw_root {
            return Err(VoError::votable("document is empty"));
        }
        if !self.closed_root {
            return Err(VoError::votable("document ended before </VOTABLE>"));
        }
        Ok(self.table)
    }
}

fn attr(e: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(|err| VoError::votable(format!("bad attribute: {}", err)))?;
        if a.key.local_name().as_ref() == key {
            let value = a
                .unescape_value()
                .map_err(|err| VoError::votable(format!("bad attribute value: {}", err)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn field_from(e: &BytesStart) -> Result<Field> {
    let id = attr(e, b"ID")?;
    let name = attr(e, b"name")?
        .or_else(|| id.clone())
        .unwrap_or_default();
    Ok(Field {
        name,
        id,
        datatype: attr(e, b"datatype")?.unwrap_or_else(|| "char".to_string()),
        arraysize: attr(e, b"arraysize")?,
        unit: attr(e, b"unit")?,
        ucd: attr(e, b"ucd")?,
        utype: attr(e, b"utype")?,
        description: None,
        null_value: None,
    })
}

fn param_from(e: &BytesStart) -> Result<Param> {
    Ok(Param {
        name: attr(e, b"name")?.or(attr(e, b"ID")?).unwrap_or_default(),
        value: attr(e, b"value")?.unwrap_or_default(),
        datatype: attr(e, b"datatype")?,
        unit: attr(e, b"unit")?,
        ucd: attr(e, b"ucd")?,
        utype: attr(e, b"utype")?,
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "t" | "true" | "1" => Some(true),
        "f" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Convert one `TD` according to its field's datatype.
///
/// Empty cells, NaN scalars and the field's null sentinel become `Null`.
/// Text that does not fit the declared type is kept as text rather than lost.
pub(crate) fn convert_cell(field: Option<&Field>, raw: &str) -> Value {
    let raw = raw.trim();
    if raw.is_empty() {
        return Value::Null;
    }
    let Some(field) = field else {
        return Value::Text(raw.to_string());
    };
    if field.null_value.as_deref() == Some(raw) {
        return Value::Null;
    }
    if field.is_character() {
        return Value::Text(raw.to_string());
    }

    let is_array = field.arraysize.as_deref().is_some_and(|size| size != "1");
    let text = || Value::Text(raw.to_string());
    match field.datatype.as_str() {
        "boolean" if !is_array => parse_bool(raw).map(Value::Bool).unwrap_or(Value::Null),
        "short" | "int" | "long" | "unsignedByte" => {
            if is_array {
                raw.split_whitespace()
                    .map(|t| t.parse::<i64>())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map(Value::IntArray)
                    .unwrap_or_else(|_| text())
            } else {
                raw.parse::<i64>().map(Value::Int).unwrap_or_else(|_| text())
            }
        }
        "float" | "double" => {
            if is_array {
                raw.split_whitespace()
                    .map(|t| t.parse::<f64>())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map(Value::FloatArray)
                    .unwrap_or_else(|_| text())
            } else if raw.eq_ignore_ascii_case("nan") {
                Value::Null
            } else {
                parse_float(raw).map(Value::Float).unwrap_or_else(text)
            }
        }
        _ => text(),
    }
}
