//! Simple Image Access (SIA v1).

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use tracing::{info, instrument};

use super::{PositionalParams, QueryContext};
use crate::app::ports::HttpRequest;
use crate::constants::{DEFAULT_POINT_RADIUS_DEG, IMAGE_SERVICE};
use crate::coords::{CoordList, RadiusArg};
use crate::error::{Result, VoError};
use crate::query::{query_loop, try_query, OneSearch, RetryPolicy};
use crate::services::{ServiceDescriptor, ServiceSet};
use crate::votable::{votable_from_response, Field, Value, VoTable};

/// Image format accepted by SIA services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Fits,
    Jpeg,
    Png,
    Graphics,
    All,
}

impl ImageFormat {
    /// Value sent as the `FORMAT` parameter.
    pub fn as_param(&self) -> &'static str {
        match self {
            ImageFormat::Fits => "image/fits",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Graphics => "GRAPHICS",
            ImageFormat::All => "ALL",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = VoError;

    /// Case-insensitive and lenient: `"FITS"`, `"image/fits"` and
    /// `"fits files"` all select FITS.
    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.to_lowercase();
        if lowered.contains("fits") {
            Ok(ImageFormat::Fits)
        } else if lowered.contains("jpeg") || lowered.contains("jpg") {
            Ok(ImageFormat::Jpeg)
        } else if lowered.contains("png") {
            Ok(ImageFormat::Png)
        } else if lowered.contains("graphics") {
            Ok(ImageFormat::Graphics)
        } else if lowered.contains("all") {
            Ok(ImageFormat::All)
        } else {
            Err(VoError::invalid(format!(
                "format '{}' should be one of FITS, JPEG, PNG, ALL, or GRAPHICS",
                s
            )))
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

/// Optional format string to its `FORMAT` value.
pub(crate) fn format_param(format: Option<&str>) -> Result<Option<String>> {
    format
        .map(|f| f.parse::<ImageFormat>().map(|f| f.as_param().to_string()))
        .transpose()
}

/// Well-known SIA result columns, identified by UCD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageColumn {
    Title,
    Ra,
    Dec,
    Naxes,
    Naxis,
    Scale,
    Format,
    AccessUrl,
    Instrument,
    MjdObs,
    RefFrame,
    Bandpass,
    BandpassUnit,
    BandpassRefval,
    BandpassHiLimit,
    BandpassLoLimit,
    PixFlags,
    FileSize,
    Projection,
    Crpix,
    Crval,
    CdMatrix,
}

impl ImageColumn {
    pub const ALL: [ImageColumn; 22] = [
        ImageColumn::Title,
        ImageColumn::Ra,
        ImageColumn::Dec,
        ImageColumn::Naxes,
        ImageColumn::Naxis,
        ImageColumn::Scale,
        ImageColumn::Format,
        ImageColumn::AccessUrl,
        ImageColumn::Instrument,
        ImageColumn::MjdObs,
        ImageColumn::RefFrame,
        ImageColumn::Bandpass,
        ImageColumn::BandpassUnit,
        ImageColumn::BandpassRefval,
        ImageColumn::BandpassHiLimit,
        ImageColumn::BandpassLoLimit,
        ImageColumn::PixFlags,
        ImageColumn::FileSize,
        ImageColumn::Projection,
        ImageColumn::Crpix,
        ImageColumn::Crval,
        ImageColumn::CdMatrix,
    ];

    pub fn ucd(&self) -> &'static str {
        match self {
            ImageColumn::Title => "VOX:Image_Title",
            ImageColumn::Ra => "POS_EQ_RA_MAIN",
            ImageColumn::Dec => "POS_EQ_DEC_MAIN",
            ImageColumn::Naxes => "VOX:Image_Naxes",
            ImageColumn::Naxis => "VOX:Image_Naxis",
            ImageColumn::Scale => "VOX:Image_Scale",
            ImageColumn::Format => "VOX:Image_Format",
            ImageColumn::AccessUrl => "VOX:Image_AccessReference",
            ImageColumn::Instrument => "INST_ID",
            ImageColumn::MjdObs => "VOX:Image_MJDateObs",
            ImageColumn::RefFrame => "VOX:STC_CoordRefFrame",
            ImageColumn::Bandpass => "VOX:BandPass_ID",
            ImageColumn::BandpassUnit => "VOX:BandPass_Unit",
            ImageColumn::BandpassRefval => "VOX:BandPass_RefValue",
            ImageColumn::BandpassHiLimit => "VOX:BandPass_HiLimit",
            ImageColumn::BandpassLoLimit => "VOX:BandPass_LoLimit",
            ImageColumn::PixFlags => "VOX:Image_PixFlags",
            ImageColumn::FileSize => "VOX:Image_FileSize",
            ImageColumn::Projection => "VOX:WCS_CoordProjection",
            ImageColumn::Crpix => "VOX:WCS_CoordRefPixel",
            ImageColumn::Crval => "VOX:WCS_CoordRefValue",
            ImageColumn::CdMatrix => "VOX:WCS_CDMatrix",
        }
    }
}

impl FromStr for ImageColumn {
    type Err = VoError;

    /// Mnemonic such as `"access_url"` or `"MJD_OBS"`.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.replace('_', "").to_lowercase();
        ImageColumn::ALL
            .into_iter()
            .find(|c| format!("{:?}", c).to_lowercase() == wanted)
            .ok_or_else(|| VoError::invalid(format!("unknown image column '{}'", s)))
    }
}

/// Column carrying `mnemonic`'s UCD in any table.
pub fn get_column(table: &VoTable, mnemonic: ImageColumn) -> Option<&Field> {
    table.find_column_by_ucd(mnemonic.ucd())
}

pub fn get_column_name(table: &VoTable, mnemonic: ImageColumn) -> Option<&str> {
    get_column(table, mnemonic).map(|f| f.name.as_str())
}

/// An SIA result table with lookup by [`ImageColumn`].
#[derive(Debug, Clone, Default)]
pub struct ImageTable {
    table: VoTable,
    columns: OnceCell<HashMap<ImageColumn, String>>,
}

impl ImageTable {
    pub fn new(table: VoTable) -> Self {
        Self {
            table,
            columns: OnceCell::new(),
        }
    }

    fn columns(&self) -> &HashMap<ImageColumn, String> {
        self.columns.get_or_init(|| {
            ImageColumn::ALL
                .into_iter()
                .filter_map(|c| get_column_name(&self.table, c).map(|name| (c, name.to_string())))
                .collect()
        })
    }

    pub fn column_name(&self, mnemonic: ImageColumn) -> Option<&str> {
        self.columns().get(&mnemonic).map(String::as_str)
    }

    pub fn column(&self, mnemonic: ImageColumn) -> Option<Vec<&Value>> {
        self.table.column(self.column_name(mnemonic)?)
    }

    pub fn value(&self, row: usize, mnemonic: ImageColumn) -> Option<&Value> {
        let name = self.column_name(mnemonic)?;
        self.table.row(row)?.get(name)
    }

    pub fn into_inner(self) -> VoTable {
        self.table
    }
}

impl Deref for ImageTable {
    type Target = VoTable;

    fn deref(&self) -> &VoTable {
        &self.table
    }
}

impl From<VoTable> for ImageTable {
    fn from(table: VoTable) -> Self {
        ImageTable::new(table)
    }
}

pub struct Image {
    ctx: QueryContext,
    policy: RetryPolicy,
}

impl Image {
    pub fn new(ctx: QueryContext) -> Self {
        let policy = ctx.config.image.retry_policy(ctx.config.http.retry_backoff_ms);
        Self { ctx, policy }
    }

    /// Image search around every position. `radius` defaults to a point search.
    pub async fn query(
        &self,
        services: impl Into<ServiceSet>,
        coords: impl Into<CoordList>,
        radius: Option<RadiusArg>,
        format: Option<&str>,
    ) -> Result<Vec<ImageTable>> {
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

        info!(services = services.len(), positions = params.len(), "starting image search");
        let tables = query_loop(self, &services, &params, self.ctx.config.query.error_handling).await?;
        Ok(tables.into_iter().map(ImageTable::new).collect())
    }
}

#[async_trait]
impl OneSearch for Image {
    type Params = PositionalParams;

    fn protocol(&self) -> &'static str {
        IMAGE_SERVICE
    }

    #[instrument(skip(self, service), fields(service = %service.label()))]
    async fn search(&self, service: &ServiceDescriptor, params: &PositionalParams) -> Result<VoTable> {
        let request = HttpRequest::get(service.access_url.clone(), params.to_query());
        let response = try_query(self.ctx.http.as_ref(), request, &self.policy, IMAGE_SERVICE).await?;
        votable_from_response(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_coercion() {
        assert_eq!("FITS".parse::<ImageFormat>().unwrap(), ImageFormat::Fits);
        assert_eq!("image/fits".parse::<ImageFormat>().unwrap(), ImageFormat::Fits);
        assert_eq!("jpg".parse::<ImageFormat>().unwrap().as_param(), "image/jpeg");
        assert_eq!("Png".parse::<ImageFormat>().unwrap().as_param(), "image/png");
        assert_eq!("graphics".parse::<ImageFormat>().unwrap().as_param(), "GRAPHICS");
        assert_eq!("all".parse::<ImageFormat>().unwrap().as_param(), "ALL");
        let err = "tiff".parse::<ImageFormat>().unwrap_err();
        assert!(err.to_string().contains("one of FITS, JPEG, PNG, ALL, or GRAPHICS"));
        assert_eq!(format_param(None).unwrap(), None);
    }

    #[test]
    fn mnemonics_parse_from_names() {
        assert_eq!("access_url".parse::<ImageColumn>().unwrap(), ImageColumn::AccessUrl);
        assert_eq!("MJD_OBS".parse::<ImageColumn>().unwrap(), ImageColumn::MjdObs);
        assert!("nope".parse::<ImageColumn>().is_err());
    }

    fn sia_table() -> VoTable {
        let field = |name: &str, ucd: &str, datatype: &str| Field {
            name: name.to_string(),
            ucd: Some(ucd.to_string()),
            datatype: datatype.to_string(),
            ..Field::default()
        };
        VoTable {
            fields: vec![
                field("obs_title", "VOX:Image_Title", "char"),
                field("ra", "POS_EQ_RA_MAIN", "double"),
                field("url", "VOX:Image_AccessReference", "char"),
            ],
            rows: vec![vec![
                Value::Text("M82 broadband".into()),
                Value::Float(148.97),
                Value::Text("https://archive.example/m82.fits".into()),
            ]],
            ..VoTable::default()
        }
    }

    #[test]
    fn columns_found_by_ucd() {
        let table = ImageTable::new(sia_table());
        assert_eq!(table.column_name(ImageColumn::AccessUrl), Some("url"));
        assert_eq!(table.column_name(ImageColumn::Dec), None);
        assert_eq!(
            table.value(0, ImageColumn::AccessUrl).and_then(Value::as_str),
            Some("https://archive.example/m82.fits")
        );
        assert_eq!(table.column(ImageColumn::Ra).unwrap()[0].as_f64(), Some(148.97));
        assert_eq!(table.len(), 1);
        assert_eq!(get_column_name(&sia_table(), ImageColumn::Title), Some("obs_title"));
    }
}
