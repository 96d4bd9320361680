//! Coordinate and radius input coercion.
//!
//! Queries accept one position or many, given as text, as an `(ra, dec)`
//! pair in degrees, or as an already-resolved [`SkyPosition`]. Text that is
//! not coordinate-shaped is treated as an object name and resolved remotely.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::app::ports::NameResolver;
use crate::error::{Result, VoError};

const NUMBER: &str = r"[+-]?(?:\d+(?:\.\d*)?|\.\d+)";

static DECIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^\s*({NUMBER})\s*(?:,|\s)\s*({NUMBER})\s*$")).expect("valid regex")
});

static SEXAGESIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(\d{1,2})[:\s]\s*(\d{1,2})[:\s]\s*(\d{1,2}(?:\.\d*)?)\s*,?\s*([+-]?)(\d{1,2})[:\s]\s*(\d{1,2})[:\s]\s*(\d{1,2}(?:\.\d*)?)\s*$",
    )
    .expect("valid regex")
});

static LETTERED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(\d{1,2})h\s*(\d{1,2})m\s*(\d{1,2}(?:\.\d*)?)s?\s*,?\s*([+-]?)(\d{1,2})d\s*(\d{1,2})m\s*(\d{1,2}(?:\.\d*)?)s?\s*$",
    )
    .expect("valid regex")
});

/// An ICRS position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SkyPosition {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

impl SkyPosition {
    /// Validates the declination and wraps the right ascension into [0, 360).
    pub fn new(ra_deg: f64, dec_deg: f64) -> Result<Self> {
        if !ra_deg.is_finite() || !dec_deg.is_finite() {
            return Err(VoError::invalid(format!(
                "coordinates must be finite, got ({}, {})",
                ra_deg, dec_deg
            )));
        }
        if !(-90.0..=90.0).contains(&dec_deg) {
            return Err(VoError::invalid(format!(
                "declination {} is outside [-90, 90]",
                dec_deg
            )));
        }
        Ok(Self {
            ra_deg: ra_deg.rem_euclid(360.0),
            dec_deg,
        })
    }
}

impl fmt::Display for SkyPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.ra_deg, self.dec_deg)
    }
}

fn sexagesimal_to_degrees(caps: &Captures<'_>) -> Result<SkyPosition> {
    let num = |i: usize| -> f64 { caps[i].parse::<f64>().unwrap_or(f64::NAN) };
    let (h, m, s) = (num(1), num(2), num(3));
    let (d, dm, ds) = (num(5), num(6), num(7));

    if h >= 24.0 || m >= 60.0 || s >= 60.0 || dm >= 60.0 || ds >= 60.0 {
        return Err(VoError::invalid(format!(
            "sexagesimal component out of range in '{}'",
            &caps[0]
        )));
    }
    let sign = if &caps[4] == "-" { -1.0 } else { 1.0 };
    let ra = 15.0 * (h + m / 60.0 + s / 3600.0);
    let dec = sign * (d + dm / 60.0 + ds / 3600.0);
    SkyPosition::new(ra, dec)
}

/// Parse a coordinate string.
///
/// Returns `Ok(None)` when the text does not look like coordinates at all,
/// and an error when it does but the values are out of range.
pub fn parse_position(text: &str) -> Result<Option<SkyPosition>> {
    if let Some(caps) = DECIMAL.captures(text) {
        let ra: f64 = caps[1]
            .parse()
            .map_err(|_| VoError::invalid(format!("bad right ascension in '{}'", text)))?;
        let dec: f64 = caps[2]
            .parse()
            .map_err(|_| VoError::invalid(format!("bad declination in '{}'", text)))?;
        return SkyPosition::new(ra, dec).map(Some);
    }
    if let Some(caps) = SEXAGESIMAL.captures(text).or_else(|| LETTERED.captures(text)) {
        return sexagesimal_to_degrees(&caps).map(Some);
    }
    Ok(None)
}

/// One user-supplied coordinate before resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordInput {
    Text(String),
    Pair(f64, f64),
    Position(SkyPosition),
}

impl CoordInput {
    /// Turn the input into a position, resolving object names if needed.
    pub async fn resolve(&self, resolver: Option<&dyn NameResolver>) -> Result<SkyPosition> {
        match self {
            CoordInput::Position(pos) => Ok(*pos),
            CoordInput::Pair(ra, dec) => SkyPosition::new(*ra, *dec),
            CoordInput::Text(text) => {
                if let Some(pos) = parse_position(text)? {
                    return Ok(pos);
                }
                let name = text.trim();
                match resolver {
                    Some(resolver) if !name.is_empty() => resolver.resolve(name).await,
                    _ => Err(VoError::invalid(format!(
                        "cannot parse input coordinates '{}'",
                        text
                    ))),
                }
            }
        }
    }
}

impl fmt::Display for CoordInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordInput::Text(t) => write!(f, "{}", t),
            CoordInput::Pair(ra, dec) => write!(f, "({}, {})", ra, dec),
            CoordInput::Position(p) => write!(f, "{}", p),
        }
    }
}

impl From<&str> for CoordInput {
    fn from(text: &str) -> Self {
        CoordInput::Text(text.to_string())
    }
}

impl From<String> for CoordInput {
    fn from(text: String) -> Self {
        CoordInput::Text(text)
    }
}

impl From<(f64, f64)> for CoordInput {
    fn from((ra, dec): (f64, f64)) -> Self {
        CoordInput::Pair(ra, dec)
    }
}

impl From<[f64; 2]> for CoordInput {
    fn from([ra, dec]: [f64; 2]) -> Self {
        CoordInput::Pair(ra, dec)
    }
}

impl From<SkyPosition> for CoordInput {
    fn from(pos: SkyPosition) -> Self {
        CoordInput::Position(pos)
    }
}

/// Normalized list of coordinates; a single coordinate becomes a list of one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoordList(pub Vec<CoordInput>);

impl CoordList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CoordInput> {
        self.0.iter()
    }

    /// Resolve every entry in order.
    pub async fn resolve_all(&self, resolver: Option<&dyn NameResolver>) -> Result<Vec<SkyPosition>> {
        let mut positions = Vec::with_capacity(self.0.len());
        for input in &self.0 {
            positions.push(input.resolve(resolver).await?);
        }
        Ok(positions)
    }
}

macro_rules! coord_list_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for CoordList {
                fn from(value: $ty) -> Self {
                    CoordList(vec![CoordInput::from(value)])
                }
            }

            impl From<Vec<$ty>> for CoordList {
                fn from(values: Vec<$ty>) -> Self {
                    CoordList(values.into_iter().map(CoordInput::from).collect())
                }
            }
        )*
    };
}

coord_list_from!(&str, String, (f64, f64), [f64; 2], SkyPosition);

impl From<CoordInput> for CoordList {
    fn from(input: CoordInput) -> Self {
        CoordList(vec![input])
    }
}

impl From<Vec<CoordInput>> for CoordList {
    fn from(inputs: Vec<CoordInput>) -> Self {
        CoordList(inputs)
    }
}

/// Search radius in degrees: one for all positions, or one per position.
#[derive(Debug, Clone, PartialEq)]
pub enum RadiusArg {
    Single(f64),
    PerPosition(Vec<f64>),
}

impl RadiusArg {
    /// One radius per position.
    pub fn expand(&self, n: usize) -> Result<Vec<f64>> {
        let radii = match self {
            RadiusArg::Single(r) => vec![*r; n],
            RadiusArg::PerPosition(list) => {
                if list.len() != n {
                    return Err(VoError::invalid(format!(
                        "give either a single radius or a list of radii of the same length as coords ({} radii for {} positions)",
                        list.len(),
                        n
                    )));
                }
                list.clone()
            }
        };
        if let Some(bad) = radii.iter().find(|r| !r.is_finite() || **r < 0.0) {
            return Err(VoError::invalid(format!("invalid radius {}", bad)));
        }
        Ok(radii)
    }
}

impl From<f64> for RadiusArg {
    fn from(r: f64) -> Self {
        RadiusArg::Single(r)
    }
}

impl From<Vec<f64>> for RadiusArg {
    fn from(radii: Vec<f64>) -> Self {
        RadiusArg::PerPosition(radii)
    }
}

impl From<&[f64]> for RadiusArg {
    fn from(radii: &[f64]) -> Self {
        RadiusArg::PerPosition(radii.to_vec())
    }
}

impl FromStr for RadiusArg {
    type Err = VoError;

    /// `"0.03"` or a comma-separated list `"0.1,0.2"`.
    fn from_str(s: &str) -> Result<Self> {
        let parse = |t: &str| {
            t.trim()
                .parse::<f64>()
                .map_err(|_| VoError::invalid(format!("invalid radius '{}'", t.trim())))
        };
        if s.contains(',') {
            s.split(',').map(parse).collect::<Result<Vec<_>>>().map(RadiusArg::PerPosition)
        } else {
            parse(s).map(RadiusArg::Single)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn parses_decimal_pairs() {
        let p = parse_position("148.97, 69.68").unwrap().unwrap();
        assert_eq!((p.ra_deg, p.dec_deg), (148.97, 69.68));
        let p = parse_position("19.,45.7").unwrap().unwrap();
        assert_eq!((p.ra_deg, p.dec_deg), (19.0, 45.7));
        let p = parse_position("  10.5   -30 ").unwrap().unwrap();
        assert_eq!((p.ra_deg, p.dec_deg), (10.5, -30.0));
    }

    #[test]
    fn parses_sexagesimal_forms() {
        let spaced = parse_position("09 55 52.4 +69 40 47").unwrap().unwrap();
        let colon = parse_position("09:55:52.4 +69:40:47").unwrap().unwrap();
        let lettered = parse_position("9h55m52.4s +69d40m47s").unwrap().unwrap();
        for p in [spaced, colon, lettered] {
            assert!(close(p.ra_deg, 148.968_333_3));
            assert!(close(p.dec_deg, 69.679_722_2));
        }
    }

    #[test]
    fn negative_zero_declination_keeps_sign() {
        let p = parse_position("12:00:00 -00:30:00").unwrap().unwrap();
        assert!(close(p.ra_deg, 180.0));
        assert!(close(p.dec_deg, -0.5));
    }

    #[test]
    fn object_names_are_not_coordinates() {
        assert_eq!(parse_position("m82").unwrap(), None);
        assert_eq!(parse_position("NGC 3034").unwrap(), None);
    }

    #[test]
    fn out_of_range_values_are_errors() {
        assert!(parse_position("10, 95").is_err());
        assert!(parse_position("25:00:00 +10:00:00").is_err());
        assert!(SkyPosition::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn right_ascension_wraps() {
        let p = SkyPosition::new(-10.0, 0.0).unwrap();
        assert_eq!(p.ra_deg, 350.0);
        assert_eq!(SkyPosition::new(360.0, 0.0).unwrap().ra_deg, 0.0);
    }

    #[test]
    fn single_inputs_become_lists() {
        assert_eq!(CoordList::from("m82").len(), 1);
        assert_eq!(CoordList::from((10.0, 20.0)).0, vec![CoordInput::Pair(10.0, 20.0)]);
        assert_eq!(CoordList::from(vec!["1,2", "3,4"]).len(), 2);
        let pos = SkyPosition::new(1.0, 2.0).unwrap();
        assert_eq!(CoordList::from(pos).0, vec![CoordInput::Position(pos)]);
    }

    #[test]
    fn radius_expansion() {
        assert_eq!(RadiusArg::Single(0.5).expand(3).unwrap(), vec![0.5, 0.5, 0.5]);
        assert_eq!(RadiusArg::from(vec![0.1, 0.2]).expand(2).unwrap(), vec![0.1, 0.2]);
        assert!(RadiusArg::from(vec![0.1]).expand(2).is_err());
        assert!(RadiusArg::Single(-1.0).expand(1).is_err());
    }

    #[test]
    fn radius_from_str() {
        assert_eq!("0.03".parse::<RadiusArg>().unwrap(), RadiusArg::Single(0.03));
        assert_eq!(
            "0.1, 0.2".parse::<RadiusArg>().unwrap(),
            RadiusArg::PerPosition(vec![0.1, 0.2])
        );
        assert!("wide".parse::<RadiusArg>().is_err());
    }

    struct FixedResolver;

    #[async_trait]
    impl NameResolver for FixedResolver {
        async fn resolve(&self, name: &str) -> Result<SkyPosition> {
            if name.eq_ignore_ascii_case("m82") {
                SkyPosition::new(148.9685, 69.6797)
            } else {
                Err(VoError::Resolver(format!("unknown object {}", name)))
            }
        }
    }

    #[tokio::test]
    async fn names_go_through_resolver() {
        let list = CoordList::from(vec!["m82", "10,20"]);
        let positions = list.resolve_all(Some(&FixedResolver)).await.unwrap();
        assert_eq!(positions[0].ra_deg, 148.9685);
        assert_eq!(positions[1].dec_deg, 20.0);
    }

    #[tokio::test]
    async fn names_without_resolver_fail() {
        let err = CoordInput::from("m82").resolve(None).await.unwrap_err();
        assert!(err.to_string().contains("cannot parse input coordinates"));
    }
}
