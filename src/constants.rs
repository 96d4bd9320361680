/// Endpoints and protocol constants shared across the query helpers.

// Registry (RegTAP) endpoint used for service discovery
pub const DEFAULT_REGISTRY_TAP_URL: &str = "http://vao.stsci.edu/RegTAP/TapService.aspx";

// CDS Sesame name resolver
pub const DEFAULT_SESAME_URL: &str = "https://cds.unistra.fr/cgi-bin/nph-sesame";

pub const DEFAULT_USER_AGENT: &str = concat!("navo_query/", env!("CARGO_PKG_VERSION"));

// Service type names (user-facing)
pub const CONE_SERVICE: &str = "cone";
pub const IMAGE_SERVICE: &str = "image";
pub const SPECTRA_SERVICE: &str = "spectra";
pub const TAP_SERVICE: &str = "tap";

// RegTAP capability types
pub const CAP_TYPE_CONE: &str = "conesearch";
pub const CAP_TYPE_IMAGE: &str = "simpleimageaccess";
pub const CAP_TYPE_SPECTRA: &str = "simplespectralaccess";
pub const CAP_TYPE_TABLE: &str = "tableaccess";

// TAP synchronous query parameters
pub const TAP_SYNC_SUFFIX: &str = "/sync";
pub const TAP_REQUEST: &str = "doQuery";
pub const TAP_LANG: &str = "ADQL";

/// SIA/SSA default search radius in degrees (effectively a point search)
pub const DEFAULT_POINT_RADIUS_DEG: f64 = 0.000001;

pub const DEFAULT_MAX_SERVICES: usize = 10;

// INFO names carrying service status in VOTABLE responses
pub const QUERY_STATUS_INFO: &str = "QUERY_STATUS";
pub const ERROR_INFO: &str = "Error";

/// Map a free-form service type to the RegTAP capability type.
///
/// Matching is by case-insensitive substring, so "Image", "images" and
/// "SimpleImageAccess" all select SIA. Anything unrecognised falls back to TAP.
pub fn service_type_to_cap_type(service_type: &str) -> &'static str {
    let lowered = service_type.to_lowercase();
    if lowered.contains("image") {
        CAP_TYPE_IMAGE
    } else if lowered.contains("spectr") {
        CAP_TYPE_SPECTRA
    } else if lowered.contains("cone") {
        CAP_TYPE_CONE
    } else {
        CAP_TYPE_TABLE
    }
}

/// Get all supported user-facing service types
pub fn get_supported_service_types() -> Vec<&'static str> {
    vec![CONE_SERVICE, IMAGE_SERVICE, SPECTRA_SERVICE, TAP_SERVICE]
}
