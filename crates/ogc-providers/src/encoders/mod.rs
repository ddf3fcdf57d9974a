//! Coverage output encoders.

pub mod covjson;
pub mod geotiff;
#[cfg(feature = "netcdf")]
pub mod netcdf;

use bytes::Bytes;
use cube_common::{CubeError, CubeResult, GridArray};
use ogc_protocol::media_types;

/// Output formats a coverage can be encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    CoverageJson,
    GeoTiff,
    NetCdf,
}

impl OutputFormat {
    /// Parse an `f` token. `None` selects CoverageJSON.
    ///
    /// Tokens are matched case-insensitively against short names and media
    /// types. NetCDF is only accepted when the `netcdf` feature is enabled.
    pub fn parse(token: Option<&str>) -> CubeResult<Self> {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(OutputFormat::CoverageJson);
        };

        let format = match token.to_ascii_lowercase().as_str() {
            "json" | "covjson" | "coveragejson" | "application/json" => OutputFormat::CoverageJson,
            t if t == media_types::COVERAGE_JSON => OutputFormat::CoverageJson,
            "geotiff" | "gtiff" | "tif" | "tiff" | "image/tiff" => OutputFormat::GeoTiff,
            t if t == media_types::GEOTIFF => OutputFormat::GeoTiff,
            "netcdf" | "nc" | "netcdf4" => OutputFormat::NetCdf,
            t if t == media_types::NETCDF => OutputFormat::NetCdf,
            _ => return Err(CubeError::UnsupportedFormat(token.to_string())),
        };

        if format == OutputFormat::NetCdf && !Self::netcdf_enabled() {
            return Err(CubeError::UnsupportedFormat(format!(
                "{} (NetCDF output is not enabled in this build)",
                token
            )));
        }
        Ok(format)
    }

    /// Formats available in this build.
    pub fn supported() -> Vec<OutputFormat> {
        let mut formats = vec![OutputFormat::CoverageJson, OutputFormat::GeoTiff];
        if Self::netcdf_enabled() {
            formats.push(OutputFormat::NetCdf);
        }
        formats
    }

    pub fn netcdf_enabled() -> bool {
        cfg!(feature = "netcdf")
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            OutputFormat::CoverageJson => media_types::COVERAGE_JSON,
            OutputFormat::GeoTiff => media_types::GEOTIFF,
            OutputFormat::NetCdf => media_types::NETCDF,
        }
    }

    /// Short token, as accepted by [`OutputFormat::parse`].
    pub fn token(&self) -> &'static str {
        match self {
            OutputFormat::CoverageJson => "json",
            OutputFormat::GeoTiff => "geotiff",
            OutputFormat::NetCdf => "netcdf",
        }
    }

    /// Binary formats have no representation for an empty grid.
    pub fn is_binary(&self) -> bool {
        !matches!(self, OutputFormat::CoverageJson)
    }

    /// Encode a loaded grid.
    ///
    /// Binary formats return an empty payload for an empty grid.
    pub fn encode(&self, array: &GridArray) -> CubeResult<Bytes> {
        match self {
            OutputFormat::CoverageJson => covjson::encode(array),
            OutputFormat::GeoTiff => geotiff::encode(array),
            #[cfg(feature = "netcdf")]
            OutputFormat::NetCdf => netcdf::encode(array),
            #[cfg(not(feature = "netcdf"))]
            OutputFormat::NetCdf => Err(CubeError::UnsupportedFormat("netcdf".to_string())),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::CoverageJson => write!(f, "CoverageJSON"),
            OutputFormat::GeoTiff => write!(f, "GeoTIFF"),
            OutputFormat::NetCdf => write!(f, "NetCDF"),
        }
    }
}

/// Value of a cell for output, `None` for NaN and nodata.
pub(crate) fn valid_value(value: f32, nodata: Option<f64>) -> Option<f32> {
    if value.is_nan() || nodata.is_some_and(|nd| f64::from(value) == nd) {
        None
    } else {
        Some(value)
    }
}
