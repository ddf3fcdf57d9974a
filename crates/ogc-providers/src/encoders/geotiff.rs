//! GeoTIFF encoding of a loaded grid.
//!
//! Every variable and time slice becomes one 32-bit float page, variables
//! outermost. Pages carry the model pixel scale, tiepoint and GeoKey
//! directory tags, plus `GDAL_NODATA` when the variable declares a nodata
//! value. Rows are written north-up whatever the grid orientation.

use std::io::Cursor;

use bytes::Bytes;
use cube_common::{format_datetime, CrsCode, CubeError, CubeResult, GridArray};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tracing::debug;

// GeoKey ids and values from the GeoTIFF 1.0 key registry.
const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;

pub fn encode(array: &GridArray) -> CubeResult<Bytes> {
    if array.is_empty() {
        return Ok(Bytes::new());
    }

    let width = array.width();
    let height = array.height();
    let transform = array.grid.transform;
    let bounds = array.grid.bounds();

    let scale = [transform.res_x.abs(), transform.res_y.abs(), 0.0];
    let tiepoint = [0.0, 0.0, 0.0, bounds.min_x, bounds.max_y, 0.0];
    let geokeys = geokey_directory(&array.crs());
    let flip_rows = transform.res_y > 0.0;
    let flip_cols = transform.res_x < 0.0;

    let mut buf = Cursor::new(Vec::new());
    let mut encoder = TiffEncoder::new(&mut buf).map_err(tiff_error)?;

    for variable in &array.variables {
        let nodata = variable.nodata.map(|nd| nd.to_string());
        for (t, time) in array.times.iter().enumerate() {
            let offset = t * array.slice_len();
            let slice = variable
                .values
                .get(offset..offset + array.slice_len())
                .ok_or_else(|| {
                    CubeError::EncodingError(format!(
                        "Variable '{}' holds {} values, expected {} time slices of {}x{}",
                        variable.name,
                        variable.values.len(),
                        array.times.len(),
                        width,
                        height
                    ))
                })?;

            let mut page = Vec::with_capacity(slice.len());
            for row in 0..height {
                let src_row = if flip_rows { height - 1 - row } else { row };
                let line = &slice[src_row * width..(src_row + 1) * width];
                if flip_cols {
                    page.extend(line.iter().rev());
                } else {
                    page.extend_from_slice(line);
                }
            }

            let mut image = encoder
                .new_image::<colortype::Gray32Float>(width as u32, height as u32)
                .map_err(tiff_error)?;
            let dir = image.encoder();
            dir.write_tag(Tag::ModelPixelScaleTag, &scale[..])
                .map_err(tiff_error)?;
            dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..])
                .map_err(tiff_error)?;
            dir.write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])
                .map_err(tiff_error)?;
            dir.write_tag(
                Tag::ImageDescription,
                format!("{} {}", variable.name, format_datetime(time)).as_str(),
            )
            .map_err(tiff_error)?;
            if let Some(nodata) = &nodata {
                dir.write_tag(Tag::GdalNodata, nodata.as_str())
                    .map_err(tiff_error)?;
            }
            image.write_data(&page).map_err(tiff_error)?;
        }
    }

    let bytes = buf.into_inner();
    debug!(
        width = width,
        height = height,
        pages = array.variables.len() * array.times.len(),
        size = bytes.len(),
        "Encoded GeoTIFF"
    );
    Ok(Bytes::from(bytes))
}

fn geokey_directory(crs: &CrsCode) -> Vec<u16> {
    let code = u16::try_from(crs.epsg()).unwrap_or(USER_DEFINED);
    let (model, crs_key) = if crs.is_geographic() {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE)
    };

    // Header: version, revision, minor revision, key count
    vec![
        1, 1, 0, 3,
        GT_MODEL_TYPE, 0, 1, model,
        GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA,
        crs_key, 0, 1, code,
    ]
}

fn tiff_error(e: tiff::TiffError) -> CubeError {
    CubeError::EncodingError(format!("GeoTIFF encoding failed: {}", e))
}
