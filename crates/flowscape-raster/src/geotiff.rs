//! GeoTIFF reading and writing
//!
//! Single-band, uncompressed GeoTIFFs carrying:
//! - ModelPixelScale `[px, px, 0]`
//! - ModelTiepoint `[0, 0, 0, origin_x, origin_y, 0]` (pixel corner)
//! - GeoKeyDirectory with the EPSG code, or a citation for other references
//! - GDAL_NODATA when the layer has a nodata value
//!
//! Writes go to a sibling `.partial` file that is renamed into place, so a
//! reader never observes a half-written raster.

use crate::error::RasterError;
use crate::raster::{RasterBand, RasterLayer};
use flowscape_grid::{SpatialGrid, SpatialReference};
use ndarray::Array2;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GT_CITATION: u16 = 1026;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const RASTER_PIXEL_IS_AREA: u16 = 1;

#[inline]
fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Write a layer as GeoTIFF
///
/// # Errors
/// `RasterError::Io` on filesystem failure, `RasterError::Tiff` on encoding
/// failure
pub fn write(path: &Path, layer: &RasterLayer) -> Result<(), RasterError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| RasterError::io(parent, e))?;
    }
    let partial = partial_path(path);
    let result = write_to(&partial, layer);
    if result.is_err() {
        let _ = fs::remove_file(&partial);
        return result;
    }
    fs::rename(&partial, path).map_err(|e| RasterError::io(path, e))
}

fn write_to(path: &Path, layer: &RasterLayer) -> Result<(), RasterError> {
    let grid = layer.grid();
    let (rows, cols) = grid.shape();
    let width = u32::try_from(cols)
        .map_err(|_| RasterError::Unsupported(format!("width {cols} exceeds u32")))?;
    let height = u32::try_from(rows)
        .map_err(|_| RasterError::Unsupported(format!("height {rows} exceeds u32")))?;

    let file = File::create(path).map_err(|e| RasterError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    {
        let mut encoder = TiffEncoder::new(&mut writer)?;
        let tags = GeoTags::new(layer);

        match layer.band() {
            RasterBand::Float32(data) => {
                let mut image = encoder.new_image::<colortype::Gray32Float>(width, height)?;
                tags.write(image.encoder())?;
                image.write_data(&row_major(data))?;
            }
            RasterBand::Int8(data) => {
                let mut image = encoder.new_image::<colortype::GrayI8>(width, height)?;
                tags.write(image.encoder())?;
                image.write_data(&row_major(data))?;
            }
        }
    }
    writer.flush().map_err(|e| RasterError::io(path, e))?;
    Ok(())
}

/// Read a single-band GeoTIFF written by [`write`] (or any tool emitting the
/// same tags)
///
/// # Errors
/// - `RasterError::Io` if the file cannot be opened
/// - `RasterError::Tiff` on decoding failure
/// - `RasterError::Unsupported` for other sample types or missing georeferencing
///
/// Float64 samples are narrowed into a float32 band.
pub fn read(path: &Path) -> Result<RasterLayer, RasterError> {
    let file = File::open(path).map_err(|e| RasterError::io(path, e))?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let (width, height) = decoder.dimensions()?;
    let shape = (height as usize, width as usize);

    let scale = decoder
        .find_tag(geo_tag(MODEL_PIXEL_SCALE))?
        .map(|v| v.into_f64_vec())
        .transpose()?
        .ok_or_else(|| RasterError::Unsupported(format!("{} has no pixel scale", path.display())))?;
    let tiepoint = decoder
        .find_tag(geo_tag(MODEL_TIEPOINT))?
        .map(|v| v.into_f64_vec())
        .transpose()?
        .ok_or_else(|| RasterError::Unsupported(format!("{} has no tiepoint", path.display())))?;
    let (Some(&pixel_size), [i, j, _, x, y, ..]) = (scale.first(), tiepoint.as_slice()) else {
        return Err(RasterError::Unsupported(format!(
            "{} has malformed georeferencing",
            path.display()
        )));
    };
    // tiepoint may anchor any pixel; move it back to the corner
    let origin_x = x - i * pixel_size;
    let origin_y = y + j * pixel_size;

    let keys = decoder.find_tag_unsigned_vec::<u16>(geo_tag(GEO_KEY_DIRECTORY))?;
    let ascii = decoder
        .find_tag(geo_tag(GEO_ASCII_PARAMS))?
        .map(|v| v.into_string())
        .transpose()?;
    let spatial_reference = spatial_reference_from_keys(keys.as_deref(), ascii.as_deref());

    let nodata = decoder
        .find_tag(geo_tag(GDAL_NODATA))?
        .map(|v| v.into_string())
        .transpose()?
        .and_then(|s| parse_nodata(&s));

    let grid = SpatialGrid::new(
        origin_x,
        origin_y,
        pixel_size,
        shape.1,
        shape.0,
        spatial_reference,
    )?;

    let band = match decoder.read_image()? {
        DecodingResult::F32(data) => RasterBand::Float32(to_array(shape, data)?),
        DecodingResult::I8(data) => RasterBand::Int8(to_array(shape, data)?),
        // solver outputs; narrowed to the layer kinds this crate models
        #[allow(clippy::cast_possible_truncation)]
        DecodingResult::F64(data) => RasterBand::Float32(to_array(
            shape,
            data.into_iter().map(|v| v as f32).collect(),
        )?),
        _ => {
            return Err(RasterError::Unsupported(format!(
                "{}: only float64, float32 and int8 samples are read",
                path.display()
            )))
        }
    };
    RasterLayer::new(grid, band, nodata)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

fn row_major<T: Copy>(data: &Array2<T>) -> Vec<T> {
    data.iter().copied().collect()
}

fn to_array<T>(shape: (usize, usize), data: Vec<T>) -> Result<Array2<T>, RasterError> {
    let len = data.len();
    Array2::from_shape_vec(shape, data).map_err(|_| RasterError::ShapeMismatch {
        expected: shape,
        actual: (len / shape.1.max(1), shape.1),
    })
}

fn format_nodata(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        value.to_string()
    }
}

fn parse_nodata(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if trimmed.eq_ignore_ascii_case("nan") {
        Some(f64::NAN)
    } else {
        trimmed.parse().ok()
    }
}

fn spatial_reference_from_keys(keys: Option<&[u16]>, ascii: Option<&str>) -> SpatialReference {
    let entries = keys
        .filter(|k| k.len() >= 4)
        .map(|k| k[4..].chunks_exact(4).collect::<Vec<_>>())
        .unwrap_or_default();

    if let Some(entry) = entries
        .iter()
        .find(|e| e[0] == PROJECTED_CS_TYPE && e[1] == 0)
    {
        return SpatialReference::new(format!("EPSG:{}", entry[3]));
    }
    if let (Some(entry), Some(ascii)) = (
        entries
            .iter()
            .find(|e| e[0] == GT_CITATION && e[1] == GEO_ASCII_PARAMS),
        ascii,
    ) {
        let (count, offset) = (usize::from(entry[2]), usize::from(entry[3]));
        if let Some(text) = ascii.get(offset..offset + count) {
            return SpatialReference::new(text.trim_end_matches(['|', '\0']));
        }
    }
    SpatialReference::new("unknown")
}

/// Georeferencing tags of one layer
struct GeoTags {
    pixel_scale: [f64; 3],
    tiepoint: [f64; 6],
    keys: Vec<u16>,
    ascii: Option<String>,
    nodata: Option<String>,
}

impl GeoTags {
    fn new(layer: &RasterLayer) -> Self {
        let grid = layer.grid();
        let sr = &grid.spatial_reference;

        let mut entries: Vec<[u16; 4]> = vec![
            [GT_MODEL_TYPE, 0, 1, MODEL_TYPE_PROJECTED],
            [GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA],
        ];
        let ascii = match sr.epsg_code() {
            Some(code) => {
                entries.push([PROJECTED_CS_TYPE, 0, 1, code]);
                None
            }
            None => {
                let text = format!("{}|", sr.as_str());
                let count = u16::try_from(text.len()).unwrap_or(u16::MAX);
                entries.push([GT_CITATION, GEO_ASCII_PARAMS, count, 0]);
                Some(text)
            }
        };
        entries.sort_by_key(|e| e[0]);

        let count = u16::try_from(entries.len()).unwrap_or(u16::MAX);
        let mut keys = vec![1, 1, 0, count];
        keys.extend(entries.iter().flatten());

        Self {
            pixel_scale: [grid.pixel_size, grid.pixel_size, 0.0],
            tiepoint: [0.0, 0.0, 0.0, grid.origin_x, grid.origin_y, 0.0],
            keys,
            ascii,
            nodata: layer.nodata().map(format_nodata),
        }
    }

    fn write<W, K>(
        &self,
        dir: &mut tiff::encoder::DirectoryEncoder<'_, W, K>,
    ) -> Result<(), RasterError>
    where
        W: std::io::Write + std::io::Seek,
        K: tiff::encoder::TiffKind,
    {
        dir.write_tag(geo_tag(MODEL_PIXEL_SCALE), &self.pixel_scale[..])?;
        dir.write_tag(geo_tag(MODEL_TIEPOINT), &self.tiepoint[..])?;
        dir.write_tag(geo_tag(GEO_KEY_DIRECTORY), &self.keys[..])?;
        if let Some(ascii) = &self.ascii {
            dir.write_tag(geo_tag(GEO_ASCII_PARAMS), ascii.as_str())?;
        }
        if let Some(nodata) = &self.nodata {
            dir.write_tag(geo_tag(GDAL_NODATA), nodata.as_str())?;
        }
        Ok(())
    }
}
