use crate::{
    enums::{Dimension, ScalingMode},
    gradient_table::GradientTable,
    metadata::{MetadataError, MetadataTable},
    par_header::{ImageDef, ParHeader, ParHeaderError},
    volume::VolumeStack,
};

use ndarray::{Array2, Array4, s};
use rayon::prelude::*;
use std::{
    collections::BTreeSet,
    ffi::OsStr,
    fs,
    ops::Range,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No complete volume found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Unsupported pixel size of {0} bits")]
    UnsupportedBitDepth(u32),

    #[error("Image {index} has zero rescale or scale slope, cannot use floating point scaling")]
    ZeroScaleSlope { index: usize },

    #[error("Image {index} does not lie within the REC file")]
    ImageOutOfRange { index: usize },

    #[error("Image size {0}x{1} is too large")]
    ImageTooLarge(usize, usize),

    #[error("No REC file found next to {}", .0.display())]
    MissingRec(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PAR header error: {0}")]
    Header(#[from] ParHeaderError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Everything read from one PAR/REC pair.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub stack: VolumeStack,
    pub metadata: MetadataTable,
    /// Present for diffusion weighted scans of PAR version 4.1 and later
    pub gradients: Option<GradientTable>,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a PAR header and its REC image data
    ///
    /// # Arguments
    ///
    /// * `par_path` - Path to the `.PAR` file; the `.REC` file is looked up next to it
    /// * `scaling` - How stored pixel values are turned into intensities
    ///
    /// # Errors
    ///
    /// Returns error if either file cannot be read, the header is malformed or
    /// no complete volume is stored in the REC file
    pub fn load(
        par_path: impl AsRef<Path>,
        scaling: ScalingMode,
    ) -> Result<Acquisition, VolumeLoaderError> {
        let par_path = par_path.as_ref();
        let header = ParHeader::parse(&fs::read_to_string(par_path)?)?;
        let rec_path = Self::rec_path(par_path)?;
        let rec = fs::read(&rec_path)?;
        log::info!(
            "Read PAR {:?} with {} image definitions, REC of {} bytes",
            header.version,
            header.images.len(),
            rec.len()
        );
        Self::load_from_parts(&header, &rec, scaling)
    }

    /// Build an acquisition from an already parsed header and raw REC bytes
    pub fn load_from_parts(
        header: &ParHeader,
        rec: &[u8],
        scaling: ScalingMode,
    ) -> Result<Acquisition, VolumeLoaderError> {
        let (width, height, bytes_per_pixel) = Self::validate_images(&header.images)?;
        let image_bytes = width * height * bytes_per_pixel;

        let stored: Vec<&ImageDef> = header
            .images
            .iter()
            .filter(|image| {
                let fits = image_range(image.index_in_rec, image_bytes)
                    .is_some_and(|range| range.end <= rec.len());
                if !fits {
                    log::warn!(
                        "Image {} lies beyond the end of the REC file, skipping it",
                        image.index_in_rec
                    );
                }
                fits
            })
            .collect();

        let slice_count = header
            .images
            .iter()
            .map(|image| image.slice)
            .collect::<BTreeSet<_>>()
            .len();
        let volumes = Self::assemble_volumes(stored, slice_count);
        if volumes.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        let data = Self::build_volume_array(&volumes, rec, (width, height), scaling)?;
        let affine = header.affine(slice_count)?;
        let metadata = Self::build_metadata(&volumes)?;
        let gradients = Self::build_gradients(header, &volumes);

        Ok(Acquisition {
            stack: VolumeStack::new(data, affine),
            metadata,
            gradients,
        })
    }

    /// `scan.PAR` -> `scan.REC`, `scan.par` -> `scan.rec`, falling back to the other case
    fn rec_path(par_path: &Path) -> Result<PathBuf, VolumeLoaderError> {
        let lower = par_path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.chars().all(|c| c.is_ascii_lowercase()));
        let candidates = if lower { ["rec", "REC"] } else { ["REC", "rec"] };

        candidates
            .into_iter()
            .map(|ext| par_path.with_extension(ext))
            .find(|path| path.is_file())
            .ok_or_else(|| VolumeLoaderError::MissingRec(par_path.to_path_buf()))
    }

    /// Input path with its `.PAR`/`.par` extension removed
    pub fn output_base(par_path: &Path) -> PathBuf {
        let is_par = par_path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case("par"));
        if is_par {
            par_path.with_extension("")
        } else {
            par_path.to_path_buf()
        }
    }

    fn validate_images(images: &[ImageDef]) -> Result<(usize, usize, usize), VolumeLoaderError> {
        let first = images.first().ok_or(VolumeLoaderError::NoValidImages)?;
        if images
            .iter()
            .any(|image| image.recon_resolution != first.recon_resolution)
        {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        if let Some(image) = images.iter().find(|image| image.bits != first.bits) {
            return Err(VolumeLoaderError::UnsupportedBitDepth(image.bits));
        }
        let bytes_per_pixel = match first.bits {
            8 => 1,
            16 => 2,
            bits => return Err(VolumeLoaderError::UnsupportedBitDepth(bits)),
        };
        let (width, height) = first.recon_resolution;
        width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(bytes_per_pixel))
            .ok_or(VolumeLoaderError::ImageTooLarge(width, height))?;
        Ok((width, height, bytes_per_pixel))
    }

    /// Group images into volumes ordered by image type, dynamic, label,
    /// b-value, gradient orientation, phase and echo, slices ascending
    fn assemble_volumes(mut images: Vec<&ImageDef>, slice_count: usize) -> Vec<Vec<&ImageDef>> {
        images.sort_by_key(|image| (image.volume_key(), image.slice));

        let volumes = images.chunk_by(|a, b| a.volume_key() == b.volume_key());
        volumes
            .filter_map(|volume| {
                let distinct = volume.iter().map(|image| image.slice).collect::<BTreeSet<_>>();
                if volume.len() == slice_count && distinct.len() == slice_count {
                    Some(volume.to_vec())
                } else {
                    log::warn!(
                        "Dropping incomplete volume {:?} with {} of {} slices",
                        volume[0].volume_key(),
                        volume.len(),
                        slice_count
                    );
                    None
                }
            })
            .collect()
    }

    fn decode_image(
        image: &ImageDef,
        rec: &[u8],
        (width, height): (usize, usize),
        scaling: ScalingMode,
    ) -> Result<Array2<f32>, VolumeLoaderError> {
        let bytes_per_pixel = (image.bits / 8) as usize;
        let image_bytes = width * height * bytes_per_pixel;
        let raw = image_range(image.index_in_rec, image_bytes)
            .and_then(|range| rec.get(range))
            .ok_or(VolumeLoaderError::ImageOutOfRange {
                index: image.index_in_rec,
            })?;

        let slope = image.rescale_slope;
        let intercept = image.rescale_intercept;
        let scale = match scaling {
            ScalingMode::PixelValue => (1.0, 0.0),
            ScalingMode::DisplayValue => (slope, intercept),
            ScalingMode::FloatingPoint => {
                let denominator = slope * image.scale_slope;
                if denominator == 0.0 {
                    return Err(VolumeLoaderError::ZeroScaleSlope {
                        index: image.index_in_rec,
                    });
                }
                (slope / denominator, intercept / denominator)
            }
        };

        let pixels: Vec<f32> = match bytes_per_pixel {
            1 => raw.iter().map(|&pv| f64::from(pv)).collect::<Vec<_>>(),
            _ => raw
                .chunks_exact(2)
                .map(|pair| f64::from(i16::from_le_bytes([pair[0], pair[1]])))
                .collect(),
        }
        .into_iter()
        .map(|pv| (pv * scale.0 + scale.1) as f32)
        .collect();

        // REC rows run along x, so the row-major (y, x) buffer is transposed
        Ok(Array2::from_shape_vec((height, width), pixels)?.reversed_axes())
    }

    fn build_volume_array(
        volumes: &[Vec<&ImageDef>],
        rec: &[u8],
        (width, height): (usize, usize),
        scaling: ScalingMode,
    ) -> Result<Array4<f32>, VolumeLoaderError> {
        let slice_count = volumes[0].len();
        let images: Vec<_> = volumes
            .par_iter()
            .flat_map_iter(|volume| volume.iter())
            .map(|image| Self::decode_image(image, rec, (width, height), scaling))
            .collect::<Result<_, _>>()?;

        let mut data = Array4::<f32>::zeros((width, height, slice_count, volumes.len()));
        for (position, image) in images.iter().enumerate() {
            let (volume, slice) = (position / slice_count, position % slice_count);
            data.slice_mut(s![.., .., slice, volume]).assign(image);
        }

        Ok(data)
    }

    /// Columns for every dimension that varies across volumes; the two
    /// diffusion columns are kept together
    fn build_metadata(volumes: &[Vec<&ImageDef>]) -> Result<MetadataTable, VolumeLoaderError> {
        let firsts: Vec<&ImageDef> = volumes.iter().map(|volume| volume[0]).collect();
        let column = |dimension: Dimension| -> Option<Vec<i64>> {
            firsts
                .iter()
                .map(|image| match dimension {
                    Dimension::Echo => Some(image.echo),
                    Dimension::CardiacPhase => Some(image.phase),
                    Dimension::BValue => image.b_value_number,
                    Dimension::GradientOrientation => image.gradient_orientation,
                    Dimension::Label => image.label,
                    Dimension::ImageType => Some(image.image_type),
                    Dimension::Dynamic => Some(image.dynamic),
                })
                .collect()
        };

        let mut table = MetadataTable::new(volumes.len());
        for dimension in Dimension::ALL {
            if dimension.is_diffusion() {
                continue;
            }
            if let Some(values) = column(dimension).filter(|values| varies(values)) {
                table.insert(dimension, values)?;
            }
        }

        if let (Some(b_values), Some(orientations)) = (
            column(Dimension::BValue),
            column(Dimension::GradientOrientation),
        ) {
            if varies(&b_values) || varies(&orientations) {
                table.insert(Dimension::BValue, b_values)?;
                table.insert(Dimension::GradientOrientation, orientations)?;
            }
        }

        Ok(table)
    }

    fn build_gradients(header: &ParHeader, volumes: &[Vec<&ImageDef>]) -> Option<GradientTable> {
        if !header.is_diffusion() {
            return None;
        }
        volumes
            .iter()
            .map(|volume| {
                let image = volume[0];
                // (ap, fh, rl) -> (rl, ap, fh)
                image
                    .diffusion
                    .map(|[ap, fh, rl]| (image.b_factor, [rl, ap, fh]))
            })
            .collect::<Option<Vec<_>>>()
            .map(GradientTable::new)
    }
}

/// Byte range of image slot `index`, `None` on overflow
fn image_range(index: usize, image_bytes: usize) -> Option<Range<usize>> {
    let start = index.checked_mul(image_bytes)?;
    Some(start..start.checked_add(image_bytes)?)
}

fn varies(values: &[i64]) -> bool {
    values.iter().collect::<BTreeSet<_>>().len() > 1
}
