//! Parsing of Philips PAR header files (versions 4, 4.1 and 4.2).
//!
//! A PAR file holds `#` comment lines, `.` prefixed general information
//! lines of the form `key : value`, and one whitespace separated line of
//! numbers per stored 2D image.

use crate::{
    enums::{ParVersion, SliceOrientation},
    volume::Affine,
};

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParHeaderError {
    #[error("Line {line}: cannot parse '{token}' as a number")]
    InvalidNumber { line: usize, token: String },

    #[error("Line {line}: expected {expected} columns for PAR {version:?}, found {found}")]
    ColumnCount {
        line: usize,
        version: ParVersion,
        expected: usize,
        found: usize,
    },

    #[error("Line {line}: {found} columns do not match any known PAR version")]
    UnknownLayout { line: usize, found: usize },

    #[error("Unsupported PAR version V{0}")]
    UnsupportedVersion(String),

    #[error("Line {line}: unknown slice orientation code {code}")]
    SliceOrientation { line: usize, code: i64 },

    #[error("General information field '{0}' is missing or malformed")]
    GeneralInfo(&'static str),

    #[error("PAR header contains no image definitions")]
    NoImages,
}

/// One image definition line.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDef {
    pub slice: i64,
    pub echo: i64,
    pub dynamic: i64,
    pub phase: i64,
    pub image_type: i64,
    pub index_in_rec: usize,
    pub bits: u32,
    pub recon_resolution: (usize, usize),
    pub rescale_intercept: f64,
    pub rescale_slope: f64,
    pub scale_slope: f64,
    pub thickness: f64,
    pub gap: f64,
    pub slice_orientation: SliceOrientation,
    pub pixel_spacing: (f64, f64),
    pub b_factor: f64,
    pub b_value_number: Option<i64>,
    pub gradient_orientation: Option<i64>,
    /// Gradient direction as (ap, fh, rl)
    pub diffusion: Option<[f64; 3]>,
    pub label: Option<i64>,
}

impl ImageDef {
    /// Sort key of the volume this image belongs to, most significant first
    pub fn volume_key(&self) -> [i64; 7] {
        [
            self.image_type,
            self.dynamic,
            self.label.unwrap_or(0),
            self.b_value_number.unwrap_or(0),
            self.gradient_orientation.unwrap_or(0),
            self.phase,
            self.echo,
        ]
    }

    fn from_columns(
        line: usize,
        version: ParVersion,
        values: &[f64],
    ) -> Result<Self, ParHeaderError> {
        let int = |column: usize| values[column] as i64;
        let orientation_code = int(25);
        let slice_orientation = SliceOrientation::from_code(orientation_code).ok_or(
            ParHeaderError::SliceOrientation {
                line,
                code: orientation_code,
            },
        )?;
        let extended = version >= ParVersion::V41;

        Ok(Self {
            slice: int(0),
            echo: int(1),
            dynamic: int(2),
            phase: int(3),
            image_type: int(4),
            index_in_rec: int(6).max(0) as usize,
            bits: int(7).max(0) as u32,
            recon_resolution: (int(9).max(0) as usize, int(10).max(0) as usize),
            rescale_intercept: values[11],
            rescale_slope: values[12],
            scale_slope: values[13],
            thickness: values[22],
            gap: values[23],
            slice_orientation,
            pixel_spacing: (values[28], values[29]),
            b_factor: values[33],
            b_value_number: extended.then(|| int(41)),
            gradient_orientation: extended.then(|| int(42)),
            diffusion: extended.then(|| [values[45], values[46], values[47]]),
            label: (version >= ParVersion::V42).then(|| int(48)),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParHeader {
    pub version: ParVersion,
    general: BTreeMap<String, String>,
    pub images: Vec<ImageDef>,
}

impl ParHeader {
    pub fn parse(text: &str) -> Result<Self, ParHeaderError> {
        let mut version = None;
        let mut general = BTreeMap::new();
        let mut images = Vec::new();

        for (number, raw) in text.lines().enumerate() {
            let line_number = number + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(comment) = line.strip_prefix('#') {
                if version.is_none() {
                    version = Self::banner_version(comment)?;
                }
                continue;
            }

            if let Some(info) = line.strip_prefix('.') {
                if let Some((key, value)) = info.split_once(':') {
                    general.insert(collapse_whitespace(key), value.trim().to_string());
                }
                continue;
            }

            let values = line
                .split_whitespace()
                .map(|token| {
                    token.parse::<f64>().map_err(|_| ParHeaderError::InvalidNumber {
                        line: line_number,
                        token: token.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let line_version = match version {
                Some(version) => version,
                None => {
                    let detected = ParVersion::from_columns(values.len()).ok_or(
                        ParHeaderError::UnknownLayout {
                            line: line_number,
                            found: values.len(),
                        },
                    )?;
                    version = Some(detected);
                    detected
                }
            };

            if values.len() != line_version.columns() {
                return Err(ParHeaderError::ColumnCount {
                    line: line_number,
                    version: line_version,
                    expected: line_version.columns(),
                    found: values.len(),
                });
            }

            images.push(ImageDef::from_columns(line_number, line_version, &values)?);
        }

        let version = version.ok_or(ParHeaderError::NoImages)?;
        if images.is_empty() {
            return Err(ParHeaderError::NoImages);
        }

        Ok(Self {
            version,
            general,
            images,
        })
    }

    /// Version from the export tool banner, e.g. `... Research image export tool V4.2`
    fn banner_version(comment: &str) -> Result<Option<ParVersion>, ParHeaderError> {
        if !comment.contains("image export tool") {
            return Ok(None);
        }
        let Some(token) = comment.split_whitespace().last() else {
            return Ok(None);
        };
        let Some(number) = token.strip_prefix('V') else {
            return Ok(None);
        };
        ParVersion::from_banner(number)
            .map(Some)
            .ok_or_else(|| ParHeaderError::UnsupportedVersion(number.to_string()))
    }

    /// Raw general information value; keys compare with whitespace collapsed
    pub fn general(&self, key: &str) -> Option<&str> {
        self.general.get(&collapse_whitespace(key)).map(String::as_str)
    }

    fn general_floats<const N: usize>(
        &self,
        key: &'static str,
    ) -> Result<[f64; N], ParHeaderError> {
        let values: Vec<f64> = self
            .general(key)
            .ok_or(ParHeaderError::GeneralInfo(key))?
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<_, _>>()
            .map_err(|_| ParHeaderError::GeneralInfo(key))?;
        values
            .try_into()
            .map_err(|_| ParHeaderError::GeneralInfo(key))
    }

    /// Midslice angulation in degrees as (ap, fh, rl)
    pub fn angulation(&self) -> Result<[f64; 3], ParHeaderError> {
        self.general_floats("Angulation midslice(ap,fh,rl)[degr]")
    }

    /// Midslice off-centre in mm as (ap, fh, rl)
    pub fn off_centre(&self) -> Result<[f64; 3], ParHeaderError> {
        self.general_floats("Off Centre midslice(ap,fh,rl) [mm]")
    }

    /// Whether the scan was acquired with diffusion weighting
    pub fn is_diffusion(&self) -> bool {
        self.general("Diffusion")
            .and_then(|value| value.parse::<i64>().ok())
            .is_some_and(|flag| flag != 0)
    }

    /// Voxel to scanner RAS transform for a volume of `n_slices` slices
    pub fn affine(&self, n_slices: usize) -> Result<Affine, ParHeaderError> {
        let first = self.images.first().ok_or(ParHeaderError::NoImages)?;
        let (nx, ny) = first.recon_resolution;
        let shape = [nx as f64, ny as f64, n_slices as f64];
        let zooms = [
            first.pixel_spacing.0,
            first.pixel_spacing.1,
            first.thickness + first.gap,
        ];

        let to_center = Affine::from_translation(shape.map(|n| -(n - 1.0) / 2.0));
        let zoom = Affine::from_zooms(zooms);
        let permute = Affine::from_linear(acquisition_to_psl(first.slice_orientation));
        let rotation = angulation_rotation(self.angulation()?);

        let mut psl = rotation.compose(&permute.compose(&zoom.compose(&to_center)));
        psl.translate(self.off_centre()?);
        Ok(Affine::from_linear(PSL_TO_RAS).compose(&psl))
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Posterior, superior, left (scanner ap, fh, rl) to right, anterior, superior
const PSL_TO_RAS: [[f64; 3]; 3] = [[0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

fn acquisition_to_psl(orientation: SliceOrientation) -> [[f64; 3]; 3] {
    match orientation {
        SliceOrientation::Transverse => [[0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]],
        SliceOrientation::Sagittal => [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]],
        SliceOrientation::Coronal => [[0.0, 0.0, 1.0], [0.0, -1.0, 0.0], [1.0, 0.0, 0.0]],
    }
}

/// Rotation about the ap, fh and rl axes, applied rl first
fn angulation_rotation(degrees: [f64; 3]) -> Affine {
    let [ap, fh, rl] = degrees.map(f64::to_radians);
    let about_ap = Affine::from_linear([
        [1.0, 0.0, 0.0],
        [0.0, ap.cos(), -ap.sin()],
        [0.0, ap.sin(), ap.cos()],
    ]);
    let about_fh = Affine::from_linear([
        [fh.cos(), 0.0, fh.sin()],
        [0.0, 1.0, 0.0],
        [-fh.sin(), 0.0, fh.cos()],
    ]);
    let about_rl = Affine::from_linear([
        [rl.cos(), -rl.sin(), 0.0],
        [rl.sin(), rl.cos(), 0.0],
        [0.0, 0.0, 1.0],
    ]);
    about_ap.compose(&about_fh.compose(&about_rl))
}
