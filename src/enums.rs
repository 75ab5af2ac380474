use std::fmt;

/// The categorical acquisition dimensions a volume stack can be split on.
///
/// The declaration order is the enumeration order of output groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    Echo,
    CardiacPhase,
    BValue,
    GradientOrientation,
    Label,
    ImageType,
    Dynamic,
}

impl Dimension {
    pub const COUNT: usize = 7;

    pub const ALL: [Dimension; Dimension::COUNT] = [
        Dimension::Echo,
        Dimension::CardiacPhase,
        Dimension::BValue,
        Dimension::GradientOrientation,
        Dimension::Label,
        Dimension::ImageType,
        Dimension::Dynamic,
    ];

    /// Position of the dimension in [`Dimension::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Volume label as it appears in PAR image definitions
    pub fn key(self) -> &'static str {
        match self {
            Dimension::Echo => "echo number",
            Dimension::CardiacPhase => "cardiac phase number",
            Dimension::BValue => "diffusion b value number",
            Dimension::GradientOrientation => "gradient orientation number",
            Dimension::Label => "label type",
            Dimension::ImageType => "image_type_mr",
            Dimension::Dynamic => "dynamic scan number",
        }
    }

    /// b-value and gradient orientation are split or collapsed together
    pub fn is_diffusion(self) -> bool {
        matches!(self, Dimension::BValue | Dimension::GradientOrientation)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Reconstructed image type, stored as `image_type_mr` code in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Calculated,
    Magnitude,
    Real,
    Imaginary,
    Phase,
}

impl ImageType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(ImageType::Calculated),
            0 => Some(ImageType::Magnitude),
            1 => Some(ImageType::Real),
            2 => Some(ImageType::Imaginary),
            3 => Some(ImageType::Phase),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            ImageType::Calculated => -1,
            ImageType::Magnitude => 0,
            ImageType::Real => 1,
            ImageType::Imaginary => 2,
            ImageType::Phase => 3,
        }
    }

    /// Name used in output file names
    pub fn name(self) -> &'static str {
        match self {
            ImageType::Calculated => "calculated",
            ImageType::Magnitude => "mag",
            ImageType::Real => "real",
            ImageType::Imaginary => "imag",
            ImageType::Phase => "phase",
        }
    }
}

/// How stored REC integers are turned into intensities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalingMode {
    /// `DV / (RS * SS)`
    #[default]
    FloatingPoint,
    /// `PV * RS + RI`, the value shown on the scanner console
    DisplayValue,
    /// Raw stored value
    PixelValue,
}

impl fmt::Display for ScalingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalingMode::FloatingPoint => "floating point",
            ScalingMode::DisplayValue => "display value",
            ScalingMode::PixelValue => "pixel value",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParVersion {
    V4,
    V41,
    V42,
}

impl ParVersion {
    /// Number of numeric columns on each image definition line
    pub fn columns(self) -> usize {
        match self {
            ParVersion::V4 => 41,
            ParVersion::V41 => 48,
            ParVersion::V42 => 49,
        }
    }

    pub fn from_columns(columns: usize) -> Option<Self> {
        match columns {
            41 => Some(ParVersion::V4),
            48 => Some(ParVersion::V41),
            49 => Some(ParVersion::V42),
            _ => None,
        }
    }

    pub fn from_banner(version: &str) -> Option<Self> {
        match version {
            "4" | "4.0" => Some(ParVersion::V4),
            "4.1" => Some(ParVersion::V41),
            "4.2" => Some(ParVersion::V42),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SliceOrientation {
    #[default]
    Transverse,
    Sagittal,
    Coronal,
}

impl SliceOrientation {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(SliceOrientation::Transverse),
            2 => Some(SliceOrientation::Sagittal),
            3 => Some(SliceOrientation::Coronal),
            _ => None,
        }
    }
}
