//! # PARREC-volume library
//!
//! This crate converts a single multi-dimensional Philips PAR/REC
//! acquisition into one or more NIfTI volumes.
//!
//! Every volume of an acquisition is tagged with the value it takes along
//! seven categorical dimensions:
//!  - Echo number
//!  - Cardiac phase number
//!  - Diffusion b-value number and gradient orientation number
//!  - Label type
//!  - Image type (calculated, magnitude, real, imaginary, phase)
//!  - Dynamic scan number
//!
//!  Library consumers choose which of these dimensions are split into
//!  separate output files. All other dimensions are merged into the same
//!  file. Every combination of split values that actually occurs in the
//!  acquisition becomes one output, named after the values it holds, e.g.
//!  `scan_echo_2_mag.nii.gz`. Combinations no volume matches are skipped.
//!
//!  REC images are decoded in parallel using rayon. Output groups are
//!  written one after another; a failed write is reported and the
//!  remaining groups are still written.
//!
//! # Examples
//!
//! ## Splitting a multi-echo scan
//!
//! Load `scan.PAR`/`scan.REC` with floating point scaling and write one
//! gzipped NIfTI file per echo next to the input.
//!
//! ```no_run
//! # use parrec_volume::{Converter, NiftiWriter, ScalingMode, SplitConfig, VolumeLoader};
//! # use std::path::Path;
//! let input = Path::new("scan.PAR");
//! let acquisition = VolumeLoader::load(input, ScalingMode::FloatingPoint)
//!     .expect("should have loaded PAR/REC pair");
//! let config = SplitConfig {
//!     echo: true,
//!     ..SplitConfig::none()
//! };
//! let report = Converter::new(NiftiWriter, config)
//!     .convert(
//!         &acquisition.stack,
//!         &acquisition.metadata,
//!         &VolumeLoader::output_base(input),
//!     )
//!     .expect("should have written every echo");
//! for output in &report.outputs {
//!     println!("{}", output.path.display());
//! }
//! ```

pub mod converter;
pub mod dimension;
pub mod enums;
pub mod gradient_table;
pub mod metadata;
pub mod par_header;
pub mod partition;
pub mod volume;
pub mod volume_loader;
pub mod volume_writer;

pub use converter::{ConversionReport, ConvertError, Converter};
pub use dimension::{DimensionCatalog, Level, SplitConfig};
pub use enums::{Dimension, ImageType, ScalingMode};
pub use gradient_table::GradientTable;
pub use metadata::MetadataTable;
pub use partition::{Group, GroupKey, Partition};
pub use volume::{Affine, VolumeStack};
pub use volume_loader::{Acquisition, VolumeLoader, VolumeLoaderError};
pub use volume_writer::{NiftiWriter, VolumeWriter, WriteError};
