use crate::volume::Affine;

use ndarray::Array4;
use nifti::{NiftiError, NiftiHeader, writer::WriterOptions};
use std::{io, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("NIfTI error: {0}")]
    Nifti(NiftiError),
}

impl From<NiftiError> for WriteError {
    fn from(err: NiftiError) -> Self {
        match err {
            NiftiError::Io(err) => WriteError::Io(err),
            other => WriteError::Nifti(other),
        }
    }
}

impl WriteError {
    /// The failure would repeat for every remaining output
    pub fn is_systemic(&self) -> bool {
        matches!(self, WriteError::Io(err) if err.kind() == io::ErrorKind::StorageFull)
    }
}

/// Persists one sub-stack of volumes.
pub trait VolumeWriter {
    fn write(
        &mut self,
        data: &Array4<f32>,
        affine: &Affine,
        path: &Path,
    ) -> Result<(), WriteError>;
}

/// Writes NIfTI-1 files, gzip compressed when the path ends in `.gz`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NiftiWriter;

impl NiftiWriter {
    /// Header carrying the affine as a scanner-based sform
    pub fn header_for(affine: &Affine) -> NiftiHeader {
        let [x, y, z] = affine.voxel_sizes().map(|size| size as f32);
        let srow = |index: usize| affine.row(index).map(|value| value as f32);
        NiftiHeader {
            pixdim: [1.0, x, y, z, 1.0, 1.0, 1.0, 1.0],
            sform_code: 1,
            srow_x: srow(0),
            srow_y: srow(1),
            srow_z: srow(2),
            scl_slope: 1.0,
            scl_inter: 0.0,
            ..NiftiHeader::default()
        }
    }
}

impl VolumeWriter for NiftiWriter {
    fn write(
        &mut self,
        data: &Array4<f32>,
        affine: &Affine,
        path: &Path,
    ) -> Result<(), WriteError> {
        let header = Self::header_for(affine);
        WriterOptions::new(path)
            .reference_header(&header)
            .write_nifti(data)?;
        Ok(())
    }
}
