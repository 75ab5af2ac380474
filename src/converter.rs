use crate::{
    dimension::SplitConfig,
    enums::Dimension,
    metadata::MetadataTable,
    partition::{GroupKey, Partition},
    volume::VolumeStack,
    volume_writer::{VolumeWriter, WriteError},
};

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const OUTPUT_EXTENSION: &str = ".nii.gz";

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Stack holds {volumes} volumes but the metadata describes {rows}")]
    VolumeCountMismatch { volumes: usize, rows: usize },

    #[error("Writing {} failed, aborting: {source}", .path.display())]
    Systemic {
        path: PathBuf,
        #[source]
        source: WriteError,
        /// Outputs completed before the abort
        written: Vec<OutputRecord>,
    },
}

impl ConvertError {
    /// Outputs that were written before the error, if any
    pub fn written(&self) -> &[OutputRecord] {
        match self {
            ConvertError::Systemic { written, .. } => written,
            ConvertError::VolumeCountMismatch { .. } => &[],
        }
    }
}

#[derive(Debug)]
pub struct OutputRecord {
    pub path: PathBuf,
    pub key: GroupKey,
    pub volumes: usize,
}

#[derive(Debug)]
pub struct GroupFailure {
    pub path: PathBuf,
    pub key: GroupKey,
    pub error: WriteError,
}

#[derive(Debug, Default)]
pub struct ConversionReport {
    pub outputs: Vec<OutputRecord>,
    pub failures: Vec<GroupFailure>,
}

impl ConversionReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Splits a volume stack into groups and hands each one to a [`VolumeWriter`].
pub struct Converter<W> {
    writer: W,
    config: SplitConfig,
}

impl<W: VolumeWriter> Converter<W> {
    pub fn new(writer: W, config: SplitConfig) -> Self {
        Self { writer, config }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Write every non-empty group of `stack` to `<base><suffix>.nii.gz`
    ///
    /// # Errors
    ///
    /// Returns error if the stack and metadata disagree on the volume count or
    /// a write fails in a way that would repeat for every remaining group.
    /// Other write failures are collected in the report.
    pub fn convert(
        &mut self,
        stack: &VolumeStack,
        metadata: &MetadataTable,
        base: &Path,
    ) -> Result<ConversionReport, ConvertError> {
        if stack.len() != metadata.len() {
            return Err(ConvertError::VolumeCountMismatch {
                volumes: stack.len(),
                rows: metadata.len(),
            });
        }

        let partition = Partition::new(metadata, &self.config);
        for dimension in partition.catalog().ignored_requests() {
            log::warn!("Cannot split on {dimension}: the acquisition does not vary along it");
        }

        let mut report = ConversionReport::default();
        for group in partition.groups() {
            let path = with_suffix(base, &format!("{}{OUTPUT_EXTENSION}", group.suffix));
            let data = stack.select(&group.volumes);

            let (x, y, z, n) = data.dim();
            log::info!("Volume shape = {x}x{y}x{z}x{n}");
            log::info!("{}", describe(&group.key));

            match self.writer.write(&data, stack.affine(), &path) {
                Ok(()) => report.outputs.push(OutputRecord {
                    path,
                    key: group.key,
                    volumes: group.volumes.len(),
                }),
                Err(error) if error.is_systemic() => {
                    return Err(ConvertError::Systemic {
                        path,
                        source: error,
                        written: report.outputs,
                    });
                }
                Err(error) => {
                    log::error!(
                        "Failed to write {} ({}): {error}",
                        path.display(),
                        describe(&group.key)
                    );
                    report.failures.push(GroupFailure {
                        path,
                        key: group.key,
                        error,
                    });
                }
            }
        }

        Ok(report)
    }
}

fn describe(key: &GroupKey) -> String {
    Dimension::ALL
        .iter()
        .map(|&dimension| format!("{dimension} = {}", key.level(dimension)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Append to the final path component without touching existing dots
pub fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}
