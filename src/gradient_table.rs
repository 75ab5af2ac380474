use crate::converter::with_suffix;

use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Per-volume diffusion weighting: b-value and gradient direction (x, y, z).
#[derive(Debug, Clone, PartialEq)]
pub struct GradientTable {
    b_values: Vec<f64>,
    vectors: Vec<[f64; 3]>,
}

impl GradientTable {
    /// One `(b-value, direction)` entry per volume
    pub fn new(entries: impl IntoIterator<Item = (f64, [f64; 3])>) -> Self {
        let (b_values, vectors) = entries.into_iter().unzip();
        Self { b_values, vectors }
    }

    pub fn len(&self) -> usize {
        self.b_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.b_values.is_empty()
    }

    pub fn b_values(&self) -> &[f64] {
        &self.b_values
    }

    pub fn vectors(&self) -> &[[f64; 3]] {
        &self.vectors
    }

    /// One line of b-values, no decimals
    pub fn bval_text(&self) -> String {
        let row: Vec<_> = self.b_values.iter().map(|b| format!("{b:.0}")).collect();
        format!("{}\n", row.join(" "))
    }

    /// Three lines, one per vector component, three decimals
    pub fn bvec_text(&self) -> String {
        (0..3)
            .map(|axis| {
                let row: Vec<_> = self
                    .vectors
                    .iter()
                    .map(|vector| format!("{:.3}", vector[axis]))
                    .collect();
                format!("{}\n", row.join(" "))
            })
            .collect()
    }

    /// Write `<base>.bval` and `<base>.bvec`, returning both paths
    pub fn write(&self, base: &Path) -> io::Result<(PathBuf, PathBuf)> {
        let bval = with_suffix(base, ".bval");
        let bvec = with_suffix(base, ".bvec");
        fs::write(&bval, self.bval_text())?;
        fs::write(&bvec, self.bvec_text())?;
        Ok((bval, bvec))
    }
}
