use ndarray::{Array2, Array3, Array4, ArrayD, ArrayView2, Axis, Ix4, arr2, s};
use thiserror::Error;

/// Rejected input of [`VolumeStack::from_dyn`].
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("Expected a 3D or 4D array, got {0}D")]
    UnsupportedRank(usize),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Voxel to world (RAS mm) transform, a 4x4 homogeneous matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Affine(Array2<f64>);

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine {
    pub fn identity() -> Self {
        Self(Array2::eye(4))
    }

    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        Self(arr2(&rows))
    }

    /// Scaling of the three spatial axes
    pub fn from_zooms(zooms: [f64; 3]) -> Self {
        let mut matrix = Array2::<f64>::eye(4);
        for (axis, zoom) in zooms.into_iter().enumerate() {
            matrix[[axis, axis]] = zoom;
        }
        Self(matrix)
    }

    pub fn from_translation(offset: [f64; 3]) -> Self {
        let mut matrix = Array2::<f64>::eye(4);
        for (axis, value) in offset.into_iter().enumerate() {
            matrix[[axis, 3]] = value;
        }
        Self(matrix)
    }

    /// Embed a 3x3 linear map
    pub fn from_linear(linear: [[f64; 3]; 3]) -> Self {
        let mut matrix = Array2::<f64>::eye(4);
        matrix.slice_mut(s![..3, ..3]).assign(&arr2(&linear));
        Self(matrix)
    }

    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        self.0.view()
    }

    /// `self * other`, i.e. `other` is applied first
    pub fn compose(&self, other: &Affine) -> Affine {
        Affine(self.0.dot(&other.0))
    }

    pub fn translate(&mut self, offset: [f64; 3]) {
        for (axis, value) in offset.into_iter().enumerate() {
            self.0[[axis, 3]] += value;
        }
    }

    pub fn row(&self, index: usize) -> [f64; 4] {
        let row = self.0.row(index);
        [row[0], row[1], row[2], row[3]]
    }

    /// Length of each voxel axis in world units
    pub fn voxel_sizes(&self) -> [f64; 3] {
        let column_norm = |axis: usize| {
            self.0
                .slice(s![..3, axis])
                .iter()
                .map(|v| v * v)
                .sum::<f64>()
                .sqrt()
        };
        [column_norm(0), column_norm(1), column_norm(2)]
    }
}

/// An ordered stack of equally shaped 3D volumes sharing one affine.
///
/// Data is indexed `[x, y, z, volume]`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeStack {
    data: Array4<f32>,
    affine: Affine,
}

impl VolumeStack {
    pub fn new(data: Array4<f32>, affine: Affine) -> Self {
        Self { data, affine }
    }

    /// A single volume becomes a stack of one
    pub fn from_volume(volume: Array3<f32>, affine: Affine) -> Self {
        Self::new(volume.insert_axis(Axis(3)), affine)
    }

    /// Accept either a 3D volume or a 4D stack.
    ///
    /// Library entry point for callers that bring their own image data, e.g.
    /// read from another NIfTI file, instead of using
    /// [`VolumeLoader`](crate::volume_loader::VolumeLoader). A 3D volume
    /// becomes a stack of one and is split like any other stack.
    ///
    /// # Errors
    ///
    /// Returns error for arrays that are neither 3D nor 4D
    pub fn from_dyn(data: ArrayD<f32>, affine: Affine) -> Result<Self, VolumeError> {
        let data = match data.ndim() {
            3 => data.insert_axis(Axis(3)).into_dimensionality::<Ix4>()?,
            4 => data.into_dimensionality::<Ix4>()?,
            rank => return Err(VolumeError::UnsupportedRank(rank)),
        };
        Ok(Self::new(data, affine))
    }

    /// Get the dimensions of the stack (x, y, z, volumes)
    pub fn dim(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len_of(Axis(3))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    /// Copy out the given volumes, keeping the order of `indices`
    pub fn select(&self, indices: &[usize]) -> Array4<f32> {
        self.data.select(Axis(3), indices)
    }
}
