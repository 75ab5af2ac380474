use crate::{enums::Dimension, metadata::MetadataTable};

use std::{collections::BTreeSet, fmt};

/// Value of one dimension for one volume after normalization.
///
/// `Collapsed` never compares equal to a real metadata value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Collapsed,
    Value(i64),
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Collapsed => f.write_str("all"),
            Level::Value(value) => write!(f, "{value}"),
        }
    }
}

/// Which dimensions the caller wants written to separate files.
///
/// `diffusion` covers both b-value and gradient orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SplitConfig {
    pub echo: bool,
    pub phase: bool,
    pub diffusion: bool,
    pub label: bool,
    pub image_type: bool,
    pub dynamic: bool,
}

impl SplitConfig {
    /// Collapse every dimension into a single output
    pub fn none() -> Self {
        Self::default()
    }

    pub fn requests(&self, dimension: Dimension) -> bool {
        match dimension {
            Dimension::Echo => self.echo,
            Dimension::CardiacPhase => self.phase,
            Dimension::BValue | Dimension::GradientOrientation => self.diffusion,
            Dimension::Label => self.label,
            Dimension::ImageType => self.image_type,
            Dimension::Dynamic => self.dynamic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionSpec {
    pub dimension: Dimension,
    /// The acquisition varies along this dimension
    pub present: bool,
    /// The caller asked for this dimension to be split
    pub requested: bool,
    /// Volumes are separated by this dimension's values; implies `present`
    pub split: bool,
    /// Level every volume takes when the dimension is not split
    pub sentinel: Level,
}

/// One [`DimensionSpec`] per dimension, in [`Dimension::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionCatalog {
    specs: [DimensionSpec; Dimension::COUNT],
}

impl DimensionCatalog {
    pub fn new(table: &MetadataTable, config: &SplitConfig) -> Self {
        let diffusion_present =
            table.contains(Dimension::BValue) || table.contains(Dimension::GradientOrientation);

        let specs = Dimension::ALL.map(|dimension| {
            let present = if dimension.is_diffusion() {
                diffusion_present
            } else {
                table.contains(dimension)
            };
            let requested = config.requests(dimension);
            DimensionSpec {
                dimension,
                present,
                requested,
                split: requested && present,
                sentinel: Level::Collapsed,
            }
        });

        Self { specs }
    }

    pub fn spec(&self, dimension: Dimension) -> &DimensionSpec {
        &self.specs[dimension.index()]
    }

    pub fn is_split(&self, dimension: Dimension) -> bool {
        self.spec(dimension).split
    }

    pub fn iter(&self) -> impl Iterator<Item = &DimensionSpec> {
        self.specs.iter()
    }

    /// Dimensions the caller asked to split that the acquisition does not vary along
    pub fn ignored_requests(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.specs
            .iter()
            .filter(|spec| spec.requested && !spec.present)
            .map(|spec| spec.dimension)
    }

    /// Rewrite every non-split dimension to its sentinel, leaving `table` untouched
    pub fn normalize(&self, table: &MetadataTable) -> NormalizedTable {
        let rows = (0..table.len())
            .map(|volume| {
                self.specs.map(|spec| {
                    if spec.split {
                        Level::Value(table.value(spec.dimension, volume))
                    } else {
                        spec.sentinel
                    }
                })
            })
            .collect();
        NormalizedTable { rows }
    }

    /// Distinct levels each dimension contributes to enumeration.
    ///
    /// Sorted values for split dimensions, the sentinel alone otherwise.
    pub fn retained_levels(
        &self,
        normalized: &NormalizedTable,
    ) -> [Vec<Level>; Dimension::COUNT] {
        self.specs.map(|spec| {
            if spec.split {
                normalized
                    .column(spec.dimension)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            } else {
                vec![spec.sentinel]
            }
        })
    }
}

/// Working copy of the metadata where collapsed dimensions hold their sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTable {
    rows: Vec<[Level; Dimension::COUNT]>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, volume: usize) -> &[Level; Dimension::COUNT] {
        &self.rows[volume]
    }

    pub fn rows(&self) -> &[[Level; Dimension::COUNT]] {
        &self.rows
    }

    pub fn column(&self, dimension: Dimension) -> impl Iterator<Item = Level> + '_ {
        self.rows.iter().map(move |row| row[dimension.index()])
    }
}
