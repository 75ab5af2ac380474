//! Partitioning of a volume stack into output groups.
//!
//! A [`Partition`] enumerates the Cartesian product of every dimension's
//! retained levels, masks the volumes matching each combination and yields
//! the non-empty ones as [`Group`]s together with their output identifier.

use crate::{
    dimension::{DimensionCatalog, Level, NormalizedTable, SplitConfig},
    enums::{Dimension, ImageType},
    metadata::{ABSENT_VALUE, MetadataTable},
};

/// One level per dimension, in [`Dimension::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(pub [Level; Dimension::COUNT]);

impl GroupKey {
    pub fn level(&self, dimension: Dimension) -> Level {
        self.0[dimension.index()]
    }
}

/// Lazy Cartesian product over the retained levels of all dimensions.
///
/// The last dimension varies fastest, so keys come out in the same order
/// as seven nested loops over echo, phase, b-value, gradient orientation,
/// label, image type and dynamic.
#[derive(Debug)]
pub struct Groups {
    levels: [Vec<Level>; Dimension::COUNT],
    cursor: [usize; Dimension::COUNT],
    exhausted: bool,
}

impl Groups {
    pub fn new(levels: [Vec<Level>; Dimension::COUNT]) -> Self {
        let exhausted = levels.iter().any(Vec::is_empty);
        Self {
            levels,
            cursor: [0; Dimension::COUNT],
            exhausted,
        }
    }

    fn remaining(&self) -> usize {
        if self.exhausted {
            return 0;
        }
        // mixed-radix position of the cursor counted from the end
        let mut remaining = 0;
        let mut weight = 1;
        for (set, &position) in self.levels.iter().zip(&self.cursor).rev() {
            remaining += (set.len() - 1 - position) * weight;
            weight *= set.len();
        }
        remaining + 1
    }
}

impl Iterator for Groups {
    type Item = GroupKey;

    fn next(&mut self) -> Option<GroupKey> {
        if self.exhausted {
            return None;
        }

        let key = std::array::from_fn(|axis| self.levels[axis][self.cursor[axis]]);

        self.exhausted = true;
        for axis in (0..Dimension::COUNT).rev() {
            self.cursor[axis] += 1;
            if self.cursor[axis] < self.levels[axis].len() {
                self.exhausted = false;
                break;
            }
            self.cursor[axis] = 0;
        }

        Some(GroupKey(key))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Groups {}

/// Volumes whose normalized metadata equals a group key on every dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMask {
    bits: Vec<bool>,
}

impl VolumeMask {
    pub fn build(normalized: &NormalizedTable, key: &GroupKey) -> Self {
        let bits = normalized.rows().iter().map(|row| *row == key.0).collect();
        Self { bits }
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&bit| bit).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.contains(&true)
    }

    /// Matching volume indices in ascending order
    pub fn indices(&self) -> Vec<usize> {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(index, &bit)| bit.then_some(index))
            .collect()
    }
}

fn split_value(key: &GroupKey, dimension: Dimension) -> i64 {
    match key.level(dimension) {
        Level::Value(value) => value,
        Level::Collapsed => ABSENT_VALUE,
    }
}

/// File name fragment encoding the value of every split dimension.
///
/// Fragments are appended in a fixed order: echo, phase, diffusion, label,
/// image type, dynamic.
pub fn output_suffix(catalog: &DimensionCatalog, key: &GroupKey) -> String {
    let mut suffix = String::new();

    if catalog.is_split(Dimension::Echo) {
        suffix.push_str(&format!("_echo_{}", split_value(key, Dimension::Echo)));
    }
    if catalog.is_split(Dimension::CardiacPhase) {
        let phase = split_value(key, Dimension::CardiacPhase);
        suffix.push_str(&format!("_phase_{phase}"));
    }
    if catalog.is_split(Dimension::BValue) || catalog.is_split(Dimension::GradientOrientation) {
        suffix.push_str(&format!(
            "_bval_{}_bvec_{}",
            split_value(key, Dimension::BValue),
            split_value(key, Dimension::GradientOrientation)
        ));
    }
    if catalog.is_split(Dimension::Label) {
        suffix.push_str(&format!("_label_{}", split_value(key, Dimension::Label)));
    }
    if catalog.is_split(Dimension::ImageType) {
        let code = split_value(key, Dimension::ImageType);
        match ImageType::from_code(code) {
            Some(image_type) => suffix.push_str(&format!("_{}", image_type.name())),
            None => suffix.push_str(&format!("_type_{code}")),
        }
    }
    if catalog.is_split(Dimension::Dynamic) {
        suffix.push_str(&format!("_dynamic_{}", split_value(key, Dimension::Dynamic)));
    }

    suffix
}

/// `base` followed by the [`output_suffix`] of `key`
pub fn output_identifier(base: &str, catalog: &DimensionCatalog, key: &GroupKey) -> String {
    format!("{base}{}", output_suffix(catalog, key))
}

/// A non-empty combination of dimension levels and the volumes it selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub key: GroupKey,
    /// Name fragment appended to the output base name
    pub suffix: String,
    /// Matching volume indices in stack order
    pub volumes: Vec<usize>,
}

/// Split configuration resolved against one acquisition's metadata.
#[derive(Debug, Clone)]
pub struct Partition {
    catalog: DimensionCatalog,
    normalized: NormalizedTable,
}

impl Partition {
    pub fn new(table: &MetadataTable, config: &SplitConfig) -> Self {
        let catalog = DimensionCatalog::new(table, config);
        let normalized = catalog.normalize(table);
        Self {
            catalog,
            normalized,
        }
    }

    pub fn catalog(&self) -> &DimensionCatalog {
        &self.catalog
    }

    pub fn volume_count(&self) -> usize {
        self.normalized.len()
    }

    /// Every candidate key, including those no volume matches
    pub fn keys(&self) -> Groups {
        Groups::new(self.catalog.retained_levels(&self.normalized))
    }

    pub fn mask(&self, key: &GroupKey) -> VolumeMask {
        VolumeMask::build(&self.normalized, key)
    }

    /// Non-empty groups in enumeration order
    pub fn groups(&self) -> impl Iterator<Item = Group> + '_ {
        self.keys().filter_map(move |key| {
            let mask = self.mask(&key);
            if mask.is_empty() {
                log::debug!("Skipping empty group {key:?}");
                return None;
            }
            Some(Group {
                key,
                suffix: output_suffix(&self.catalog, &key),
                volumes: mask.indices(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn split(config: SplitConfig, table: &MetadataTable) -> Vec<Group> {
        Partition::new(table, &config).groups().collect()
    }

    fn echo_phase_table() -> MetadataTable {
        // 4 echoes x 2 phases, phase-major
        let echo = (0..8).map(|i| i % 4 + 1).collect();
        let phase = (0..8).map(|i| i / 4 + 1).collect();
        MetadataTable::new(8)
            .with_column(Dimension::Echo, echo)
            .unwrap()
            .with_column(Dimension::CardiacPhase, phase)
            .unwrap()
    }

    fn sparse_diffusion_table() -> MetadataTable {
        // (bval, bvec) pairs that actually co-occur
        let pairs = [(1, 7), (2, 1), (2, 4), (2, 7), (2, 1)];
        MetadataTable::new(pairs.len())
            .with_column(Dimension::BValue, pairs.iter().map(|p| p.0).collect())
            .unwrap()
            .with_column(
                Dimension::GradientOrientation,
                pairs.iter().map(|p| p.1).collect(),
            )
            .unwrap()
    }

    fn assert_partition(groups: &[Group], volumes: usize) {
        let mut seen = vec![false; volumes];
        for group in groups {
            assert!(!group.volumes.is_empty());
            for &index in &group.volumes {
                assert!(!seen[index], "volume {index} in more than one group");
                seen[index] = true;
            }
        }
        assert!(seen.iter().all(|&s| s), "some volume is in no group");
    }

    fn all_configs() -> Vec<SplitConfig> {
        (0..64u8)
            .map(|bits| SplitConfig {
                echo: bits & 1 != 0,
                phase: bits & 2 != 0,
                diffusion: bits & 4 != 0,
                label: bits & 8 != 0,
                image_type: bits & 16 != 0,
                dynamic: bits & 32 != 0,
            })
            .collect()
    }

    fn mixed_table() -> MetadataTable {
        let n = 24;
        MetadataTable::new(n)
            .with_column(Dimension::Echo, (0..n as i64).map(|i| i % 2 + 1).collect())
            .unwrap()
            .with_column(Dimension::CardiacPhase, (0..n as i64).map(|i| i % 3).collect())
            .unwrap()
            .with_column(Dimension::BValue, (0..n as i64).map(|i| (i / 6) % 2).collect())
            .unwrap()
            .with_column(Dimension::ImageType, (0..n as i64).map(|i| i % 4 - 1).collect())
            .unwrap()
            .with_column(Dimension::Dynamic, (0..n as i64).map(|i| i / 12 + 1).collect())
            .unwrap()
    }

    #[test]
    fn enumerates_cartesian_product_last_dimension_fastest() {
        let mut levels: [Vec<Level>; Dimension::COUNT] = Default::default();
        for set in levels.iter_mut() {
            set.push(Level::Collapsed);
        }
        levels[Dimension::Echo.index()] = vec![Level::Value(1), Level::Value(2)];
        levels[Dimension::Dynamic.index()] =
            vec![Level::Value(5), Level::Value(6), Level::Value(7)];

        let groups = Groups::new(levels);
        assert_eq!(groups.len(), 6);
        let keys: Vec<_> = groups
            .map(|key| (key.level(Dimension::Echo), key.level(Dimension::Dynamic)))
            .collect();
        assert_eq!(
            keys,
            vec![
                (Level::Value(1), Level::Value(5)),
                (Level::Value(1), Level::Value(6)),
                (Level::Value(1), Level::Value(7)),
                (Level::Value(2), Level::Value(5)),
                (Level::Value(2), Level::Value(6)),
                (Level::Value(2), Level::Value(7)),
            ]
        );
    }

    #[test]
    fn empty_level_set_yields_no_keys() {
        let levels: [Vec<Level>; Dimension::COUNT] = Default::default();
        let mut groups = Groups::new(levels);
        assert_eq!(groups.len(), 0);
        assert_eq!(groups.next(), None);
    }

    #[test]
    fn size_hint_tracks_consumption() {
        let table = echo_phase_table();
        let config = SplitConfig {
            echo: true,
            phase: true,
            ..SplitConfig::none()
        };
        let mut keys = Partition::new(&table, &config).keys();
        assert_eq!(keys.len(), 8);
        keys.next();
        keys.next();
        assert_eq!(keys.len(), 6);
        assert_eq!(keys.count(), 6);
    }

    #[test]
    fn echo_split_merges_phases() {
        let table = echo_phase_table();
        let config = SplitConfig {
            echo: true,
            ..SplitConfig::none()
        };
        let groups = split(config, &table);

        let suffixes: Vec<_> = groups.iter().map(|g| g.suffix.as_str()).collect();
        assert_eq!(suffixes, vec!["_echo_1", "_echo_2", "_echo_3", "_echo_4"]);
        for (echo, group) in (1..=4).zip(&groups) {
            assert_eq!(group.volumes.len(), 2);
            for &index in &group.volumes {
                assert_eq!(table.value(Dimension::Echo, index), echo);
            }
        }
        assert_eq!(groups[0].volumes, vec![0, 4]);
    }

    #[test]
    fn no_split_yields_single_group_with_every_volume() {
        let table = echo_phase_table();
        let groups = split(SplitConfig::none(), &table);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].suffix, "");
        assert_eq!(groups[0].volumes, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn sparse_diffusion_combinations_are_elided() {
        let table = sparse_diffusion_table();
        let config = SplitConfig {
            diffusion: true,
            ..SplitConfig::none()
        };
        let partition = Partition::new(&table, &config);
        assert_eq!(partition.keys().len(), 6);

        let groups: Vec<_> = partition.groups().collect();
        let suffixes: Vec<_> = groups.iter().map(|g| g.suffix.as_str()).collect();
        assert_eq!(
            suffixes,
            vec![
                "_bval_1_bvec_7",
                "_bval_2_bvec_1",
                "_bval_2_bvec_4",
                "_bval_2_bvec_7"
            ]
        );
        assert_eq!(groups[1].volumes, vec![1, 4]);
    }

    #[test]
    fn diffusion_fragment_emitted_when_only_one_half_varies() {
        let table = MetadataTable::new(2)
            .with_column(Dimension::BValue, vec![1, 1])
            .unwrap()
            .with_column(Dimension::GradientOrientation, vec![3, 4])
            .unwrap();
        let config = SplitConfig {
            diffusion: true,
            ..SplitConfig::none()
        };
        let suffixes: Vec<_> = split(config, &table).into_iter().map(|g| g.suffix).collect();
        assert_eq!(suffixes, vec!["_bval_1_bvec_3", "_bval_1_bvec_4"]);
    }

    #[test]
    fn fragments_follow_fixed_dimension_order() {
        let table = MetadataTable::new(1)
            .with_column(Dimension::Echo, vec![2])
            .unwrap()
            .with_column(Dimension::CardiacPhase, vec![5])
            .unwrap()
            .with_column(Dimension::BValue, vec![1])
            .unwrap()
            .with_column(Dimension::GradientOrientation, vec![9])
            .unwrap()
            .with_column(Dimension::Label, vec![1])
            .unwrap()
            .with_column(Dimension::ImageType, vec![3])
            .unwrap()
            .with_column(Dimension::Dynamic, vec![4])
            .unwrap();
        let config = SplitConfig {
            echo: true,
            phase: true,
            diffusion: true,
            label: true,
            image_type: true,
            dynamic: true,
        };
        let partition = Partition::new(&table, &config);
        let key = partition.keys().next().unwrap();
        assert_eq!(
            output_identifier("scan", partition.catalog(), &key),
            "scan_echo_2_phase_5_bval_1_bvec_9_label_1_phase_dynamic_4"
        );
    }

    #[test]
    fn image_type_fragments_use_symbolic_names() {
        let table = MetadataTable::new(6)
            .with_column(Dimension::ImageType, vec![-1, 0, 1, 2, 3, 7])
            .unwrap();
        let config = SplitConfig {
            image_type: true,
            ..SplitConfig::none()
        };
        let suffixes: Vec<_> = split(config, &table).into_iter().map(|g| g.suffix).collect();
        assert_eq!(
            suffixes,
            vec!["_calculated", "_mag", "_real", "_imag", "_phase", "_type_7"]
        );
    }

    #[test]
    fn absent_dimension_request_degrades_to_collapsed() {
        let table = echo_phase_table();
        let config = SplitConfig {
            label: true,
            ..SplitConfig::none()
        };
        let groups = split(config, &table);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].suffix, "");
    }

    #[test]
    fn masks_partition_volumes_for_every_configuration() {
        let table = mixed_table();
        for config in all_configs() {
            let groups = split(config, &table);
            assert_partition(&groups, table.len());
        }
    }

    #[test]
    fn identifiers_are_unique_for_every_configuration() {
        let table = mixed_table();
        for config in all_configs() {
            let groups = split(config, &table);
            let suffixes: BTreeSet<_> = groups.iter().map(|g| g.suffix.clone()).collect();
            assert_eq!(suffixes.len(), groups.len(), "collision under {config:?}");
        }
    }

    #[test]
    fn collapsed_group_equals_union_of_split_groups() {
        let table = mixed_table();
        let merged = split(SplitConfig::none(), &table);
        let by_echo = split(
            SplitConfig {
                echo: true,
                ..SplitConfig::none()
            },
            &table,
        );

        let mut union: Vec<_> = by_echo.iter().flat_map(|g| g.volumes.clone()).collect();
        union.sort_unstable();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].volumes, union);
    }

    #[test]
    fn partition_is_deterministic() {
        let table = mixed_table();
        let config = SplitConfig {
            phase: true,
            image_type: true,
            ..SplitConfig::none()
        };
        assert_eq!(split(config, &table), split(config, &table));
    }

    #[test]
    fn mask_matches_exactly() {
        let table = sparse_diffusion_table();
        let config = SplitConfig {
            diffusion: true,
            ..SplitConfig::none()
        };
        let partition = Partition::new(&table, &config);
        let key = partition
            .keys()
            .find(|key| {
                key.level(Dimension::BValue) == Level::Value(2)
                    && key.level(Dimension::GradientOrientation) == Level::Value(1)
            })
            .unwrap();
        let mask = partition.mask(&key);
        assert_eq!(mask.bits(), &[false, true, false, false, true]);
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.indices(), vec![1, 4]);
    }
}
