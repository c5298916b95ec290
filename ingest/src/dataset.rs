use crate::{
    decode::ConfigurationIdentity,
    row::{MeasurementRow, RowSource},
};
use std::collections::BTreeMap;

type Bucket = BTreeMap<RowSource, MeasurementRow>;

/// Rows of a run grouped by configuration
///
/// Rows are keyed by their source (file and line), which makes appending commutative,
/// associative and idempotent: loading the same file twice yields the same dataset and the
/// iteration order never depends on the order files were loaded in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedDataset {
    buckets: BTreeMap<ConfigurationIdentity, Bucket>,
}

impl AggregatedDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// append rows to the bucket of `configuration`, creating it if necessary
    pub fn append<I>(&mut self, configuration: ConfigurationIdentity, rows: I)
    where
        I: IntoIterator<Item = MeasurementRow>,
    {
        let bucket = self.buckets.entry(configuration).or_default();

        for row in rows {
            bucket.insert(row.source.clone(), row);
        }
    }

    /// merge another dataset into this one
    pub fn merge(&mut self, other: AggregatedDataset) {
        for (configuration, bucket) in other.buckets {
            self.append(configuration, bucket.into_values());
        }
    }

    pub fn configurations(&self) -> impl Iterator<Item = &ConfigurationIdentity> + '_ {
        self.buckets.keys()
    }

    pub fn contains(&self, configuration: &ConfigurationIdentity) -> bool {
        self.buckets.contains_key(configuration)
    }

    /// rows of one configuration in source order, empty for unknown configurations
    pub fn rows<'a>(
        &'a self,
        configuration: &ConfigurationIdentity,
    ) -> impl Iterator<Item = &'a MeasurementRow> + 'a {
        self.buckets
            .get(configuration)
            .into_iter()
            .flat_map(|bucket| bucket.values())
    }

    /// rows of one configuration ordered by database size, selectivity and column count
    pub fn sorted_rows(&self, configuration: &ConfigurationIdentity) -> Vec<&MeasurementRow> {
        let mut rows: Vec<_> = self.rows(configuration).collect();

        rows.sort_by_key(|row| (row.database_size, row.selectivity(), row.num_columns()));

        rows
    }

    /// every (configuration, row) pair of the dataset
    pub fn observations(
        &self,
    ) -> impl Iterator<Item = (&ConfigurationIdentity, &MeasurementRow)> + '_ {
        self.buckets
            .iter()
            .flat_map(|(configuration, bucket)| bucket.values().map(move |row| (configuration, row)))
    }

    /// (configuration, row) pairs of a single configuration
    pub fn observations_of<'a>(
        &'a self,
        configuration: &'a ConfigurationIdentity,
    ) -> impl Iterator<Item = (&'a ConfigurationIdentity, &'a MeasurementRow)> + 'a {
        self.rows(configuration).map(move |row| (configuration, row))
    }

    pub fn row_count(&self, configuration: &ConfigurationIdentity) -> usize {
        self.buckets.get(configuration).map_or(0, Bucket::len)
    }

    /// number of rows over all configurations
    pub fn len(&self) -> usize {
        self.buckets.values().map(Bucket::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Extend<(ConfigurationIdentity, MeasurementRow)> for AggregatedDataset {
    fn extend<T: IntoIterator<Item = (ConfigurationIdentity, MeasurementRow)>>(
        &mut self,
        iter: T,
    ) {
        for (configuration, row) in iter {
            self.append(configuration, std::iter::once(row));
        }
    }
}

impl FromIterator<(ConfigurationIdentity, MeasurementRow)> for AggregatedDataset {
    fn from_iter<T: IntoIterator<Item = (ConfigurationIdentity, MeasurementRow)>>(
        iter: T,
    ) -> Self {
        let mut dataset = Self::new();
        dataset.extend(iter);
        dataset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;

    fn row(path: &str, line: u64, size: u64, selectivity: f64) -> MeasurementRow {
        MeasurementRow::new(RowSource::new(path, line), size).with(Field::Selectivity, selectivity)
    }

    #[test]
    fn merge_is_order_independent() {
        let config = ConfigurationIdentity::new(1, 10);
        let mut first = AggregatedDataset::new();
        first.append(config, [row("a.csv", 2, 10, 0.0), row("a.csv", 3, 20, 0.0)]);
        let mut second = AggregatedDataset::new();
        second.append(config, [row("b.csv", 2, 10, 100.0)]);

        let mut left = first.clone();
        left.merge(second.clone());
        let mut right = second;
        right.merge(first);

        assert_eq!(left, right);
        assert_eq!(left.row_count(&config), 3);
    }

    #[test]
    fn append_is_idempotent() {
        let config = ConfigurationIdentity::new(1, 10);
        let rows = [row("a.csv", 2, 10, 0.0), row("a.csv", 3, 20, 0.0)];
        let mut once = AggregatedDataset::new();
        once.append(config, rows.clone());
        let mut twice = once.clone();
        twice.append(config, rows);

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 2);
    }

    #[test]
    fn sorted_rows_follow_axes() {
        let config = ConfigurationIdentity::new(1, 10);
        let dataset: AggregatedDataset = [
            (config, row("a.csv", 2, 20, 100.0)),
            (config, row("a.csv", 3, 10, 100.0)),
            (config, row("b.csv", 2, 20, 0.0)),
        ]
        .into_iter()
        .collect();

        let order: Vec<_> = dataset
            .sorted_rows(&config)
            .iter()
            .map(|row| (row.database_size, row.selectivity()))
            .collect();

        assert_eq!(order, vec![(10, Some(100)), (20, Some(0)), (20, Some(100))]);
        assert_eq!(dataset.rows(&ConfigurationIdentity::new(2, 2)).count(), 0);
    }
}
