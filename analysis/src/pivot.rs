use crate::{error::AnalysisError, metrics::Metric, tree::TreeModel};
use bloomstat_ingest::{AggregatedDataset, ConfigurationIdentity, Field, MeasurementRow};
use itertools::Itertools;
use serde::{Deserialize, Serialize, Serializer};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};
use thiserror::Error;
use tracing::debug;

/// How colliding values of one cell are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// first present value in dataset order, collisions stay visible through the contributor count
    First,
    /// arithmetic mean of the present values
    #[default]
    Mean,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown aggregation `{0}`, expected `first` or `mean`")]
    Aggregation(String),
    #[error("unknown axis `{0}`")]
    Axis(String),
}

impl FromStr for Aggregation {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Self::First),
            "mean" => Ok(Self::Mean),
            _ => Err(ParseError::Aggregation(s.to_owned())),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("first"),
            Self::Mean => f.write_str("mean"),
        }
    }
}

/// Row or column key of a pivot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// the configuration a row belongs to, used for cross-configuration tables
    Configuration,
    Field(Field),
}

impl Axis {
    fn value(&self, configuration: &ConfigurationIdentity, row: &MeasurementRow) -> Option<AxisValue> {
        match self {
            Self::Configuration => Some(AxisValue::Configuration(*configuration)),
            Self::Field(field) => row.get(*field).map(|value| AxisValue::Number(Number::new(value))),
        }
    }
}

impl From<Field> for Axis {
    fn from(field: Field) -> Self {
        Self::Field(field)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => f.write_str("configuration"),
            Self::Field(field) => field.fmt(f),
        }
    }
}

impl FromStr for Axis {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "configuration" {
            return Ok(Self::Configuration);
        }
        s.parse::<Field>()
            .map(Self::Field)
            .map_err(|_| ParseError::Axis(s.to_owned()))
    }
}

impl Serialize for Axis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Totally ordered axis number, `-0` and `0` are one label
#[derive(Debug, Clone, Copy)]
pub struct Number(f64);

impl Number {
    pub fn new(value: f64) -> Self {
        Self(if value == 0.0 { 0.0 } else { value })
    }

    pub fn get(&self) -> f64 {
        self.0
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A row or column label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AxisValue {
    Configuration(ConfigurationIdentity),
    Number(Number),
}

impl AxisValue {
    pub fn number(value: f64) -> Self {
        Self::Number(Number::new(value))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(number.get()),
            Self::Configuration(_) => None,
        }
    }

    pub fn as_configuration(&self) -> Option<&ConfigurationIdentity> {
        match self {
            Self::Configuration(configuration) => Some(configuration),
            Self::Number(_) => None,
        }
    }
}

impl From<ConfigurationIdentity> for AxisValue {
    fn from(configuration: ConfigurationIdentity) -> Self {
        Self::Configuration(configuration)
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(configuration) => configuration.fmt(f),
            Self::Number(number) => number.fmt(f),
        }
    }
}

impl Serialize for AxisValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Configuration(configuration) => serializer.collect_str(configuration),
            Self::Number(number) => {
                let value = number.get();
                // integral labels are written as integers
                if value.fract() == 0.0 && value >= 0.0 && value < u64::MAX as f64 {
                    serializer.serialize_u64(value as u64)
                } else {
                    serializer.serialize_f64(value)
                }
            }
        }
    }
}

/// The full description of a pivot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PivotQuery {
    pub rows: Axis,
    pub columns: Axis,
    pub value: Metric,
    pub aggregation: Aggregation,
}

impl PivotQuery {
    pub fn new(
        rows: impl Into<Axis>,
        columns: impl Into<Axis>,
        value: impl Into<Metric>,
        aggregation: Aggregation,
    ) -> Self {
        Self {
            rows: rows.into(),
            columns: columns.into(),
            value: value.into(),
            aggregation,
        }
    }

    /// Pivot the given observations
    ///
    /// Observations lacking a row or column key are skipped. A key pair whose values are all
    /// missing still produces its labels with a missing cell.
    pub fn apply<'a, I>(&self, observations: I, model: &TreeModel) -> PivotTable
    where
        I: IntoIterator<Item = (&'a ConfigurationIdentity, &'a MeasurementRow)>,
    {
        let mut accumulated: BTreeMap<(AxisValue, AxisValue), Accumulator> = BTreeMap::new();
        let mut skipped = 0usize;

        for (configuration, row) in observations {
            let (Some(row_label), Some(column_label)) = (
                self.rows.value(configuration, row),
                self.columns.value(configuration, row),
            ) else {
                skipped += 1;
                continue;
            };

            accumulated
                .entry((row_label, column_label))
                .or_default()
                .push(self.value.evaluate(configuration, row, model));
        }

        if skipped > 0 {
            debug!(rows = %self.rows, columns = %self.columns, skipped, "observations without pivot keys");
        }

        let rows: Vec<AxisValue> = accumulated.keys().map(|(row, _)| *row).dedup().collect();
        let columns: Vec<AxisValue> = accumulated
            .keys()
            .map(|(_, column)| *column)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut cells = vec![vec![None; columns.len()]; rows.len()];
        let mut contributors = vec![vec![0; columns.len()]; rows.len()];

        for ((row, column), accumulator) in accumulated {
            // labels were collected from the same keys
            let (Ok(r), Ok(c)) = (rows.binary_search(&row), columns.binary_search(&column)) else {
                continue;
            };
            cells[r][c] = accumulator.aggregate(self.aggregation);
            contributors[r][c] = accumulator.contributors;
        }

        PivotTable {
            row_key: self.rows,
            column_key: self.columns,
            value: self.value,
            aggregation: self.aggregation,
            rows,
            columns,
            cells,
            contributors,
        }
    }
}

#[derive(Default)]
struct Accumulator {
    first: Option<f64>,
    sum: f64,
    present: usize,
    contributors: usize,
}

impl Accumulator {
    fn push(&mut self, value: Option<f64>) {
        self.contributors += 1;

        if let Some(value) = value {
            self.first.get_or_insert(value);
            self.sum += value;
            self.present += 1;
        }
    }

    fn aggregate(&self, aggregation: Aggregation) -> Option<f64> {
        match aggregation {
            Aggregation::First => self.first,
            Aggregation::Mean => (self.present > 0).then(|| self.sum / self.present as f64),
        }
    }
}

/// A two dimensional table with sorted labels and optional cells
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    pub row_key: Axis,
    pub column_key: Axis,
    pub value: Metric,
    pub aggregation: Aggregation,
    pub rows: Vec<AxisValue>,
    pub columns: Vec<AxisValue>,
    /// `cells[row][column]`
    pub cells: Vec<Vec<Option<f64>>>,
    /// number of observations that fell into each cell
    #[serde(skip)]
    pub contributors: Vec<Vec<usize>>,
}

/// A cell that more than one observation fell into
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateCell {
    pub row: AxisValue,
    pub column: AxisValue,
    pub contributors: usize,
}

impl PivotTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    /// Turn an empty table into [`AnalysisError::EmptyResult`]
    pub fn non_empty(self) -> Result<Self, AnalysisError> {
        if self.is_empty() {
            Err(AnalysisError::EmptyResult(format!(
                "{} by {} x {}",
                self.value, self.row_key, self.column_key
            )))
        } else {
            Ok(self)
        }
    }

    fn position(&self, row: &AxisValue, column: &AxisValue) -> Option<(usize, usize)> {
        Some((
            self.rows.binary_search(row).ok()?,
            self.columns.binary_search(column).ok()?,
        ))
    }

    pub fn get(&self, row: &AxisValue, column: &AxisValue) -> Option<f64> {
        let (r, c) = self.position(row, column)?;
        self.cells[r][c]
    }

    pub fn contributors(&self, row: &AxisValue, column: &AxisValue) -> usize {
        self.position(row, column)
            .map_or(0, |(r, c)| self.contributors[r][c])
    }

    /// (row, column, value) for every present cell, row major
    pub fn triples(&self) -> Vec<(AxisValue, AxisValue, f64)> {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(r, row)| {
                self.columns.iter().enumerate().filter_map(move |(c, column)| {
                    self.cells[r][c].map(|value| (*row, *column, value))
                })
            })
            .collect()
    }

    /// cells with more than one contributing observation
    pub fn duplicate_cells(&self) -> Vec<DuplicateCell> {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(r, row)| {
                self.columns.iter().enumerate().filter_map(move |(c, column)| {
                    let contributors = self.contributors[r][c];
                    (contributors > 1).then_some(DuplicateCell {
                        row: *row,
                        column: *column,
                        contributors,
                    })
                })
            })
            .collect()
    }
}

/// Pivot every row of the dataset with the default tree model
///
/// Unless one axis is the configuration, the dataset must hold at most one configuration.
pub fn pivot(
    dataset: &AggregatedDataset,
    row_key: impl Into<Axis>,
    column_key: impl Into<Axis>,
    value: impl Into<Metric>,
    aggregation: Aggregation,
) -> Result<PivotTable, AnalysisError> {
    let query = PivotQuery::new(row_key, column_key, value, aggregation);

    let configurations = dataset.configurations().count();
    if configurations > 1 && ![query.rows, query.columns].contains(&Axis::Configuration) {
        return Err(AnalysisError::MixedConfigurations(configurations));
    }

    Ok(query.apply(dataset.observations(), &TreeModel::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloomstat_ingest::RowSource;

    fn measurement(line: u64, selectivity: f64, columns: f64, latency: Option<f64>) -> MeasurementRow {
        let row = MeasurementRow::new(RowSource::new("1M-R10.csv", line), 1_000_000)
            .with(Field::Selectivity, selectivity)
            .with(Field::NumColumns, columns);
        match latency {
            Some(latency) => row.with(Field::MultiLatency, latency),
            None => row,
        }
    }

    fn dataset(rows: Vec<MeasurementRow>) -> AggregatedDataset {
        let configuration = ConfigurationIdentity::new(1, 10);
        rows.into_iter().map(|row| (configuration, row)).collect()
    }

    #[test]
    fn labels_are_sorted() {
        let dataset = dataset(vec![
            measurement(2, 100.0, 3.0, Some(30.0)),
            measurement(3, 0.0, 3.0, Some(10.0)),
            measurement(4, 50.0, 2.0, Some(20.0)),
        ]);
        let table = pivot(
            &dataset,
            Field::Selectivity,
            Field::NumColumns,
            Field::MultiLatency,
            Aggregation::First,
        )
        .unwrap();

        assert_eq!(
            table.rows,
            vec![AxisValue::number(0.0), AxisValue::number(50.0), AxisValue::number(100.0)]
        );
        assert_eq!(table.columns, vec![AxisValue::number(2.0), AxisValue::number(3.0)]);
        assert_eq!(table.cells[0], vec![None, Some(10.0)]);
        assert_eq!(table.cells[1], vec![Some(20.0), None]);
        assert_eq!(table.get(&AxisValue::number(100.0), &AxisValue::number(3.0)), Some(30.0));
        assert!(table.duplicate_cells().is_empty());
    }

    #[test]
    fn first_keeps_collisions_visible() {
        let dataset = dataset(vec![
            measurement(2, 0.0, 2.0, Some(10.0)),
            measurement(3, 0.0, 2.0, Some(14.0)),
        ]);
        let first = pivot(
            &dataset,
            Field::Selectivity,
            Field::NumColumns,
            Field::MultiLatency,
            Aggregation::First,
        )
        .unwrap();
        let mean = pivot(
            &dataset,
            Field::Selectivity,
            Field::NumColumns,
            Field::MultiLatency,
            Aggregation::Mean,
        )
        .unwrap();
        let (row, column) = (AxisValue::number(0.0), AxisValue::number(2.0));

        assert_eq!(first.get(&row, &column), Some(10.0));
        assert_eq!(mean.get(&row, &column), Some(12.0));
        assert_eq!(
            first.duplicate_cells(),
            vec![DuplicateCell {
                row,
                column,
                contributors: 2
            }]
        );
    }

    #[test]
    fn missing_values() {
        let dataset = dataset(vec![
            measurement(2, 0.0, 2.0, None),
            measurement(3, 0.0, 2.0, Some(14.0)),
            measurement(4, 100.0, 2.0, None),
        ]);
        let mean = pivot(
            &dataset,
            Field::Selectivity,
            Field::NumColumns,
            Field::MultiLatency,
            Aggregation::Mean,
        )
        .unwrap();
        let first = pivot(
            &dataset,
            Field::Selectivity,
            Field::NumColumns,
            Field::MultiLatency,
            Aggregation::First,
        )
        .unwrap();
        let column = AxisValue::number(2.0);

        assert_eq!(mean.get(&AxisValue::number(0.0), &column), Some(14.0));
        assert_eq!(first.get(&AxisValue::number(0.0), &column), Some(14.0));
        // labels survive even though every value is missing
        assert_eq!(mean.rows.len(), 2);
        assert_eq!(mean.get(&AxisValue::number(100.0), &column), None);
        assert_eq!(mean.contributors(&AxisValue::number(100.0), &column), 1);
    }

    #[test]
    fn rows_without_keys_are_skipped() {
        let configuration = ConfigurationIdentity::new(1, 10);
        let dataset: AggregatedDataset = [(
            configuration,
            MeasurementRow::new(RowSource::new("1M-R10.csv", 2), 10).with(Field::MultiLatency, 1.0),
        )]
        .into_iter()
        .collect();

        let table = pivot(
            &dataset,
            Field::Selectivity,
            Field::NumColumns,
            Field::MultiLatency,
            Aggregation::Mean,
        )
        .unwrap();

        assert!(table.is_empty());
        assert!(matches!(table.non_empty(), Err(AnalysisError::EmptyResult(_))));
    }

    #[test]
    fn configuration_axis() {
        let mut dataset = dataset(vec![measurement(2, 0.0, 2.0, Some(10.0))]);
        dataset.append(
            ConfigurationIdentity::new(2, 4),
            [measurement(2, 0.0, 2.0, Some(8.0))],
        );

        let table = pivot(
            &dataset,
            Axis::Configuration,
            Field::Selectivity,
            Field::MultiLatency,
            Aggregation::Mean,
        )
        .unwrap();

        assert_eq!(
            table.rows,
            vec![
                AxisValue::from(ConfigurationIdentity::new(1, 10)),
                AxisValue::from(ConfigurationIdentity::new(2, 4)),
            ]
        );
        assert_eq!(
            table.get(
                &ConfigurationIdentity::new(2, 4).into(),
                &AxisValue::number(0.0)
            ),
            Some(8.0)
        );
    }

    #[test]
    fn field_axes_reject_mixed_configurations() {
        let mut dataset = dataset(vec![measurement(2, 0.0, 2.0, Some(10.0))]);
        dataset.append(
            ConfigurationIdentity::new(4, 2),
            [measurement(2, 0.0, 2.0, Some(1000.0))],
        );

        for aggregation in [Aggregation::First, Aggregation::Mean] {
            assert_eq!(
                pivot(
                    &dataset,
                    Field::Selectivity,
                    Field::NumColumns,
                    Field::MultiLatency,
                    aggregation,
                ),
                Err(AnalysisError::MixedConfigurations(2))
            );
        }

        // restricted to one configuration the cell only sees its own row
        let table = PivotQuery::new(
            Field::Selectivity,
            Field::NumColumns,
            Field::MultiLatency,
            Aggregation::Mean,
        )
        .apply(
            dataset.observations_of(&ConfigurationIdentity::new(4, 2)),
            &TreeModel::default(),
        );
        let (row, column) = (AxisValue::number(0.0), AxisValue::number(2.0));
        assert_eq!(table.get(&row, &column), Some(1000.0));
        assert_eq!(table.contributors(&row, &column), 1);
    }

    #[test]
    fn parse_names() {
        assert_eq!("first".parse(), Ok(Aggregation::First));
        assert_eq!("mean".parse(), Ok(Aggregation::Mean));
        assert!("median".parse::<Aggregation>().is_err());
        assert_eq!("configuration".parse(), Ok(Axis::Configuration));
        assert_eq!("selectivity".parse(), Ok(Axis::Field(Field::Selectivity)));
        assert!("rows".parse::<Axis>().is_err());
        assert_eq!(Number::new(-0.0), Number::new(0.0));
    }
}
