use std::collections::BTreeMap;

use thiserror::Error;

use super::schema::RecordLayout;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from field lookup and column arithmetic.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("no field named '{name}' in the diagnostic table")]
    MissingField { name: String },
    #[error("cannot combine columns with {left} and {right} values per timestep")]
    ShapeMismatch { left: usize, right: usize },
    #[error("cannot combine columns with {left} and {right} timesteps")]
    RowMismatch { left: usize, right: usize },
    #[error("record layouts differ between aggregated files")]
    LayoutMismatch,
    #[error("the diagnostic table has no timesteps")]
    EmptyTable,
}

// ---------------------------------------------------------------------------
// Column – one field over all timesteps
// ---------------------------------------------------------------------------

/// Values of one field across all timesteps, stored row-major.
///
/// `width` is 1 for scalar fields and the slice count for per-slice subarray
/// fields, so `data.len() == rows * width`. All scalar kinds are widened to
/// `f64` on decode.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    data: Vec<f64>,
    width: usize,
}

impl Column {
    pub fn new(data: Vec<f64>, width: usize) -> Self {
        debug_assert!(width > 0);
        debug_assert_eq!(data.len() % width, 0);
        Column { data, width }
    }

    /// A width-1 (scalar per timestep) column.
    pub fn scalar(data: Vec<f64>) -> Self {
        Column::new(data, 1)
    }

    /// Values per timestep: 1 for scalar fields, slice count for subarrays.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of timesteps.
    pub fn rows(&self) -> usize {
        self.data.len() / self.width
    }

    /// All values, row-major.
    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// The values of one timestep.
    ///
    /// # Panics
    ///
    /// Panics if `row >= self.rows()`.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.width..(row + 1) * self.width]
    }

    /// The first stored value, if any.
    pub fn first(&self) -> Option<f64> {
        self.data.first().copied()
    }

    /// Apply `f` to every value.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Column {
        Column {
            data: self.data.iter().map(|&v| f(v)).collect(),
            width: self.width,
        }
    }

    /// Combine two columns element-wise.
    ///
    /// Columns must have the same number of timesteps. A width-1 column
    /// broadcasts against a subarray column (its per-timestep scalar is
    /// applied to every slice); two subarray columns must have equal widths.
    pub fn zip_with(
        &self,
        other: &Column,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Column, TableError> {
        let rows = self.rows();
        if other.rows() != rows {
            return Err(TableError::RowMismatch {
                left: rows,
                right: other.rows(),
            });
        }
        let width = match (self.width, other.width) {
            (a, b) if a == b => a,
            (a, 1) => a,
            (1, b) => b,
            (a, b) => return Err(TableError::ShapeMismatch { left: a, right: b }),
        };

        let mut data = Vec::with_capacity(rows * width);
        for row in 0..rows {
            for k in 0..width {
                let a = self.data[row * self.width + if self.width == 1 { 0 } else { k }];
                let b = other.data[row * other.width + if other.width == 1 { 0 } else { k }];
                data.push(f(a, b));
            }
        }
        Ok(Column { data, width })
    }

    /// Reorder timesteps by the given row permutation.
    fn permuted(&self, order: &[usize]) -> Column {
        let mut data = Vec::with_capacity(self.data.len());
        for &row in order {
            data.extend_from_slice(self.row(row));
        }
        Column {
            data,
            width: self.width,
        }
    }
}

// ---------------------------------------------------------------------------
// Field lookup – shared by the table and its nested groups
// ---------------------------------------------------------------------------

/// Named field access, implemented by [`DiagTable`] and [`GroupView`].
///
/// The derived-quantity functions in [`crate::analysis`] take any
/// `FieldLookup`, so the same formula yields per-slice arrays on the table
/// and projected scalars on its `average()` view.
pub trait FieldLookup {
    fn field(&self, name: &str) -> Result<&Column, TableError>;
}

/// A view into one nested record group (`average` or `total`).
#[derive(Debug, Clone, Copy)]
pub struct GroupView<'a> {
    table: &'a DiagTable,
    prefix: &'a str,
}

impl FieldLookup for GroupView<'_> {
    fn field(&self, name: &str) -> Result<&Column, TableError> {
        self.table.field(&format!("{}.{}", self.prefix, name))
    }
}

// ---------------------------------------------------------------------------
// DiagTable – the aggregated diagnostic table
// ---------------------------------------------------------------------------

/// The aggregated in-situ diagnostic table: one row per simulation timestep,
/// columns keyed by field name with nested group fields under dotted names
/// (`"average.[x^2]"`).
#[derive(Debug, Clone, Default)]
pub struct DiagTable {
    layout: RecordLayout,
    n_rows: usize,
    columns: BTreeMap<String, Column>,
}

impl FieldLookup for DiagTable {
    fn field(&self, name: &str) -> Result<&Column, TableError> {
        self.columns.get(name).ok_or_else(|| TableError::MissingField {
            name: name.to_string(),
        })
    }
}

impl DiagTable {
    pub(crate) fn new(
        layout: RecordLayout,
        columns: BTreeMap<String, Column>,
        n_rows: usize,
    ) -> Self {
        DiagTable {
            layout,
            n_rows,
            columns,
        }
    }

    /// A table with no layout and no rows (the zero-files-matched result).
    pub fn empty() -> Self {
        DiagTable::default()
    }

    /// Number of timesteps.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// The record layout shared by all aggregated files.
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// All column names in lexicographic order, dotted names included.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// View of the slice-averaged `average` group.
    pub fn average(&self) -> GroupView<'_> {
        self.group("average")
    }

    /// View of the slice-summed `total` group.
    pub fn total(&self) -> GroupView<'_> {
        self.group("total")
    }

    /// View of an arbitrary nested group.
    pub fn group<'a>(&'a self, prefix: &'a str) -> GroupView<'a> {
        GroupView {
            table: self,
            prefix,
        }
    }

    /// Append another table's rows. The other table must carry an identical
    /// record layout; a table that has not adopted a layout yet (fresh
    /// [`DiagTable::empty`]) takes over the incoming one wholesale.
    pub(crate) fn append(&mut self, other: DiagTable) -> Result<(), TableError> {
        if self.layout.fields.is_empty() && self.n_rows == 0 {
            *self = other;
            return Ok(());
        }
        if other.layout != self.layout {
            return Err(TableError::LayoutMismatch);
        }
        for (name, incoming) in other.columns {
            // Same layout implies the same column set.
            if let Some(col) = self.columns.get_mut(&name) {
                col.data.extend_from_slice(&incoming.data);
            }
        }
        self.n_rows += other.n_rows;
        Ok(())
    }

    /// Sort rows ascending by the `time` field. The sort is stable: records
    /// with equal times keep their pre-sort relative order.
    pub(crate) fn sort_by_time(&mut self) -> Result<(), TableError> {
        if self.n_rows <= 1 {
            return Ok(());
        }
        let time = self.field("time")?;
        let times: Vec<f64> = (0..self.n_rows).map(|r| time.row(r)[0]).collect();

        let mut order: Vec<usize> = (0..self.n_rows).collect();
        order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

        if order.windows(2).all(|w| w[0] < w[1]) {
            return Ok(()); // already sorted
        }
        for col in self.columns.values_mut() {
            *col = col.permuted(&order);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
