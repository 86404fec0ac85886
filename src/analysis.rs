//! Derived physics quantities over the aggregated diagnostic table.
//!
//! Every function is pure: it reads fields by name, combines them
//! element-wise, and returns a fresh [`Column`]. Applied to the table itself
//! the results are per-slice arrays; applied to its `average()` view they are
//! the projected (slice-collapsed) per-timestep scalars.

use crate::data::model::{Column, DiagTable, FieldLookup, TableError};

/// `sqrt` with round-off protection: a small negative variance from
/// cancellation clamps to zero. NaN passes through untouched.
fn clamped_sqrt(v: f64) -> f64 {
    if v < 0.0 {
        0.0
    } else {
        v.sqrt()
    }
}

/// `[q^2] - [q]^2` for a pair of moment fields.
fn variance(data: &impl FieldLookup, sq: &str, mean: &str) -> Result<Column, TableError> {
    data.field(sq)?
        .zip_with(data.field(mean)?, |sq, m| sq - m * m)
}

fn emittance(
    data: &impl FieldLookup,
    pos: &str,
    pos_sq: &str,
    mom: &str,
    mom_sq: &str,
    cross: &str,
) -> Result<Column, TableError> {
    let var_pos = variance(data, pos_sq, pos)?;
    let var_mom = variance(data, mom_sq, mom)?;
    let mean_product = data.field(pos)?.zip_with(data.field(mom)?, |p, m| p * m)?;
    let cov = data.field(cross)?.zip_with(&mean_product, |c, pm| c - pm)?;

    // sqrt(|Var(pos) * Var(mom) - Cov^2|); the absolute value guards against
    // round-off driving the discriminant just below zero.
    var_pos
        .zip_with(&var_mom, |a, b| a * b)?
        .zip_with(&cov, |d, c| (d - c * c).abs().sqrt())
}

/// Geometric emittance in the x-ux plane.
///
/// Per-slice: `emittance_x(&data)`. Projected: `emittance_x(&data.average())`.
pub fn emittance_x(data: &impl FieldLookup) -> Result<Column, TableError> {
    emittance(data, "[x]", "[x^2]", "[ux]", "[ux^2]", "[x*ux]")
}

/// Geometric emittance in the y-uy plane.
pub fn emittance_y(data: &impl FieldLookup) -> Result<Column, TableError> {
    emittance(data, "[y]", "[y^2]", "[uy]", "[uy^2]", "[y*uy]")
}

/// RMS spread of the Lorentz factor, `sqrt(max([ga^2] - [ga]^2, 0))`.
pub fn energy_spread(data: &impl FieldLookup) -> Result<Column, TableError> {
    Ok(variance(data, "[ga^2]", "[ga]")?.map(clamped_sqrt))
}

/// Mean transverse position `[x]`.
pub fn position_mean_x(data: &impl FieldLookup) -> Result<Column, TableError> {
    data.field("[x]").cloned()
}

/// Mean transverse position `[y]`.
pub fn position_mean_y(data: &impl FieldLookup) -> Result<Column, TableError> {
    data.field("[y]").cloned()
}

/// RMS transverse beam size in x.
pub fn position_std_x(data: &impl FieldLookup) -> Result<Column, TableError> {
    Ok(variance(data, "[x^2]", "[x]")?.map(clamped_sqrt))
}

/// RMS transverse beam size in y.
pub fn position_std_y(data: &impl FieldLookup) -> Result<Column, TableError> {
    Ok(variance(data, "[y^2]", "[y]")?.map(clamped_sqrt))
}

/// Charge per slice: `charge * sum(w) * normalized_density_factor`, the
/// scalar factors broadcast across slices.
pub fn per_slice_charge(data: &impl FieldLookup) -> Result<Column, TableError> {
    data.field("charge")?
        .zip_with(data.field("sum(w)")?, |c, w| c * w)?
        .zip_with(data.field("normalized_density_factor")?, |cw, n| cw * n)
}

/// Total beam charge per timestep, from the slice-summed `total` group.
pub fn total_charge(data: &DiagTable) -> Result<Column, TableError> {
    data.field("charge")?
        .zip_with(data.total().field("sum(w)")?, |c, w| c * w)?
        .zip_with(data.field("normalized_density_factor")?, |cw, n| cw * n)
}

/// The longitudinal coordinate of each slice center, from the first
/// timestep's geometry (`z_lo`, `z_hi`, `n_slices`). Geometry is assumed
/// constant across timesteps and is not re-validated.
pub fn z_axis(data: &DiagTable) -> Result<Vec<f64>, TableError> {
    let z_lo = data.field("z_lo")?.first().ok_or(TableError::EmptyTable)?;
    let z_hi = data.field("z_hi")?.first().ok_or(TableError::EmptyTable)?;
    let n = data
        .field("n_slices")?
        .first()
        .ok_or(TableError::EmptyTable)? as usize;

    let dz = (z_hi - z_lo) / n as f64;
    Ok((0..n).map(|i| z_lo + dz * (i as f64 + 0.5)).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;
    use crate::data::schema::parse_header;
    use std::collections::BTreeMap;

    fn table_with(columns: &[(&str, Column)]) -> DiagTable {
        let n_rows = columns.first().map(|(_, c)| c.rows()).unwrap_or(0);
        let map: BTreeMap<String, Column> = columns
            .iter()
            .map(|(n, c)| (n.to_string(), c.clone()))
            .collect();
        let (layout, _) = parse_header("[[[\"time\", \"<f8\"]], 16]").unwrap();
        DiagTable::new(layout, map, n_rows)
    }

    #[test]
    fn energy_spread_clamps_negative_roundoff() {
        let table = table_with(&[
            ("[ga]", Column::scalar(vec![1000.0])),
            ("[ga^2]", Column::scalar(vec![1_000_000.0 - 1e-12])),
        ]);
        assert_eq!(energy_spread(&table).unwrap().values(), &[0.0]);
    }

    #[test]
    fn energy_spread_propagates_nan() {
        let table = table_with(&[
            ("[ga]", Column::scalar(vec![f64::NAN])),
            ("[ga^2]", Column::scalar(vec![4.0])),
        ]);
        assert!(energy_spread(&table).unwrap().values()[0].is_nan());
    }

    #[test]
    fn position_std_never_negative() {
        let table = table_with(&[
            ("[x]", Column::scalar(vec![2.0, 1e-6])),
            ("[x^2]", Column::scalar(vec![4.0 - 1e-12, 2e-12])),
        ]);
        let std = position_std_x(&table).unwrap();
        assert!(std.values().iter().all(|&v| v >= 0.0));
        assert_eq!(std.values()[0], 0.0);
    }

    #[test]
    fn uncorrelated_emittance_is_sqrt_of_variance_product() {
        // Var(x) = 5 - 1 = 4, Var(ux) = 13 - 4 = 9, Cov = 2 - 1*2 = 0.
        let table = table_with(&[
            ("[x]", Column::scalar(vec![1.0])),
            ("[x^2]", Column::scalar(vec![5.0])),
            ("[ux]", Column::scalar(vec![2.0])),
            ("[ux^2]", Column::scalar(vec![13.0])),
            ("[x*ux]", Column::scalar(vec![2.0])),
        ]);
        assert_eq!(emittance_x(&table).unwrap().values(), &[6.0]);
    }

    #[test]
    fn projected_emittance_uses_the_average_group() {
        let table = table_with(&[
            ("[x]", Column::new(vec![1.0, 1.0], 2)),
            ("[x^2]", Column::new(vec![5.0, 5.0], 2)),
            ("[ux]", Column::new(vec![2.0, 2.0], 2)),
            ("[ux^2]", Column::new(vec![13.0, 13.0], 2)),
            ("[x*ux]", Column::new(vec![2.0, 2.0], 2)),
            ("average.[x]", Column::scalar(vec![0.0])),
            ("average.[x^2]", Column::scalar(vec![1.0])),
            ("average.[ux]", Column::scalar(vec![0.0])),
            ("average.[ux^2]", Column::scalar(vec![4.0])),
            ("average.[x*ux]", Column::scalar(vec![0.0])),
        ]);
        // Per-slice result keeps the slice axis...
        let per_slice = emittance_x(&table).unwrap();
        assert_eq!(per_slice.width(), 2);
        assert_eq!(per_slice.values(), &[6.0, 6.0]);
        // ...while the average view collapses it.
        let projected = emittance_x(&table.average()).unwrap();
        assert_eq!(projected.width(), 1);
        assert_eq!(projected.values(), &[2.0]);
    }

    #[test]
    fn charges_broadcast_and_use_total_group() {
        let table = table_with(&[
            ("charge", Column::scalar(vec![-1.0])),
            ("normalized_density_factor", Column::scalar(vec![2.0])),
            ("sum(w)", Column::new(vec![1.0, 3.0], 2)),
            ("total.sum(w)", Column::scalar(vec![4.0])),
        ]);
        let per_slice = per_slice_charge(&table).unwrap();
        assert_eq!(per_slice.values(), &[-2.0, -6.0]);
        let total = total_charge(&table).unwrap();
        assert_eq!(total.values(), &[-8.0]);
    }

    #[test]
    fn z_axis_returns_bin_centers() {
        let table = table_with(&[
            ("z_lo", Column::scalar(vec![0.0, 0.0])),
            ("z_hi", Column::scalar(vec![10.0, 10.0])),
            ("n_slices", Column::scalar(vec![5.0, 5.0])),
        ]);
        assert_eq!(z_axis(&table).unwrap(), vec![1.0, 3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn z_axis_on_empty_table_errors() {
        let table = table_with(&[
            ("z_lo", Column::scalar(vec![])),
            ("z_hi", Column::scalar(vec![])),
            ("n_slices", Column::scalar(vec![])),
        ]);
        assert!(matches!(z_axis(&table), Err(TableError::EmptyTable)));
    }
}
