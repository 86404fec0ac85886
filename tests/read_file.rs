//! End-to-end tests: write diagnostic files to disk, load them through the
//! public API, and check the aggregated table and derived quantities.

use std::io::Write;
use std::path::Path;

use beamdiag::{analysis, read_file, FieldLookup, LoadError};

const N_SLICES: usize = 3;

/// Descriptor with per-slice subarrays and the nested average/total groups.
fn descriptor() -> String {
    format!(
        concat!(
            "[[\"time\", \"<f8\"], [\"charge\", \"<f8\"], ",
            "[\"normalized_density_factor\", \"<f8\"], ",
            "[\"z_lo\", \"<f8\"], [\"z_hi\", \"<f8\"], [\"n_slices\", \"<i8\"], ",
            "[\"[x]\", \"<f8\", [{n}]], [\"[x^2]\", \"<f8\", [{n}]], ",
            "[\"[ux]\", \"<f8\", [{n}]], [\"[ux^2]\", \"<f8\", [{n}]], ",
            "[\"[x*ux]\", \"<f8\", [{n}]], [\"sum(w)\", \"<f8\", [{n}]], ",
            "[\"average\", [[\"[ga]\", \"<f8\"], [\"[ga^2]\", \"<f8\"]]], ",
            "[\"total\", [[\"sum(w)\", \"<f8\"]]]]"
        ),
        n = N_SLICES
    )
}

/// One timestep's worth of payload values, in descriptor order.
struct Record {
    time: f64,
    charge: f64,
    density_factor: f64,
    z_lo: f64,
    z_hi: f64,
    n_slices: i64,
    x: [f64; N_SLICES],
    x_sq: [f64; N_SLICES],
    ux: [f64; N_SLICES],
    ux_sq: [f64; N_SLICES],
    x_ux: [f64; N_SLICES],
    sum_w: [f64; N_SLICES],
    avg_ga: f64,
    avg_ga_sq: f64,
    total_w: f64,
}

impl Record {
    /// Uncorrelated slices with Var(x) = 4, Var(ux) = 9 everywhere.
    fn plain(time: f64) -> Self {
        Record {
            time,
            charge: -1.0,
            density_factor: 2.0,
            z_lo: 0.0,
            z_hi: 10.0,
            n_slices: N_SLICES as i64,
            x: [1.0; N_SLICES],
            x_sq: [5.0; N_SLICES],
            ux: [2.0; N_SLICES],
            ux_sq: [13.0; N_SLICES],
            x_ux: [2.0; N_SLICES],
            sum_w: [1.0, 3.0, 5.0],
            avg_ga: 100.0,
            avg_ga_sq: 100.0 * 100.0 + 4.0,
            total_w: 9.0,
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut push = |v: f64| buf.extend_from_slice(&v.to_le_bytes());
        push(self.time);
        push(self.charge);
        push(self.density_factor);
        push(self.z_lo);
        push(self.z_hi);
        buf.extend_from_slice(&self.n_slices.to_le_bytes());
        for arr in [
            &self.x, &self.x_sq, &self.ux, &self.ux_sq, &self.x_ux, &self.sum_w,
        ] {
            for &v in arr {
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        buf.extend_from_slice(&self.avg_ga.to_le_bytes());
        buf.extend_from_slice(&self.avg_ga_sq.to_le_bytes());
        buf.extend_from_slice(&self.total_w.to_le_bytes());
        buf
    }
}

fn write_diag_file(path: &Path, records: &[Record]) {
    let header = format!("[{}, 2048]", descriptor());
    assert!(header.len() <= 2048);

    let mut file = std::fs::File::create(path).unwrap();
    file.write_all(header.as_bytes()).unwrap();
    file.write_all(&vec![b' '; 2048 - header.len()]).unwrap();
    for record in records {
        file.write_all(&record.to_bytes()).unwrap();
    }
}

#[test]
fn round_trips_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reduced_beam.000.txt");
    write_diag_file(&path, &[Record::plain(0.5)]);

    let data = read_file(path.to_str().unwrap()).unwrap();
    assert_eq!(data.n_rows(), 1);
    assert_eq!(data.field("time").unwrap().values(), &[0.5]);
    assert_eq!(data.field("n_slices").unwrap().values(), &[3.0]);
    assert_eq!(data.field("sum(w)").unwrap().values(), &[1.0, 3.0, 5.0]);
    assert_eq!(data.field("[x^2]").unwrap().width(), N_SLICES);
    assert_eq!(data.field("average.[ga]").unwrap().values(), &[100.0]);
    assert_eq!(data.total().field("sum(w)").unwrap().values(), &[9.0]);
}

#[test]
fn files_aggregate_in_time_order() {
    let dir = tempfile::tempdir().unwrap();
    write_diag_file(
        &dir.path().join("reduced_beam.000.txt"),
        &[Record::plain(2.0)],
    );
    write_diag_file(
        &dir.path().join("reduced_beam.001.txt"),
        &[Record::plain(1.0)],
    );

    let pattern = dir.path().join("reduced_beam.*.txt");
    let data = read_file(pattern.to_str().unwrap()).unwrap();
    assert_eq!(data.field("time").unwrap().values(), &[1.0, 2.0]);
}

#[test]
fn equal_times_keep_file_then_record_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut first = Record::plain(1.0);
    first.avg_ga = 1.0;
    let mut second = Record::plain(1.0);
    second.avg_ga = 2.0;
    let mut third = Record::plain(1.0);
    third.avg_ga = 3.0;

    write_diag_file(&dir.path().join("reduced_beam.000.txt"), &[first, second]);
    write_diag_file(&dir.path().join("reduced_beam.001.txt"), &[third]);

    let pattern = dir.path().join("reduced_beam.*.txt");
    let data = read_file(pattern.to_str().unwrap()).unwrap();
    assert_eq!(
        data.field("average.[ga]").unwrap().values(),
        &[1.0, 2.0, 3.0]
    );
}

#[test]
fn zero_matches_is_an_empty_table() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = dir.path().join("reduced_beam.*.txt");
    let data = read_file(pattern.to_str().unwrap()).unwrap();
    assert!(data.is_empty());
}

#[test]
fn divergent_layouts_never_merge() {
    let dir = tempfile::tempdir().unwrap();
    write_diag_file(
        &dir.path().join("reduced_beam.000.txt"),
        &[Record::plain(0.0)],
    );
    // Second file: a different (tiny) layout.
    let other = dir.path().join("reduced_beam.001.txt");
    let header = "[[[\"time\", \"<f8\"]], 64]";
    let mut file = std::fs::File::create(&other).unwrap();
    file.write_all(header.as_bytes()).unwrap();
    file.write_all(&vec![b' '; 64 - header.len()]).unwrap();
    file.write_all(&1.0f64.to_le_bytes()).unwrap();

    let pattern = dir.path().join("reduced_beam.*.txt");
    assert!(matches!(
        read_file(pattern.to_str().unwrap()),
        Err(LoadError::LayoutMismatch { .. })
    ));
}

#[test]
fn derived_quantities_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reduced_beam.000.txt");
    write_diag_file(&path, &[Record::plain(0.0)]);
    let data = read_file(path.to_str().unwrap()).unwrap();

    // Uncorrelated slices: emittance = sqrt(4 * 9) per slice.
    let emit = analysis::emittance_x(&data).unwrap();
    assert_eq!(emit.values(), &[6.0; N_SLICES]);

    // Projected energy spread from the average group: sqrt(4).
    let spread = analysis::energy_spread(&data.average()).unwrap();
    assert_eq!(spread.values(), &[2.0]);

    // Charges: scalar factors broadcast over slices; total uses total.sum(w).
    let per_slice = analysis::per_slice_charge(&data).unwrap();
    assert_eq!(per_slice.values(), &[-2.0, -6.0, -10.0]);
    let total = analysis::total_charge(&data).unwrap();
    assert_eq!(total.values(), &[-18.0]);

}

#[test]
fn z_axis_gives_five_bin_centers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reduced_beam.000.txt");
    let mut record = Record::plain(0.0);
    // Geometry field, independent of the subarray widths.
    record.n_slices = 5;
    write_diag_file(&path, &[record]);

    let data = read_file(path.to_str().unwrap()).unwrap();
    assert_eq!(
        analysis::z_axis(&data).unwrap(),
        vec![1.0, 3.0, 5.0, 7.0, 9.0]
    );
}
