//! Writes synthetic in-situ diagnostic files for the demo viewer:
//! a Gaussian beam undergoing betatron oscillations while accelerating,
//! split over two files the way the simulation splits output over restarts.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use byteorder::{LittleEndian, WriteBytesExt};
use serde_json::json;

const N_SLICES: usize = 64;
const STEPS_PER_FILE: u64 = 50;
const DT: f64 = 3.3e-12;

/// Payload offset declared in the header; the JSON descriptor plus space
/// padding fills the gap, as the upstream writer does.
const DATA_OFFSET: usize = 4096;

const Z_LO: f64 = -50.0e-6;
const Z_HI: f64 = 0.0;
const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;
const ELECTRON_MASS: f64 = 9.109_383_7015e-31;

/// The per-slice second-moment fields, in descriptor order.
const MOMENTS: [&str; 12] = [
    "[x]", "[x^2]", "[ux]", "[ux^2]", "[x*ux]", "[y]", "[y^2]", "[uy]", "[uy^2]", "[y*uy]",
    "[ga]", "[ga^2]",
];

fn descriptor() -> serde_json::Value {
    let mut fields = vec![
        json!(["time", "<f8"]),
        json!(["step", "<u8"]),
        json!(["n_slices", "<i8"]),
        json!(["charge", "<f8"]),
        json!(["mass", "<f8"]),
        json!(["z_lo", "<f8"]),
        json!(["z_hi", "<f8"]),
        json!(["normalized_density_factor", "<f8"]),
    ];
    for name in MOMENTS {
        fields.push(json!([name, "<f8", [N_SLICES]]));
    }
    fields.push(json!(["sum(w)", "<f8", [N_SLICES]]));

    let average: Vec<serde_json::Value> =
        MOMENTS.iter().map(|name| json!([name, "<f8"])).collect();
    fields.push(json!(["average", average]));
    fields.push(json!(["total", [["sum(w)", "<f8"]]]));

    json!(fields)
}

/// Second moments of one slice at one step: the twelve MOMENTS values plus
/// the slice weight.
struct SliceMoments {
    moments: [f64; 12],
    weight: f64,
}

fn slice_moments(step: u64, slice: usize, rng: &mut SimpleRng) -> SliceMoments {
    let t = step as f64 * DT;
    // zeta in (0, 1): position of the slice along the beam.
    let zeta = (slice as f64 + 0.5) / N_SLICES as f64;

    // Gaussian current profile with a little shot noise.
    let weight = 1.0e9 * (-(zeta - 0.5).powi(2) / (2.0 * 0.15f64.powi(2))).exp()
        * (1.0 + rng.gauss(0.0, 0.01));

    // Betatron oscillation, slightly dephased along the beam.
    let omega = 2.0 * std::f64::consts::PI / (80.0 * DT);
    let phase = omega * t + 0.4 * zeta;
    let mu_x = 0.2e-6 * phase.cos();
    let mu_y = -0.2e-6 * phase.sin();
    let sigma_x = 5.0e-6 * (1.0 + 0.2 * phase.sin());
    let sigma_y = 5.0e-6 * (1.0 - 0.2 * phase.sin());
    let sigma_ux = 2.0e-3;
    let sigma_uy = 2.0e-3;
    let rho = 0.3 * phase.cos();

    // Acceleration with a z-dependent chirp and a growing uncorrelated spread.
    let ga = 1000.0 + 5.0 * step as f64 * (0.8 + 0.4 * zeta);
    let sigma_ga = ga * 0.01 * (0.5 + zeta);

    SliceMoments {
        moments: [
            mu_x,
            mu_x * mu_x + sigma_x * sigma_x,
            0.0,
            sigma_ux * sigma_ux,
            rho * sigma_x * sigma_ux,
            mu_y,
            mu_y * mu_y + sigma_y * sigma_y,
            0.0,
            sigma_uy * sigma_uy,
            rho * sigma_y * sigma_uy,
            ga,
            ga * ga + sigma_ga * sigma_ga,
        ],
        weight,
    }
}

/// Append one binary record in descriptor order.
fn write_record(buf: &mut Vec<u8>, step: u64, rng: &mut SimpleRng) -> Result<()> {
    buf.write_f64::<LittleEndian>(step as f64 * DT)?;
    buf.write_u64::<LittleEndian>(step)?;
    buf.write_i64::<LittleEndian>(N_SLICES as i64)?;
    buf.write_f64::<LittleEndian>(-ELEMENTARY_CHARGE)?;
    buf.write_f64::<LittleEndian>(ELECTRON_MASS)?;
    buf.write_f64::<LittleEndian>(Z_LO)?;
    buf.write_f64::<LittleEndian>(Z_HI)?;
    buf.write_f64::<LittleEndian>(1.0)?;

    let slices: Vec<SliceMoments> = (0..N_SLICES)
        .map(|s| slice_moments(step, s, rng))
        .collect();

    for m in 0..MOMENTS.len() {
        for slice in &slices {
            buf.write_f64::<LittleEndian>(slice.moments[m])?;
        }
    }
    for slice in &slices {
        buf.write_f64::<LittleEndian>(slice.weight)?;
    }

    // average: weighted over slices; total: summed weight.
    let total_weight: f64 = slices.iter().map(|s| s.weight).sum();
    for m in 0..MOMENTS.len() {
        let weighted: f64 = slices.iter().map(|s| s.moments[m] * s.weight).sum();
        buf.write_f64::<LittleEndian>(weighted / total_weight)?;
    }
    buf.write_f64::<LittleEndian>(total_weight)?;
    Ok(())
}

fn write_file(path: &Path, steps: std::ops::Range<u64>, rng: &mut SimpleRng) -> Result<()> {
    let header = serde_json::to_string(&json!([descriptor(), DATA_OFFSET]))?;
    ensure!(
        header.len() <= DATA_OFFSET,
        "descriptor does not fit in the {DATA_OFFSET}-byte header region"
    );

    let mut payload = Vec::new();
    for step in steps {
        write_record(&mut payload, step, rng)?;
    }

    let mut file = fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    file.write_all(header.as_bytes())?;
    file.write_all(&vec![b' '; DATA_OFFSET - header.len()])?;
    file.write_all(&payload)?;
    Ok(())
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    let dir = Path::new("diags/insitu");
    fs::create_dir_all(dir).context("creating diags/insitu")?;

    // Two files covering consecutive step ranges, as a restarted run would.
    write_file(&dir.join("reduced_beam.000.txt"), 0..STEPS_PER_FILE, &mut rng)?;
    write_file(
        &dir.join("reduced_beam.001.txt"),
        STEPS_PER_FILE..2 * STEPS_PER_FILE,
        &mut rng,
    )?;

    println!(
        "Wrote {} timesteps ({N_SLICES} slices each) to {}",
        2 * STEPS_PER_FILE,
        dir.display()
    );
    Ok(())
}
