use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Continuous colormap for the energy-spread heatmap
// ---------------------------------------------------------------------------

/// Map a normalized value in `[0, 1]` to a colour, sweeping the hue from
/// blue (cold, 240°) down to red (hot, 0°). Values outside the range clamp;
/// NaN renders as the low end.
pub fn colormap(t: f64) -> Color32 {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) } as f32;
    let hue = 240.0 * (1.0 - t);
    let hsl = Hsl::new(hue, 0.85, 0.5);
    let rgb: Srgb = hsl.into_color();
    Color32::from_rgb(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

/// Normalize a slice of values to `[0, 1]` for [`colormap`]. A constant
/// slice maps everything to 0.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !range.is_finite() || range.abs() < f64::EPSILON {
        return vec![0.0; values.len()];
    }
    values.iter().map(|&v| (v - min) / range).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colormap_endpoints() {
        // 0 → blue-dominant, 1 → red-dominant.
        let cold = colormap(0.0);
        let hot = colormap(1.0);
        assert!(cold.b() > cold.r());
        assert!(hot.r() > hot.b());
        // Out-of-range and NaN inputs stay inside the map.
        assert_eq!(colormap(-3.0), cold);
        assert_eq!(colormap(2.0), hot);
        assert_eq!(colormap(f64::NAN), cold);
    }

    #[test]
    fn normalize_handles_constant_input() {
        assert_eq!(normalize(&[5.0, 5.0, 5.0]), vec![0.0, 0.0, 0.0]);
        assert_eq!(normalize(&[0.0, 5.0, 10.0]), vec![0.0, 0.5, 1.0]);
    }
}
