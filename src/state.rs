use eframe::egui::{ColorImage, TextureHandle};
use log::{info, warn};

use crate::analysis;
use crate::color::{colormap, normalize};
use crate::data::loader::read_file;
use crate::data::model::{DiagTable, FieldLookup};

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

/// The full viewer state, independent of rendering.
pub struct AppState {
    /// Loaded diagnostic table (None when loading failed).
    pub table: Option<DiagTable>,

    /// Projected emittance_x against time, precomputed for the line plot.
    pub emittance_series: Vec<[f64; 2]>,

    /// Per-slice × timestep energy-spread image, consumed on first upload.
    pub spread_image: Option<ColorImage>,

    /// GPU texture for the heatmap, created lazily on first frame.
    pub heatmap_texture: Option<TextureHandle>,

    /// Status / error message shown in the top bar.
    pub status_message: Option<String>,
}

impl AppState {
    /// Load a diagnostic set and precompute both plot inputs. Failures end
    /// up in `status_message` instead of aborting the viewer.
    pub fn load(pattern: &str) -> Self {
        let mut state = AppState {
            table: None,
            emittance_series: Vec::new(),
            spread_image: None,
            heatmap_texture: None,
            status_message: None,
        };

        let table = match read_file(pattern) {
            Ok(table) => table,
            Err(err) => {
                warn!("failed to load '{pattern}': {err}");
                state.status_message = Some(format!("Failed to load '{pattern}': {err}"));
                return state;
            }
        };
        if table.is_empty() {
            state.status_message = Some(format!("No timesteps found for '{pattern}'"));
            return state;
        }
        info!(
            "loaded {} timesteps from '{pattern}'",
            table.n_rows()
        );

        if let Err(err) = state.compute_plots(&table) {
            state.status_message = Some(format!("Analysis failed: {err}"));
        } else {
            state.status_message = Some(format!("{pattern}: {} timesteps", table.n_rows()));
        }
        state.table = Some(table);
        state
    }

    fn compute_plots(&mut self, table: &DiagTable) -> Result<(), crate::data::model::TableError> {
        // Line plot: projected emittance from the slice-averaged group.
        let time = table.field("time")?;
        let projected = analysis::emittance_x(&table.average())?;
        self.emittance_series = time
            .values()
            .iter()
            .zip(projected.values())
            .map(|(&t, &e)| [t, e])
            .collect();

        // Heatmap: per-slice energy spread, one pixel row per timestep.
        let spread = analysis::energy_spread(table)?;
        let width = spread.width();
        let height = spread.rows();
        let pixels = normalize(spread.values())
            .into_iter()
            .map(colormap)
            .collect();
        self.spread_image = Some(ColorImage {
            size: [width, height],
            pixels,
        });
        Ok(())
    }
}
