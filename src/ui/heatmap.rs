use eframe::egui::{self, TextureOptions, Ui};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Energy-spread heatmap (central panel)
// ---------------------------------------------------------------------------

/// Render the per-slice × timestep energy-spread image, one pixel per slice
/// per timestep, stretched to the available panel.
pub fn spread_heatmap(ui: &mut Ui, state: &mut AppState) {
    // Upload the precomputed image once; the texture handle keeps it alive.
    if state.heatmap_texture.is_none() {
        if let Some(image) = state.spread_image.take() {
            state.heatmap_texture =
                Some(ui.ctx().load_texture("energy_spread", image, TextureOptions::NEAREST));
        }
    }

    match &state.heatmap_texture {
        Some(texture) => {
            ui.label("energy_spread per slice (x) and timestep (y)");
            ui.add(
                egui::Image::new(texture)
                    .fit_to_exact_size(ui.available_size())
                    .maintain_aspect_ratio(false),
            );
        }
        None => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.label("No energy-spread data");
            });
        }
    }
}
