use eframe::egui::{Color32, Ui};
use egui_plot::{Line, Plot, PlotPoints};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Projected emittance line plot (bottom panel)
// ---------------------------------------------------------------------------

/// Render projected `emittance_x` (slice-averaged) against time.
pub fn emittance_plot(ui: &mut Ui, state: &AppState) {
    if state.emittance_series.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.label("No emittance data");
        });
        return;
    }

    Plot::new("emittance_plot")
        .x_axis_label("time")
        .y_axis_label("projected emittance_x")
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            let points: PlotPoints = state
                .emittance_series
                .iter()
                .map(|&[t, e]| [t, e])
                .collect();

            let line = Line::new(points)
                .name("emittance_x")
                .color(Color32::LIGHT_BLUE)
                .width(1.5);

            plot_ui.line(line);
        });
}
