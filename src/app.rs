use eframe::egui;

use crate::state::AppState;
use crate::ui::{heatmap, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct BeamDiagApp {
    pub state: AppState,
}

impl BeamDiagApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for BeamDiagApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: status line ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Beam diagnostics");
                if let Some(msg) = &self.state.status_message {
                    ui.separator();
                    ui.label(msg);
                }
            });
        });

        // ---- Bottom panel: projected emittance over time ----
        egui::TopBottomPanel::bottom("emittance_panel")
            .resizable(true)
            .default_height(300.0)
            .show(ctx, |ui| {
                plot::emittance_plot(ui, &self.state);
            });

        // ---- Central panel: energy-spread heatmap ----
        egui::CentralPanel::default().show(ctx, |ui| {
            heatmap::spread_heatmap(ui, &mut self.state);
        });
    }
}
