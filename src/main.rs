use beamdiag::app::BeamDiagApp;
use beamdiag::state::AppState;
use eframe::egui;

/// Demonstration input: the per-rank in-situ output of a single beam.
const DEMO_PATTERN: &str = "diags/insitu/reduced_beam.*.txt";

fn main() -> eframe::Result {
    env_logger::init();

    let state = AppState::load(DEMO_PATTERN);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 900.0])
            .with_min_inner_size([500.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Beam diagnostics",
        options,
        Box::new(|_cc| Ok(Box::new(BeamDiagApp::new(state)))),
    )
}
