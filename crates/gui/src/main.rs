mod app;
mod viewport;

// Re-export library modules so that `crate::state` resolves to the lib
// crate types everywhere in the binary.
pub use twinview_gui_lib::state;

use app::TwinViewApp;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "twinview_gui=info,twinview_gui_lib=info".into()),
        )
        .init();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("TwinView: linked mesh viewports")
            .with_inner_size([1400.0, 800.0])
            .with_min_inner_size([800.0, 450.0]),
        ..Default::default()
    };

    if let Err(e) = eframe::run_native(
        "twinview-gui",
        native_options,
        Box::new(|cc| Ok(Box::new(TwinViewApp::new(cc)))),
    ) {
        tracing::error!("Failed to start application: {e}");
    }
}
