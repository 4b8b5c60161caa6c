//! Copilot App: WASM entry point.
//!
//! This crate is the composition root (DI wiring layer).
//! It assembles the platform adapters and hands them to the egui UI.

mod app;


#[cfg(target_arch = "wasm32")]
mod web {
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;

    use crate::app::CopilotApp;

    const CANVAS_ID: &str = "copilot_canvas";

    /// Called from index.html
    #[wasm_bindgen(start)]
    pub fn main() -> Result<(), JsValue> {
        wasm_logger::init(wasm_logger::Config::default());
        log::info!("Jetson Copilot starting...");

        let canvas = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(CANVAS_ID))
            .ok_or_else(|| JsValue::from_str(&format!("No element with id '{}'", CANVAS_ID)))?
            .dyn_into::<web_sys::HtmlCanvasElement>()
            .map_err(|_| JsValue::from_str("Element is not a canvas"))?;

        let web_options = eframe::WebOptions::default();
        wasm_bindgen_futures::spawn_local(async move {
            let started = eframe::WebRunner::new()
                .start(
                    canvas,
                    web_options,
                    Box::new(|cc| Ok(Box::new(CopilotApp::new(cc)))),
                )
                .await;
            if let Err(e) = started {
                log::error!("Failed to start eframe: {:?}", e);
            }
        });
        Ok(())
    }
}
