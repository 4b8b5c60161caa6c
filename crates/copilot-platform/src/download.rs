//! Save text to the user's machine through a temporary object URL.

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};

use copilot_types::{CopilotError, Result};

pub const TRANSCRIPT_FILENAME: &str = "chat_transcript.txt";

fn js_err(e: JsValue) -> CopilotError {
    CopilotError::JsInterop(format!("{:?}", e))
}

/// Offer `contents` as a plain-text download named `filename`.
pub fn download_text(filename: &str, contents: &str) -> Result<()> {
    let parts = js_sys::Array::of1(&JsValue::from_str(contents));
    let props = BlobPropertyBag::new();
    props.set_type("text/plain;charset=utf-8");
    let blob = Blob::new_with_str_sequence_and_options(&parts, &props).map_err(js_err)?;
    let url = Url::create_object_url_with_blob(&blob).map_err(js_err)?;

    let anchor: HtmlAnchorElement = gloo_utils::document()
        .create_element("a")
        .map_err(js_err)?
        .dyn_into()
        .map_err(|_| CopilotError::JsInterop("created element is not an anchor".to_string()))?;
    anchor.set_href(&url);
    anchor.set_download(filename);
    anchor.click();

    Url::revoke_object_url(&url).map_err(js_err)?;
    log::info!("downloaded {} ({} bytes)", filename, contents.len());
    Ok(())
}
