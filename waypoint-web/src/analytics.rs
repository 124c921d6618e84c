//! Page views for Google Analytics

use wasm_bindgen::{JsCast, JsValue};
use waypoint::lifecycle::{PageView, PageViewReporter};

/// Sends `page_view` events through `window.gtag` when the page loads it
#[derive(Debug, Clone, Copy, Default)]
pub struct GtagPageViews;

impl PageViewReporter for GtagPageViews {
    fn report(&self, view: &PageView) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let gtag = js_sys::Reflect::get(&window, &JsValue::from_str("gtag"))
            .ok()
            .and_then(|value| value.dyn_into::<js_sys::Function>().ok());

        let Some(gtag) = gtag else {
            tracing::debug!(route = %view.route, "Page view (no gtag)");
            return;
        };

        let params = js_sys::Object::new();
        let set = js_sys::Reflect::set(
            &params,
            &JsValue::from_str("page_path"),
            &JsValue::from_str(view.route.as_str()),
        )
        .and_then(|_| {
            js_sys::Reflect::set(
                &params,
                &JsValue::from_str("page_title"),
                &view
                    .title
                    .as_deref()
                    .map(JsValue::from_str)
                    .unwrap_or(JsValue::UNDEFINED),
            )
        })
        .and_then(|_| {
            gtag.call3(
                &JsValue::NULL,
                &JsValue::from_str("event"),
                &JsValue::from_str("page_view"),
                &params,
            )
        });

        if let Err(e) = set {
            tracing::warn!(route = %view.route, "gtag page_view failed: {:?}", e);
        }
    }
}
