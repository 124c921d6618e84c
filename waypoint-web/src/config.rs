//! Runtime configuration
//!
//! Read from a `window.WAYPOINT_CONFIG` object set by the hosting page before
//! the module loads, e.g.
//!
//! ```js
//! window.WAYPOINT_CONFIG = {
//!   router: { prefetchMode: "visible", logging: true },
//!   identity: { api_key: "..." },
//! };
//! ```

use wasm_bindgen::JsValue;
use waypoint::Config;

const CONFIG_GLOBAL: &str = "WAYPOINT_CONFIG";

/// Load the page's configuration, falling back to defaults.
pub fn load() -> Config {
    let Some(window) = web_sys::window() else {
        return Config::default();
    };

    let value = match js_sys::Reflect::get(&window, &JsValue::from_str(CONFIG_GLOBAL)) {
        Ok(value) if !value.is_undefined() && !value.is_null() => value,
        _ => {
            tracing::debug!("No {} on window, using defaults", CONFIG_GLOBAL);
            return Config::default();
        }
    };

    let json = match js_sys::JSON::stringify(&value) {
        Ok(json) => String::from(json),
        Err(e) => {
            tracing::warn!("{} is not serializable: {:?}", CONFIG_GLOBAL, e);
            return Config::default();
        }
    };

    parse(&json).unwrap_or_else(|e| {
        tracing::warn!("Invalid {}, using defaults: {}", CONFIG_GLOBAL, e);
        Config::default()
    })
}

/// Parse a JSON configuration object
pub fn parse(json: &str) -> Result<Config, serde_json::Error> {
    serde_json::from_str(json)
}
