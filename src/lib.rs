/// Tab Tree Sidebar - cached tab tree restoration for the sidebar panel
/// Built with Rust + WASM + Yew

pub mod tab_data;
pub mod error;
pub mod config;
pub mod markup;
pub mod signature;
pub mod diagnostics;
pub mod dom;
pub mod model;
pub mod scheduler;
pub mod fixup;
pub mod restore;
pub mod bridge;
pub mod ui;

#[cfg(test)]
mod testing;

use wasm_bindgen::prelude::*;
use yew::Callback;

use crate::bridge::{RestoreRequest, to_js_error};
use crate::config::CacheConfig;
use crate::signature::Signature;
use crate::tab_data::TabRecord;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// JS numbers arrive as `i32`; counts of zero or less mean "nothing to skip"
fn clamp_count(count: i32) -> usize {
    count.max(0) as usize
}

fn tabs_from_js(tabs: JsValue) -> Result<Vec<TabRecord>, JsValue> {
    serde_wasm_bindgen::from_value(tabs)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse tabs: {:?}", e)))
}

#[wasm_bindgen]
pub fn configure(config: JsValue) -> Result<(), JsValue> {
    let config = CacheConfig::from_js(config).map_err(to_js_error)?;
    if config.debug {
        log::set_max_level(log::LevelFilter::Debug);
    }
    bridge::set_config(config);
    Ok(())
}

// Signature helpers used when writing and validating the cache
#[wasm_bindgen]
pub fn tabs_signature(tabs: JsValue) -> Result<String, JsValue> {
    let tabs = tabs_from_js(tabs)?;
    Ok(signature::derive_signature(&tabs).to_string())
}

#[wasm_bindgen]
pub fn cache_signature(markup: &str) -> String {
    signature::signature_from_markup(markup).to_string()
}

#[wasm_bindgen]
pub fn trim_cache(markup: &str, ignore_count: i32) -> String {
    markup::trim_markup(markup, clamp_count(ignore_count))
}

#[wasm_bindgen]
pub fn trim_cache_signature(signature: &str, ignore_count: i32) -> String {
    signature::trim_signature(&Signature::from(signature), clamp_count(ignore_count)).to_string()
}

#[wasm_bindgen]
pub fn cache_signatures_match(cached: &str, actual: &str) -> bool {
    signature::signatures_compatible(&Signature::from(cached), &Signature::from(actual))
}

#[wasm_bindgen]
pub fn serialize_window(window_id: f64, tabs: JsValue) -> Result<String, JsValue> {
    let tabs = tabs_from_js(tabs)?;
    Ok(markup::serialize_tabs(window_id as i64, &tabs))
}

/// Returns `null` when the cache cannot be used for `tabs`
#[wasm_bindgen]
pub fn plan_cache_restoration(markup: &str, tabs: JsValue, already_present: i32) -> Result<JsValue, JsValue> {
    let tabs = tabs_from_js(tabs)?;
    match signature::plan_restoration(markup, &tabs, clamp_count(already_present)) {
        Some(plan) => serde_wasm_bindgen::to_value(&plan)
            .map_err(|e| JsValue::from_str(&format!("Failed to serialize plan: {:?}", e))),
        None => Ok(JsValue::NULL),
    }
}

#[wasm_bindgen]
pub fn debug_render_cache(markup: &str) -> String {
    diagnostics::render_for_debug_log(markup)
}

#[wasm_bindgen]
pub fn tab_element(tab_id: f64) -> Option<web_sys::Element> {
    bridge::bound_element(tab_id as i64)
}

/// Restore a window from its cache; resolves to the restored tab elements
#[wasm_bindgen]
pub async fn restore_tabs_from_cache(
    request: JsValue,
    insertion_point: Option<web_sys::Element>,
    progress: js_sys::Function,
) -> Result<js_sys::Array, JsValue> {
    let request = RestoreRequest::from_js(request)?;
    let elements = bridge::restore_in_page(request, insertion_point, &progress)
        .await
        .map_err(to_js_error)?;
    Ok(elements.into_iter().collect())
}

// Start the Yew blocking screen and restore behind it
#[wasm_bindgen]
pub fn start_sidebar_restore(
    request: JsValue,
    root: web_sys::Element,
    on_finished: Option<js_sys::Function>,
) -> Result<(), JsValue> {
    let request = RestoreRequest::from_js(request)?;
    let on_finished = Callback::from(move |count: usize| {
        if let Some(callback) = &on_finished {
            if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from(count as u32)) {
                log::warn!("on_finished callback failed: {:?}", e);
            }
        }
    });

    yew::Renderer::<ui::blocking::SidebarRestore>::with_root_and_props(
        root,
        ui::blocking::SidebarRestoreProps { request, on_finished },
    )
    .render();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_markup() -> String {
        let tabs = vec![
            TabRecord::new(1, 1),
            TabRecord::new(2, 1).with_parent(1),
            TabRecord::new(3, 1),
        ];
        markup::serialize_tabs(1, &tabs)
    }

    #[test]
    fn test_trim_cache_negative_count_is_noop() {
        let markup = window_markup();

        assert_eq!(trim_cache(&markup, -1), markup);
        assert_eq!(trim_cache(&markup, i32::MIN), markup);
        assert_eq!(markup::count_items(&trim_cache(&markup, 0)), 3);
        assert_eq!(markup::count_items(&trim_cache(&markup, 2)), 1);
    }

    #[test]
    fn test_trim_cache_signature_negative_count_is_noop() {
        let signature = "-1,default,false,false\n0,default,false,false";

        assert_eq!(trim_cache_signature(signature, -5), signature);
        assert_eq!(trim_cache_signature(signature, 1), "0,default,false,false");
    }

    #[test]
    fn test_cache_signature_matches_tabs() {
        let markup = window_markup();

        let signature = cache_signature(&markup);

        assert_eq!(signature, "-1,default,false,false\n0,default,false,false\n-1,default,false,false");
        assert!(cache_signatures_match(&signature, &signature));
        assert_eq!(trim_cache_signature(&signature, -1), signature);
        assert_eq!(trim_cache_signature(&signature, 1), "0,default,false,false\n-1,default,false,false");
    }
}
