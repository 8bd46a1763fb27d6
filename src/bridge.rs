/// Bridge to the sidebar page: tab model callbacks and the restoration entry point
use std::cell::RefCell;

use serde::Deserialize;
use wasm_bindgen::prelude::*;
use web_sys::Element;

use crate::config::CacheConfig;
use crate::dom::web::WebDom;
use crate::error::CacheError;
use crate::model::{BindingTable, StateApplier, TabStore};
use crate::restore::{InFlightWindows, RestoreParams, Restorer};
use crate::scheduler::{AnimationFrameScheduler, ProgressSink};
use crate::tab_data::{TabId, TabRecord, WindowId};

// Import JS bridge functions
#[wasm_bindgen(module = "/sidebar.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    fn getTab(record: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    fn initWindow(window_id: f64) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    fn bindElement(tab: &JsValue, element: &Element) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    fn initTab(tab: &JsValue, existing: bool) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    fn applyVisualState(tab: &JsValue, element: &Element) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    fn applyCollapseExpandState(tab: &JsValue, element: &Element) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    fn forceStateResync(tab: &JsValue, element: &Element) -> Result<(), JsValue>;
}

thread_local! {
    static BINDINGS: BindingTable<JsValue, Element> = BindingTable::default();
    static IN_FLIGHT: InFlightWindows = InFlightWindows::default();
    static CONFIG: RefCell<CacheConfig> = RefCell::new(CacheConfig::default());
}

fn js_error(call: &str, e: JsValue) -> CacheError {
    CacheError::Dom(format!("{} failed: {:?}", call, e))
}

/// Tab objects owned by the sidebar's JavaScript tab model
pub struct JsTabStore;

impl TabStore<Element> for JsTabStore {
    type Handle = JsValue;

    fn init_window(&mut self, window_id: WindowId) -> Result<(), CacheError> {
        initWindow(window_id as f64).map_err(|e| js_error("initWindow", e))
    }

    fn tab_handle(&mut self, record: &TabRecord) -> Result<JsValue, CacheError> {
        let value = serde_wasm_bindgen::to_value(record)
            .map_err(|e| CacheError::Dom(format!("Failed to serialize tab {}: {:?}", record.id, e)))?;
        getTab(value).map_err(|e| js_error("getTab", e))
    }

    fn bind_element(&mut self, handle: &JsValue, element: &Element) -> Result<(), CacheError> {
        bindElement(handle, element).map_err(|e| js_error("bindElement", e))
    }

    fn init_tab(&mut self, handle: &JsValue, _record: &TabRecord, existing: bool) -> Result<(), CacheError> {
        initTab(handle, existing).map_err(|e| js_error("initTab", e))
    }
}

/// Forwards state updates to the sidebar's renderer, addressed by tab object
pub struct JsStateApplier {
    bindings: BindingTable<JsValue, Element>,
}

impl JsStateApplier {
    fn tab(&self, record: &TabRecord) -> Result<JsValue, CacheError> {
        self.bindings
            .handle(record.id)
            .ok_or_else(|| CacheError::Dom(format!("Tab {} is not bound", record.id)))
    }
}

impl StateApplier<Element> for JsStateApplier {
    fn apply_visual_state(&mut self, record: &TabRecord, element: &Element) -> Result<(), CacheError> {
        applyVisualState(&self.tab(record)?, element).map_err(|e| js_error("applyVisualState", e))
    }

    fn apply_collapse_expand_state(&mut self, record: &TabRecord, element: &Element) -> Result<(), CacheError> {
        applyCollapseExpandState(&self.tab(record)?, element).map_err(|e| js_error("applyCollapseExpandState", e))
    }

    fn force_state_resync(&mut self, record: &TabRecord, element: &Element) -> Result<(), CacheError> {
        forceStateResync(&self.tab(record)?, element).map_err(|e| js_error("forceStateResync", e))
    }
}

/// A restoration requested by the sidebar page
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    pub window_id: WindowId,
    pub tabs: Vec<TabRecord>,
    pub cache: String,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub mark_stale: bool,
}

impl RestoreRequest {
    pub fn from_js(value: JsValue) -> Result<RestoreRequest, JsValue> {
        serde_wasm_bindgen::from_value(value)
            .map_err(|e| JsValue::from_str(&format!("Failed to parse restore request: {:?}", e)))
    }

    fn into_params(self, insertion_point: Option<Element>) -> RestoreParams<Element> {
        RestoreParams {
            window_id: self.window_id,
            tabs: self.tabs,
            cache_markup: self.cache,
            offset: self.offset,
            insertion_point,
            mark_stale: self.mark_stale,
        }
    }
}

pub fn to_js_error(e: CacheError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

pub fn current_config() -> CacheConfig {
    CONFIG.with(|config| config.borrow().clone())
}

pub fn set_config(config: CacheConfig) {
    CONFIG.with(|current| *current.borrow_mut() = config);
}

/// Element currently bound to a tab
pub fn bound_element(tab_id: TabId) -> Option<Element> {
    BINDINGS.with(|bindings| bindings.element(tab_id))
}

/// Restore a window of the current page from its cache
pub async fn restore_in_page<P: ProgressSink>(
    request: RestoreRequest,
    insertion_point: Option<Element>,
    progress: &P,
) -> Result<Vec<Element>, CacheError> {
    let dom = WebDom::from_page()?;
    let bindings = BINDINGS.with(|bindings| bindings.clone());
    let in_flight = IN_FLIGHT.with(|in_flight| in_flight.clone());
    let applier = JsStateApplier {
        bindings: bindings.clone(),
    };

    let mut restorer = Restorer::with_shared(
        dom,
        JsTabStore,
        applier,
        AnimationFrameScheduler,
        current_config(),
        bindings,
        in_flight,
    );
    restorer
        .restore_from_cache(request.into_params(insertion_point), progress)
        .await
}
