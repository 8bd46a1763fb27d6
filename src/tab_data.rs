/// Data structures for the tab tree sidebar
use serde::{Deserialize, Serialize};

/// Browser tab id, stable for the lifetime of the tab
pub type TabId = i64;

/// Browser window id
pub type WindowId = i64;

/// Cookie store of tabs that do not belong to a contextual identity
pub const DEFAULT_COOKIE_STORE_ID: &str = "default";

fn default_cookie_store_id() -> String {
    DEFAULT_COOKIE_STORE_ID.to_string()
}

/// A browser tab as known to the tab model at restoration time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TabRecord {
    pub id: TabId,
    #[serde(default, alias = "openerTabId")]
    pub parent_id: Option<TabId>,
    #[serde(default = "default_cookie_store_id")]
    pub cookie_store_id: String,
    #[serde(default)]
    pub incognito: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub window_id: WindowId,
    /// Whether the subtree below this tab is collapsed in the sidebar
    #[serde(default)]
    pub collapsed: bool,
}

impl TabRecord {
    pub fn new(id: TabId, window_id: WindowId) -> TabRecord {
        TabRecord {
            id,
            parent_id: None,
            cookie_store_id: default_cookie_store_id(),
            incognito: false,
            pinned: false,
            window_id,
            collapsed: false,
        }
    }

    pub fn with_parent(mut self, parent_id: TabId) -> TabRecord {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_cookie_store(mut self, cookie_store_id: &str) -> TabRecord {
        self.cookie_store_id = cookie_store_id.to_string();
        self
    }

    pub fn pinned(mut self) -> TabRecord {
        self.pinned = true;
        self
    }

    pub fn incognito(mut self) -> TabRecord {
        self.incognito = true;
        self
    }

    pub fn collapsed(mut self) -> TabRecord {
        self.collapsed = true;
        self
    }
}
