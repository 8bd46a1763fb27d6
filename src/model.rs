/// Tab model collaborators and the tab/element association table
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::CacheError;
use crate::tab_data::{TabId, TabRecord, WindowId};

/// The sidebar's in-memory tab and window objects
pub trait TabStore<N> {
    type Handle: Clone;

    fn init_window(&mut self, window_id: WindowId) -> Result<(), CacheError>;

    /// Look up the model object for a tab, creating it from the record if
    /// needed. Must not run any tab initialization observers.
    fn tab_handle(&mut self, record: &TabRecord) -> Result<Self::Handle, CacheError>;

    /// Tell the tab object which element renders it
    fn bind_element(&mut self, handle: &Self::Handle, element: &N) -> Result<(), CacheError>;

    /// Run tab initialization; `existing` marks tabs restored rather than opened
    fn init_tab(&mut self, handle: &Self::Handle, record: &TabRecord, existing: bool) -> Result<(), CacheError>;
}

/// Pushes tab state onto rendered elements
pub trait StateApplier<N> {
    /// Incremental update of the visual state flags
    fn apply_visual_state(&mut self, record: &TabRecord, element: &N) -> Result<(), CacheError>;

    fn apply_collapse_expand_state(&mut self, record: &TabRecord, element: &N) -> Result<(), CacheError>;

    /// Recompute every piece of state from scratch
    fn force_state_resync(&mut self, record: &TabRecord, element: &N) -> Result<(), CacheError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding<H, N> {
    pub handle: H,
    pub element: N,
}

/// Maps tab ids to their model handle and rendered element.
///
/// Cloning shares the table. The element is owned by the document and the
/// handle by the tab store; the table only keeps them associated.
#[derive(Debug)]
pub struct BindingTable<H, N> {
    entries: Rc<RefCell<HashMap<TabId, Binding<H, N>>>>,
}

impl<H, N> Clone for BindingTable<H, N> {
    fn clone(&self) -> Self {
        BindingTable {
            entries: Rc::clone(&self.entries),
        }
    }
}

impl<H, N> Default for BindingTable<H, N> {
    fn default() -> Self {
        BindingTable {
            entries: Rc::new(RefCell::new(HashMap::new())),
        }
    }
}

impl<H: Clone, N: Clone + PartialEq> BindingTable<H, N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a tab with its handle and element, replacing any previous binding
    pub fn bind(&self, tab_id: TabId, handle: H, element: N) -> Option<Binding<H, N>> {
        self.entries
            .borrow_mut()
            .insert(tab_id, Binding { handle, element })
    }

    pub fn release(&self, tab_id: TabId) -> Option<Binding<H, N>> {
        self.entries.borrow_mut().remove(&tab_id)
    }

    pub fn element(&self, tab_id: TabId) -> Option<N> {
        self.entries
            .borrow()
            .get(&tab_id)
            .map(|binding| binding.element.clone())
    }

    pub fn handle(&self, tab_id: TabId) -> Option<H> {
        self.entries
            .borrow()
            .get(&tab_id)
            .map(|binding| binding.handle.clone())
    }

    pub fn tab_for_element(&self, element: &N) -> Option<TabId> {
        self.entries
            .borrow()
            .iter()
            .find(|(_, binding)| &binding.element == element)
            .map(|(&tab_id, _)| tab_id)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
