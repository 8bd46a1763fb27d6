/// Recording collaborators shared by the unit tests
use std::cell::{Cell, RefCell};

use crate::dom::DomHost;
use crate::dom::memory::{MemoryDom, NodeId};
use crate::error::CacheError;
use crate::markup::TAB_ID_ATTR;
use crate::model::{BindingTable, StateApplier, TabStore};
use crate::scheduler::{FrameScheduler, ProgressSink};
use crate::tab_data::{TabId, TabRecord, WindowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Handle(TabId),
    BindElement(TabId),
    Init(TabId),
}

#[derive(Default)]
pub struct RecordingStore {
    pub windows: Vec<WindowId>,
    pub initialized: Vec<(TabId, bool)>,
    pub events: Vec<StoreEvent>,
    /// Whether each tab was already bound to its element when initialized
    pub bound_at_init: Vec<bool>,
    pub bindings: Option<BindingTable<TabId, NodeId>>,
    /// `init_tab` fails for this tab
    pub fail_on: Option<TabId>,
}

impl<N> TabStore<N> for RecordingStore {
    type Handle = TabId;

    fn init_window(&mut self, window_id: WindowId) -> Result<(), CacheError> {
        self.windows.push(window_id);
        Ok(())
    }

    fn tab_handle(&mut self, record: &TabRecord) -> Result<TabId, CacheError> {
        self.events.push(StoreEvent::Handle(record.id));
        Ok(record.id)
    }

    fn bind_element(&mut self, handle: &TabId, _element: &N) -> Result<(), CacheError> {
        self.events.push(StoreEvent::BindElement(*handle));
        Ok(())
    }

    fn init_tab(&mut self, handle: &TabId, record: &TabRecord, existing: bool) -> Result<(), CacheError> {
        if self.fail_on == Some(record.id) {
            return Err(CacheError::Dom(format!("initTab failed for tab {}", record.id)));
        }
        self.events.push(StoreEvent::Init(*handle));
        self.initialized.push((*handle, existing));
        if let Some(bindings) = &self.bindings {
            self.bound_at_init.push(bindings.element(record.id).is_some());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateCall {
    Visual,
    CollapseExpand,
    Resync,
}

#[derive(Default)]
pub struct RecordingApplier {
    pub calls: Vec<(StateCall, TabId)>,
    /// Every call for this tab fails
    pub fail_on: Option<TabId>,
}

impl RecordingApplier {
    pub fn count(&self, kind: StateCall) -> usize {
        self.calls.iter().filter(|(call, _)| *call == kind).count()
    }

    fn record(&mut self, kind: StateCall, record: &TabRecord) -> Result<(), CacheError> {
        if self.fail_on == Some(record.id) {
            return Err(CacheError::Dom(format!("state update failed for tab {}", record.id)));
        }
        self.calls.push((kind, record.id));
        Ok(())
    }
}

impl<N> StateApplier<N> for RecordingApplier {
    fn apply_visual_state(&mut self, record: &TabRecord, _element: &N) -> Result<(), CacheError> {
        self.record(StateCall::Visual, record)
    }

    fn apply_collapse_expand_state(&mut self, record: &TabRecord, _element: &N) -> Result<(), CacheError> {
        self.record(StateCall::CollapseExpand, record)
    }

    fn force_state_resync(&mut self, record: &TabRecord, _element: &N) -> Result<(), CacheError> {
        self.record(StateCall::Resync, record)
    }
}

/// `MemoryDom` that notes, for every tab id stamp, whether the stamped
/// element was attached to the document at that moment
pub struct ObservedDom {
    pub inner: MemoryDom,
    pub connected_at_stamp: Vec<bool>,
}

impl ObservedDom {
    pub fn new(inner: MemoryDom) -> ObservedDom {
        ObservedDom {
            inner,
            connected_at_stamp: Vec::new(),
        }
    }
}

impl DomHost for ObservedDom {
    type Node = NodeId;

    fn window_container(&self, window_id: WindowId) -> Option<NodeId> {
        self.inner.window_container(window_id)
    }

    fn tab_element(&self, tab_id: TabId) -> Option<NodeId> {
        self.inner.tab_element(tab_id)
    }

    fn tabbar(&self) -> NodeId {
        self.inner.tabbar()
    }

    fn parse_fragment(&mut self, markup: &str) -> Result<Vec<NodeId>, CacheError> {
        self.inner.parse_fragment(markup)
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.inner.children(node)
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.inner.parent(node)
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        self.inner.next_sibling(node)
    }

    fn insert_before(&mut self, parent: &NodeId, node: &NodeId, reference: Option<&NodeId>) -> Result<(), CacheError> {
        self.inner.insert_before(parent, node, reference)
    }

    fn detach(&mut self, node: &NodeId) {
        self.inner.detach(node);
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<(), CacheError> {
        if name == TAB_ID_ATTR {
            self.connected_at_stamp.push(self.inner.is_connected(*node));
        }
        self.inner.set_attribute(node, name, value)
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) -> Result<(), CacheError> {
        self.inner.remove_attribute(node, name)
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.inner.attribute(node, name)
    }

    fn tag_name(&self, node: &NodeId) -> String {
        self.inner.tag_name(node)
    }
}

/// Clock that advances `tick_ms` on every reading; frames complete immediately
pub struct ManualScheduler {
    now: Cell<f64>,
    tick_ms: f64,
    pub frames: Cell<usize>,
}

impl ManualScheduler {
    pub fn new(tick_ms: f64) -> ManualScheduler {
        ManualScheduler {
            now: Cell::new(0.0),
            tick_ms,
            frames: Cell::new(0),
        }
    }
}

impl FrameScheduler for ManualScheduler {
    fn now_ms(&self) -> f64 {
        let now = self.now.get();
        self.now.set(now + self.tick_ms);
        now
    }

    async fn next_frame(&self) {
        self.frames.set(self.frames.get() + 1);
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    pub values: RefCell<Vec<u8>>,
}

impl ProgressSink for RecordingProgress {
    fn set_progress(&self, percent: u8) {
        self.values.borrow_mut().push(percent);
    }
}
