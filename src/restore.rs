/// Restoring a window's tab elements from the cached markup
///
/// Two modes, selected by `offset`:
///
/// - `offset == 0`: the whole window is rebuilt from the cache. Any existing
///   container for the window is discarded and the parsed container is
///   inserted at the insertion point (end of the tabbar by default).
/// - `offset > 0`: the first `offset` tabs are already rendered. Only the
///   elements of the remaining tabs are replaced with the cached items.
///
/// A cache that does not line up with the tab records is not an error:
/// whatever was inserted is removed again and an empty list is returned so
/// that the caller rebuilds the window without the cache.
///
/// While the fixup pass runs, the container is detached from the document.
/// Code querying the document for this window in the meantime will not find
/// its tabs until restoration finishes.
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::config::CacheConfig;
use crate::diagnostics::render_for_debug_log;
use crate::dom::{DomHost, window_dom_id};
use crate::error::CacheError;
use crate::fixup::{FixupPass, FixupTargets, run_fixup};
use crate::markup::{self, WINDOW_ID_ATTR};
use crate::model::{BindingTable, StateApplier, TabStore};
use crate::scheduler::{FrameScheduler, ProgressSink};
use crate::tab_data::{TabRecord, WindowId};

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreParams<N> {
    pub window_id: WindowId,
    /// Authoritative tabs of the window, in order
    pub tabs: Vec<TabRecord>,
    pub cache_markup: String,
    /// Number of tabs already rendered at the head of the window
    pub offset: usize,
    /// Node to insert a fully restored container before
    pub insertion_point: Option<N>,
    /// The cache may be stale: resync every tab's state from scratch
    pub mark_stale: bool,
}

impl<N> RestoreParams<N> {
    pub fn new(window_id: WindowId, tabs: Vec<TabRecord>, cache_markup: impl Into<String>) -> Self {
        RestoreParams {
            window_id,
            tabs,
            cache_markup: cache_markup.into(),
            offset: 0,
            insertion_point: None,
            mark_stale: false,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn insert_before(mut self, node: N) -> Self {
        self.insertion_point = Some(node);
        self
    }

    pub fn stale(mut self) -> Self {
        self.mark_stale = true;
        self
    }

    /// Tabs whose elements this restoration produces
    pub fn restored_tabs(&self) -> &[TabRecord] {
        self.tabs.get(self.offset..).unwrap_or(&[])
    }
}

/// Windows with a restoration in progress
#[derive(Debug, Clone, Default)]
pub struct InFlightWindows(Rc<RefCell<HashSet<WindowId>>>);

impl InFlightWindows {
    pub fn try_acquire(&self, window_id: WindowId) -> Option<InFlightToken> {
        if self.0.borrow_mut().insert(window_id) {
            Some(InFlightToken {
                windows: self.clone(),
                window_id,
            })
        } else {
            None
        }
    }

    pub fn is_running(&self, window_id: WindowId) -> bool {
        self.0.borrow().contains(&window_id)
    }
}

/// Marks a window as being restored until dropped
#[derive(Debug)]
pub struct InFlightToken {
    windows: InFlightWindows,
    window_id: WindowId,
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.windows.0.borrow_mut().remove(&self.window_id);
    }
}

struct Inserted<N> {
    container: N,
    elements: Vec<N>,
}

pub struct Restorer<D, S, A, F>
where
    D: DomHost,
    S: TabStore<D::Node>,
{
    pub dom: D,
    pub store: S,
    pub applier: A,
    pub scheduler: F,
    bindings: BindingTable<S::Handle, D::Node>,
    in_flight: InFlightWindows,
    config: CacheConfig,
}

impl<D, S, A, F> Restorer<D, S, A, F>
where
    D: DomHost,
    S: TabStore<D::Node>,
    A: StateApplier<D::Node>,
    F: FrameScheduler,
{
    pub fn new(dom: D, store: S, applier: A, scheduler: F, config: CacheConfig) -> Self {
        Self::with_shared(dom, store, applier, scheduler, config, BindingTable::default(), InFlightWindows::default())
    }

    /// A restorer sharing its binding table and in-flight set with others
    pub fn with_shared(
        dom: D,
        store: S,
        applier: A,
        scheduler: F,
        config: CacheConfig,
        bindings: BindingTable<S::Handle, D::Node>,
        in_flight: InFlightWindows,
    ) -> Self {
        Restorer {
            dom,
            store,
            applier,
            scheduler,
            bindings,
            in_flight,
            config,
        }
    }

    pub fn bindings(&self) -> &BindingTable<S::Handle, D::Node> {
        &self.bindings
    }

    pub fn in_flight(&self) -> &InFlightWindows {
        &self.in_flight
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Restore tab elements from the cache and bind them to their tabs.
    ///
    /// Returns the restored elements, or an empty list when the cache is
    /// unusable. `StructuralCorruption` means the document was already
    /// modified and the window must be rebuilt.
    pub async fn restore_from_cache<P: ProgressSink>(
        &mut self,
        params: RestoreParams<D::Node>,
        progress: &P,
    ) -> Result<Vec<D::Node>, CacheError> {
        let window_id = params.window_id;
        let _running = self
            .in_flight
            .try_acquire(window_id)
            .ok_or(CacheError::RestoreInProgress(window_id))?;

        if self.config.debug {
            debug!(
                "Restoring window {} from cache (offset {}):\n{}",
                window_id,
                params.offset,
                render_for_debug_log(&params.cache_markup)
            );
        }

        let inserted = if params.offset > 0 {
            self.insert_tail(&params)?
        } else {
            self.insert_full(&params)?
        };
        let Some(Inserted { container, elements }) = inserted else {
            return Ok(Vec::new());
        };

        let records = params.restored_tabs();
        if elements.len() != records.len() {
            warn!(
                "Cache for window {} holds {} tabs but {} were expected, discarding it",
                window_id,
                elements.len(),
                records.len()
            );
            self.dom.detach(&container);
            return Ok(Vec::new());
        }

        let range = self.config.progress_range();
        progress.set_progress(range.start);

        // Rewrite the restored elements off-document, then put the container back
        let parent = self.dom.parent(&container);
        let next = self.dom.next_sibling(&container);
        self.dom.detach(&container);

        let mut pass = FixupPass::new(window_id, elements.clone(), records, params.mark_stale)?
            .with_progress_range(range)
            .with_yield_interval(self.config.yield_interval_ms);
        let mut targets = FixupTargets {
            dom: &mut self.dom,
            store: &mut self.store,
            applier: &mut self.applier,
            bindings: &self.bindings,
        };
        run_fixup(&mut pass, &mut targets, &self.scheduler, progress).await?;

        if let Some(parent) = parent {
            let reference = next.filter(|node| self.dom.parent(node).as_ref() == Some(&parent));
            self.dom.insert_before(&parent, &container, reference.as_ref())?;
        }

        info!("Restored {} tabs of window {} from cache", elements.len(), window_id);
        Ok(elements)
    }

    fn insert_full(&mut self, params: &RestoreParams<D::Node>) -> Result<Option<Inserted<D::Node>>, CacheError> {
        let window_id = params.window_id;

        if let Some(previous) = self.dom.window_container(window_id) {
            debug!("Discarding the existing container of window {}", window_id);
            let old_elements = self.dom.children(&previous);
            self.release_bindings(&old_elements);
            self.dom.detach(&previous);
        }

        let fragment = self.dom.parse_fragment(&params.cache_markup)?;
        let Some(container) = fragment.into_iter().next() else {
            warn!("Cache for window {} has no container element", window_id);
            return Ok(None);
        };
        self.dom.set_attribute(&container, "id", &window_dom_id(window_id))?;
        self.dom.set_attribute(&container, WINDOW_ID_ATTR, &window_id.to_string())?;

        let (parent, reference) = match &params.insertion_point {
            Some(point) => match self.dom.parent(point) {
                Some(parent) => (parent, Some(point.clone())),
                None => (self.dom.tabbar(), None),
            },
            None => (self.dom.tabbar(), None),
        };
        self.dom.insert_before(&parent, &container, reference.as_ref())?;
        self.store.init_window(window_id)?;

        let elements = self.dom.children(&container);
        Ok(Some(Inserted { container, elements }))
    }

    fn insert_tail(&mut self, params: &RestoreParams<D::Node>) -> Result<Option<Inserted<D::Node>>, CacheError> {
        let window_id = params.window_id;

        let Some(container) = self.dom.window_container(window_id) else {
            warn!("Window {} has no container to restore tabs into", window_id);
            return Ok(None);
        };
        if self.dom.children(&container).len() < params.offset {
            warn!("Window {} has fewer than {} rendered tabs", window_id, params.offset);
            return Ok(None);
        }

        let replaced = params.restored_tabs();
        let (Some(first_tab), Some(last_tab)) = (replaced.first(), replaced.last()) else {
            warn!("No tabs of window {} follow offset {}", window_id, params.offset);
            return Ok(None);
        };
        let (Some(first), Some(last)) = (self.dom.tab_element(first_tab.id), self.dom.tab_element(last_tab.id)) else {
            warn!(
                "Tab {} or {} of window {} is not rendered, cannot restore from cache",
                first_tab.id, last_tab.id, window_id
            );
            return Ok(None);
        };
        let Some(range) = self.sibling_range(&container, &first, &last) else {
            warn!(
                "Tabs {} and {} do not delimit a range in window {}",
                first_tab.id, last_tab.id, window_id
            );
            return Ok(None);
        };

        let reference = self.dom.next_sibling(&last);
        let fresh = self.dom.parse_fragment(markup::strip_container(&params.cache_markup))?;

        self.release_bindings(&range);
        for node in &range {
            self.dom.detach(node);
        }
        for node in &fresh {
            self.dom.insert_before(&container, node, reference.as_ref())?;
        }
        let elements = fresh
            .into_iter()
            .filter(|node| self.dom.tag_name(node) == markup::ITEM_TAG)
            .collect();

        Ok(Some(Inserted { container, elements }))
    }

    /// Siblings from `first` through `last`, both children of `container`
    fn sibling_range(&self, container: &D::Node, first: &D::Node, last: &D::Node) -> Option<Vec<D::Node>> {
        if self.dom.parent(first).as_ref() != Some(container) {
            return None;
        }

        let mut range = Vec::new();
        let mut cursor = Some(first.clone());
        while let Some(node) = cursor {
            cursor = self.dom.next_sibling(&node);
            let at_end = node == *last;
            range.push(node);
            if at_end {
                return Some(range);
            }
        }
        None
    }

    /// Drop bindings that still point at elements about to be removed
    fn release_bindings(&self, elements: &[D::Node]) {
        for element in elements {
            if let Some(tab_id) = self.dom.bound_tab_id(element) {
                if self.bindings.element(tab_id).as_ref() == Some(element) {
                    self.bindings.release(tab_id);
                }
            }
        }
    }
}
