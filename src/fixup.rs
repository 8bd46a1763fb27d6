/// Post-restoration fixup of elements inserted from the cache
///
/// Runs in two phases over the (element, record) pairs: the first binds every
/// element to its tab and stamps identity attributes, the second re-applies
/// tab state. Both phases share one progress counter out of `2 × n` steps.
/// The pass is a resumable state machine; [`run_fixup`] drives it and hands
/// control back to the host whenever the yield budget is exhausted.
use log::debug;

use crate::dom::{DomHost, tab_dom_id};
use crate::error::CacheError;
use crate::markup::{PARENT_ATTR, TAB_ID_ATTR, WINDOW_ID_ATTR};
use crate::model::{BindingTable, StateApplier, TabStore};
use crate::scheduler::{FrameScheduler, ProgressRange, ProgressSink, YieldBudget};
use crate::tab_data::{TabRecord, WindowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixupPhase {
    Bind,
    Apply,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixupTick {
    /// Budget exhausted; resume after the host renders a frame
    Yield { progress: u8 },
    Finished,
}

/// What the pass mutates
pub struct FixupTargets<'a, D: DomHost, S: TabStore<D::Node>, A> {
    pub dom: &'a mut D,
    pub store: &'a mut S,
    pub applier: &'a mut A,
    pub bindings: &'a BindingTable<S::Handle, D::Node>,
}

pub struct FixupPass<N> {
    window_id: WindowId,
    pairs: Vec<(N, TabRecord)>,
    dirty: bool,
    phase: FixupPhase,
    index: usize,
    done: usize,
    range: ProgressRange,
    budget: YieldBudget,
}

impl<N: Clone + PartialEq> FixupPass<N> {
    /// Pair elements with records one to one. `dirty` forces a full state
    /// resync of every tab instead of an incremental update.
    pub fn new(window_id: WindowId, elements: Vec<N>, records: &[TabRecord], dirty: bool) -> Result<Self, CacheError> {
        if elements.len() != records.len() {
            return Err(CacheError::StructuralCorruption {
                elements: elements.len(),
                records: records.len(),
            });
        }

        Ok(FixupPass {
            window_id,
            pairs: elements.into_iter().zip(records.iter().cloned()).collect(),
            dirty,
            phase: FixupPhase::Bind,
            index: 0,
            done: 0,
            range: ProgressRange::new(33, 100),
            budget: YieldBudget::new(16.0, 0.0),
        })
    }

    pub fn with_progress_range(mut self, range: ProgressRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_yield_interval(mut self, interval_ms: f64) -> Self {
        self.budget = YieldBudget::new(interval_ms, 0.0);
        self
    }

    pub fn phase(&self) -> FixupPhase {
        self.phase
    }

    pub fn total_steps(&self) -> usize {
        self.pairs.len() * 2
    }

    pub fn progress(&self) -> u8 {
        self.range.percent(self.done, self.total_steps())
    }

    /// Restart the yield budget, after the host got control back
    pub fn resume(&mut self, now_ms: f64) {
        self.budget.reset(now_ms);
    }

    /// Process pairs until the yield budget runs out or the pass completes
    pub fn step<D, S, A, F>(&mut self, targets: &mut FixupTargets<'_, D, S, A>, clock: &F) -> Result<FixupTick, CacheError>
    where
        D: DomHost<Node = N>,
        S: TabStore<N>,
        A: StateApplier<N>,
        F: FrameScheduler,
    {
        loop {
            match self.phase {
                FixupPhase::Done => return Ok(FixupTick::Finished),
                phase if self.index == self.pairs.len() => {
                    self.phase = if phase == FixupPhase::Bind {
                        FixupPhase::Apply
                    } else {
                        FixupPhase::Done
                    };
                    self.index = 0;
                    continue;
                }
                FixupPhase::Bind => {
                    let (element, record) = &self.pairs[self.index];
                    bind_pair(self.window_id, element, record, targets)?;
                }
                FixupPhase::Apply => {
                    let (element, record) = &self.pairs[self.index];
                    apply_pair(element, record, self.dirty, &mut *targets.applier)?;
                }
            }

            self.index += 1;
            self.done += 1;

            // Nothing left to hand a frame back for
            if self.phase == FixupPhase::Apply && self.index == self.pairs.len() {
                self.phase = FixupPhase::Done;
                return Ok(FixupTick::Finished);
            }

            if self.budget.should_yield(clock.now_ms()) {
                return Ok(FixupTick::Yield {
                    progress: self.progress(),
                });
            }
        }
    }
}

/// Bind one element to its tab before anything else can observe it, then
/// let the tab store initialize the tab.
fn bind_pair<D, S, A>(
    window_id: WindowId,
    element: &D::Node,
    record: &TabRecord,
    targets: &mut FixupTargets<'_, D, S, A>,
) -> Result<(), CacheError>
where
    D: DomHost,
    S: TabStore<D::Node>,
{
    let handle = targets.store.tab_handle(record)?;
    if let Some(previous) = targets.bindings.bind(record.id, handle.clone(), element.clone()) {
        if previous.element != *element {
            debug!("Tab {} moved to a restored element", record.id);
        }
    }
    targets.store.bind_element(&handle, element)?;

    let dom = &mut *targets.dom;
    dom.set_attribute(element, "id", &tab_dom_id(record.id))?;
    dom.set_attribute(element, TAB_ID_ATTR, &record.id.to_string())?;
    dom.set_attribute(element, WINDOW_ID_ATTR, &window_id.to_string())?;
    match record.parent_id {
        Some(parent_id) => dom.set_attribute(element, PARENT_ATTR, &parent_id.to_string())?,
        None => dom.remove_attribute(element, PARENT_ATTR)?,
    }

    targets.store.init_tab(&handle, record, true)
}

fn apply_pair<N, A: StateApplier<N>>(element: &N, record: &TabRecord, dirty: bool, applier: &mut A) -> Result<(), CacheError> {
    if dirty {
        applier.force_state_resync(record, element)?;
    } else {
        applier.apply_visual_state(record, element)?;
    }
    applier.apply_collapse_expand_state(record, element)
}

/// Drive a fixup pass to completion, yielding a frame whenever the budget is spent
pub async fn run_fixup<D, S, A, F, P>(
    pass: &mut FixupPass<D::Node>,
    targets: &mut FixupTargets<'_, D, S, A>,
    scheduler: &F,
    progress: &P,
) -> Result<(), CacheError>
where
    D: DomHost,
    S: TabStore<D::Node>,
    A: StateApplier<D::Node>,
    F: FrameScheduler,
    P: ProgressSink,
{
    pass.resume(scheduler.now_ms());
    loop {
        match pass.step(targets, scheduler)? {
            FixupTick::Yield { progress: percent } => {
                progress.set_progress(percent);
                scheduler.next_frame().await;
                pass.resume(scheduler.now_ms());
            }
            FixupTick::Finished => {
                progress.set_progress(pass.progress());
                return Ok(());
            }
        }
    }
}
