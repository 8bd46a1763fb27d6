/// Frame scheduling, yield budget and progress reporting
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;

/// Host rendering loop
#[allow(async_fn_in_trait)]
pub trait FrameScheduler {
    /// Milliseconds on a monotonic-enough clock
    fn now_ms(&self) -> f64;

    /// Suspend until the host has rendered one frame
    async fn next_frame(&self);
}

/// Receives progress of a long-running restoration, 0-100
pub trait ProgressSink {
    fn set_progress(&self, percent: u8);
}

/// Progress callback passed in from JavaScript
impl ProgressSink for js_sys::Function {
    fn set_progress(&self, percent: u8) {
        if let Err(e) = self.call1(&JsValue::NULL, &JsValue::from(percent)) {
            log::warn!("Progress callback failed: {:?}", e);
        }
    }
}

impl ProgressSink for yew::Callback<u8> {
    fn set_progress(&self, percent: u8) {
        self.emit(percent);
    }
}

/// Discards progress
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_progress(&self, _percent: u8) {}
}

/// Part of the 0-100 progress scale owned by one stage of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressRange {
    pub start: u8,
    pub end: u8,
}

impl ProgressRange {
    pub fn new(start: u8, end: u8) -> ProgressRange {
        let end = end.min(100);
        ProgressRange { start: start.min(end), end }
    }

    /// Map `done` out of `total` steps into this range
    pub fn percent(&self, done: usize, total: usize) -> u8 {
        if total == 0 {
            return self.end;
        }
        let span = f64::from(self.end - self.start);
        let fraction = done.min(total) as f64 / total as f64;
        self.start + (span * fraction).round() as u8
    }
}

/// Yields only once more than `interval_ms` has passed since the last yield
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YieldBudget {
    interval_ms: f64,
    last_yield_ms: f64,
}

impl YieldBudget {
    pub fn new(interval_ms: f64, now_ms: f64) -> YieldBudget {
        YieldBudget {
            interval_ms,
            last_yield_ms: now_ms,
        }
    }

    pub fn should_yield(&self, now_ms: f64) -> bool {
        now_ms - self.last_yield_ms > self.interval_ms
    }

    pub fn reset(&mut self, now_ms: f64) {
        self.last_yield_ms = now_ms;
    }
}

/// Yields to the browser through `requestAnimationFrame`
pub struct AnimationFrameScheduler;

impl FrameScheduler for AnimationFrameScheduler {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }

    async fn next_frame(&self) {
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            let scheduled = web_sys::window()
                .map(|window| window.request_animation_frame(&resolve).is_ok())
                .unwrap_or(false);
            if !scheduled {
                // No window (e.g. a worker): resolve on the next microtask instead
                let _ = resolve.call0(&JsValue::NULL);
            }
        });
        if let Err(e) = JsFuture::from(promise).await {
            log::warn!("Waiting for the next frame failed: {:?}", e);
        }
    }
}
