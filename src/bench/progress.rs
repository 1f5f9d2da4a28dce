//! Progress event sinks.
//!
//! Three independent, monotonically increasing streams: operations
//! submitted, receipts received, and errored receipts. Purely
//! observational, no backpressure.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Consumer of benchmark progress events.
pub trait ProgressSink: Send + Sync + 'static {
    /// One operation was submitted.
    fn submitted(&self);
    /// One receipt arrived.
    fn received(&self);
    /// One receipt arrived with a failed status.
    fn errored(&self);
    /// The run is over; flush any rendering.
    fn finish(&self) {}
}

/// Sink that discards all events. Used by tests.
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn submitted(&self) {}
    fn received(&self) {}
    fn errored(&self) {}
}

/// Terminal sink rendering the three streams as stacked bars.
pub struct BarSink {
    sent: ProgressBar,
    received: ProgressBar,
    errors: ProgressBar,
    // keeps the shared draw target alive for the bars' lifetime
    _multi: MultiProgress,
}

impl BarSink {
    /// Creates the three bars, each running up to `total`.
    pub fn new(total: u64) -> Self {
        let multi = MultiProgress::new();
        let style = ProgressStyle::default_bar()
            .template("{prefix:8} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len}")
            .unwrap()
            .progress_chars("##-");

        let bar = |prefix: &str| {
            let bar = multi.add(ProgressBar::new(total));
            bar.set_style(style.clone());
            bar.set_prefix(prefix.to_string());
            bar
        };

        let (sent, received, errors) = (bar("Send"), bar("Receive"), bar("Errors"));
        Self { sent, received, errors, _multi: multi }
    }
}

impl ProgressSink for BarSink {
    fn submitted(&self) {
        self.sent.inc(1);
    }

    fn received(&self) {
        self.received.inc(1);
    }

    fn errored(&self) {
        self.errors.inc(1);
    }

    fn finish(&self) {
        self.sent.finish();
        self.received.finish();
        self.errors.finish();
    }
}
