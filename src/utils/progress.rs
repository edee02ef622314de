//! Progress display for copy polling
//!
//! The poller reports through the `ProgressReporter` seam; the CLI plugs in
//! an indicatif renderer with one bar per polling slot plus a summary line,
//! tests plug in a recording implementation.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Presentation seam for polling progress
pub trait ProgressReporter: Send {
    /// Update the bar of one polling slot
    fn slot_update(&mut self, slot: usize, blob: &str, percent: u64, message: &str);

    /// Release a slot whose job reached a terminal state
    fn slot_clear(&mut self, slot: usize);

    /// Update the summary line shown under the slot bars
    fn summary(&mut self, text: &str);

    /// Tear down the display
    fn finish(&mut self);
}

/// No-op reporter for quiet or non-interactive runs
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn slot_update(&mut self, _slot: usize, _blob: &str, _percent: u64, _message: &str) {}
    fn slot_clear(&mut self, _slot: usize) {}
    fn summary(&mut self, _text: &str) {}
    fn finish(&mut self) {}
}

/// Terminal renderer: a fixed pool of slot bars plus one summary line
pub struct ConsoleProgress {
    multi: MultiProgress,
    slots: Vec<Option<ProgressBar>>,
    summary: ProgressBar,
}

impl ConsoleProgress {
    pub fn new(slot_count: usize) -> Self {
        let multi = MultiProgress::new();
        let summary = multi.add(ProgressBar::new_spinner());
        summary.set_style(
            ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        Self {
            multi,
            slots: (0..slot_count).map(|_| None).collect(),
            summary,
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{prefix:<32!} [{bar:30}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn slot_bar(&mut self, slot: usize) -> Option<&ProgressBar> {
        if slot >= self.slots.len() {
            return None;
        }
        if self.slots[slot].is_none() {
            let bar = self.multi.insert_before(&self.summary, ProgressBar::new(100));
            bar.set_style(Self::bar_style());
            self.slots[slot] = Some(bar);
        }
        self.slots[slot].as_ref()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn slot_update(&mut self, slot: usize, blob: &str, percent: u64, message: &str) {
        if let Some(bar) = self.slot_bar(slot) {
            bar.set_prefix(blob.to_string());
            bar.set_position(percent.min(100));
            bar.set_message(message.to_string());
        }
    }

    fn slot_clear(&mut self, slot: usize) {
        if slot < self.slots.len() {
            if let Some(bar) = self.slots[slot].take() {
                bar.finish_and_clear();
                self.multi.remove(&bar);
            }
        }
    }

    fn summary(&mut self, text: &str) {
        self.summary.set_message(text.to_string());
    }

    fn finish(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
        self.summary.finish_and_clear();
    }
}
