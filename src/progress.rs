//! Stage progress reporting
//!
//! Converters emit a [`ProgressRecord`] at every pipeline stage. Where the
//! records go is up to the [`ProgressSink`]: structured log events by
//! default, or terminal progress bars via indicatif.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Detect,
    Inspect,
    Metadata,
    Plan,
    Extract,
    Merge,
    Repack,
    Align,
    Sign,
    Verify,
    Convert,
    Assemble,
    Bundle,
    Credential,
    Build,
    Done,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Detect => "detect",
            Stage::Inspect => "inspect",
            Stage::Metadata => "metadata",
            Stage::Plan => "plan",
            Stage::Extract => "extract",
            Stage::Merge => "merge",
            Stage::Repack => "repack",
            Stage::Align => "align",
            Stage::Sign => "sign",
            Stage::Verify => "verify",
            Stage::Convert => "convert",
            Stage::Assemble => "assemble",
            Stage::Bundle => "bundle",
            Stage::Credential => "credential",
            Stage::Build => "build",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One progress event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressRecord {
    /// Input item the event belongs to
    pub item: String,
    pub stage: Stage,
    /// 1-based position of the stage in its pipeline
    pub step: u32,
    pub total: u32,
    pub message: String,
}

/// Destination for progress records
pub trait ProgressSink: Send + Sync {
    /// Handle one stage event
    fn emit(&self, record: &ProgressRecord);

    /// Handle the end of an item
    fn finish(&self, _item: &str, _success: bool, _message: &str) {}
}

/// Logs records as structured tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, record: &ProgressRecord) {
        tracing::info!(
            item = %record.item,
            stage = record.stage.name(),
            step = record.step,
            total = record.total,
            "{}",
            record.message
        );
    }

    fn finish(&self, item: &str, success: bool, message: &str) {
        if success {
            tracing::info!(item = %item, "{}", message);
        } else {
            tracing::error!(item = %item, "{}", message);
        }
    }
}

/// Keeps every record in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<ProgressRecord>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records emitted so far
    pub fn records(&self) -> Vec<ProgressRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Stages emitted so far, in order
    pub fn stages(&self) -> Vec<Stage> {
        self.records().into_iter().map(|r| r.stage).collect()
    }
}

impl ProgressSink for CollectingSink {
    fn emit(&self, record: &ProgressRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

/// Style presets for progress indicators
pub struct ProgressStyles;

impl ProgressStyles {
    /// Style for stage progress (shows step count)
    pub fn stages() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .map(|style| style.progress_chars("█▓▒░  "))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
    }

    /// Style for success message
    pub fn success() -> ProgressStyle {
        ProgressStyle::with_template("{prefix:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }

    /// Style for error message
    pub fn error() -> ProgressStyle {
        ProgressStyle::with_template("{prefix:.red} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

/// Helper trait for progress bar operations
pub trait ProgressExt {
    /// Finish with a success message
    fn finish_success(&self, msg: &str);

    /// Finish with an error message
    fn finish_error(&self, msg: &str);
}

impl ProgressExt for ProgressBar {
    fn finish_success(&self, msg: &str) {
        self.set_style(ProgressStyles::success());
        self.set_prefix("✓");
        self.finish_with_message(msg.to_string());
    }

    fn finish_error(&self, msg: &str) {
        self.set_style(ProgressStyles::error());
        self.set_prefix("✗");
        self.finish_with_message(msg.to_string());
    }
}

/// Renders records on a terminal progress bar
pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(ProgressStyles::stages());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    /// Sink over an existing bar (e.g. a hidden one)
    pub fn with_bar(bar: ProgressBar) -> Self {
        bar.set_style(ProgressStyles::stages());
        Self { bar }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl Default for BarSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarSink {
    fn emit(&self, record: &ProgressRecord) {
        if self.bar.is_finished() {
            self.bar.reset();
            self.bar.set_style(ProgressStyles::stages());
        }
        self.bar.set_length(u64::from(record.total));
        self.bar.set_position(u64::from(record.step));
        self.bar
            .set_message(format!("{} [{}] {}", record.item, record.stage, record.message));
    }

    fn finish(&self, item: &str, success: bool, message: &str) {
        let msg = format!("{item}: {message}");
        if success {
            self.bar.finish_success(&msg);
        } else {
            self.bar.finish_error(&msg);
        }
    }
}

/// Emits numbered records for one item of one pipeline
pub struct Reporter<'a> {
    sink: &'a dyn ProgressSink,
    item: String,
    total: u32,
    step: u32,
}

impl<'a> Reporter<'a> {
    pub fn new(sink: &'a dyn ProgressSink, item: impl Into<String>, total: u32) -> Self {
        Self {
            sink,
            item: item.into(),
            total,
            step: 0,
        }
    }

    /// Advance to `stage`
    pub fn stage(&mut self, stage: Stage, message: impl Into<String>) {
        self.step = (self.step + 1).min(self.total);
        self.sink.emit(&ProgressRecord {
            item: self.item.clone(),
            stage,
            step: self.step,
            total: self.total,
            message: message.into(),
        });
    }

    pub fn finish(&self, success: bool, message: &str) {
        self.sink.finish(&self.item, success, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_styles() {
        let _ = ProgressStyles::stages();
        let _ = ProgressStyles::success();
        let _ = ProgressStyles::error();
    }

    #[test]
    fn test_reporter_numbers_steps() {
        let sink = CollectingSink::new();
        let mut reporter = Reporter::new(&sink, "app.apks", 3);
        reporter.stage(Stage::Inspect, "a");
        reporter.stage(Stage::Plan, "b");
        reporter.stage(Stage::Repack, "c");
        reporter.stage(Stage::Done, "d");

        let records = sink.records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].step, 1);
        assert_eq!(records[2].step, 3);
        // clamped to total
        assert_eq!(records[3].step, 3);
        assert!(records.iter().all(|r| r.item == "app.apks"));
    }

    #[test]
    fn test_bar_sink_hidden() {
        let sink = BarSink::with_bar(ProgressBar::hidden());
        sink.emit(&ProgressRecord {
            item: "x".into(),
            stage: Stage::Merge,
            step: 2,
            total: 5,
            message: "merging".into(),
        });
        assert_eq!(sink.bar().position(), 2);
        assert_eq!(sink.bar().length(), Some(5));
        sink.finish("x", true, "done");
        assert!(sink.bar().is_finished());
    }
}
