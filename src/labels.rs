//! Label output.
//!
//! A label file holds one line per detected beep, `"<startMs> <endMs> <label>"`.
//! The detector writes through the [`LabelSink`] trait so that the pipeline
//! does not depend on the filesystem.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::CrosswalkResult;

/// Label used for every detected beacon beep.
pub const DEFAULT_LABEL: &str = "crosswalk";

/// A labelled time span in milliseconds from the start of the clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledInterval {
    /// Start offset in milliseconds.
    pub start_ms: u64,
    /// End offset in milliseconds.
    pub end_ms: u64,
    /// Event label.
    pub label: String,
}

impl LabeledInterval {
    /// Interval starting at `seconds`, lasting `duration_seconds`, both rounded
    /// to whole milliseconds.
    pub fn from_seconds(seconds: f64, duration_seconds: f64, label: impl Into<String>) -> Self {
        let start_ms = (seconds.max(0.0) * 1000.0).round() as u64;
        let length_ms = (duration_seconds.max(0.0) * 1000.0).round() as u64;
        Self {
            start_ms,
            end_ms: start_ms + length_ms,
            label: label.into(),
        }
    }

    /// The label-file line for this interval, without the newline.
    pub fn to_line(&self) -> String {
        format!("{} {} {}", self.start_ms, self.end_ms, self.label)
    }
}

/// Destination for the intervals found in a clip.
pub trait LabelSink {
    /// Appends `intervals` to the labels stored for `clip_id`.
    ///
    /// Existing labels are kept. An empty slice must leave the sink untouched.
    fn append(&mut self, clip_id: &str, intervals: &[LabeledInterval]) -> CrosswalkResult<()>;
}

impl<S: LabelSink + ?Sized> LabelSink for &mut S {
    fn append(&mut self, clip_id: &str, intervals: &[LabeledInterval]) -> CrosswalkResult<()> {
        (**self).append(clip_id, intervals)
    }
}

/// Writes `<dir>/<clip_id>.txt`, creating the file or appending to it.
#[derive(Debug, Clone)]
pub struct FileLabelSink {
    dir: PathBuf,
}

impl FileLabelSink {
    /// Sink writing label files into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the label file for `clip_id`.
    pub fn label_path(&self, clip_id: &str) -> PathBuf {
        self.dir.join(format!("{clip_id}.txt"))
    }
}

impl LabelSink for FileLabelSink {
    fn append(&mut self, clip_id: &str, intervals: &[LabeledInterval]) -> CrosswalkResult<()> {
        if intervals.is_empty() {
            return Ok(());
        }

        let path = self.label_path(clip_id);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        for interval in intervals {
            writeln!(writer, "{}", interval.to_line())?;
        }
        writer.flush()?;

        tracing::debug!(path = %path.display(), lines = intervals.len(), "labels appended");
        Ok(())
    }
}

/// In-memory sink keeping the lines written for each clip.
#[derive(Debug, Clone, Default)]
pub struct MemoryLabelSink {
    lines: HashMap<String, Vec<String>>,
}

impl MemoryLabelSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines stored for `clip_id`, or `None` if nothing was ever written.
    pub fn lines(&self, clip_id: &str) -> Option<&[String]> {
        self.lines.get(clip_id).map(Vec::as_slice)
    }

    /// Number of clips with at least one line.
    pub fn clip_count(&self) -> usize {
        self.lines.len()
    }
}

impl LabelSink for MemoryLabelSink {
    fn append(&mut self, clip_id: &str, intervals: &[LabeledInterval]) -> CrosswalkResult<()> {
        if intervals.is_empty() {
            return Ok(());
        }
        self.lines
            .entry(clip_id.to_string())
            .or_default()
            .extend(intervals.iter().map(LabeledInterval::to_line));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(start_ms: u64) -> LabeledInterval {
        LabeledInterval {
            start_ms,
            end_ms: start_ms + 27,
            label: DEFAULT_LABEL.to_string(),
        }
    }

    #[test]
    fn test_interval_from_seconds_rounds() {
        let interval = LabeledInterval::from_seconds(1.2346, 0.02667, DEFAULT_LABEL);
        assert_eq!(interval.start_ms, 1235);
        assert_eq!(interval.end_ms, 1262);
        assert_eq!(interval.to_line(), "1235 1262 crosswalk");
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileLabelSink::new(dir.path());

        sink.append("clip", &[interval(100)]).unwrap();
        sink.append("clip", &[interval(200), interval(300)]).unwrap();

        let contents = std::fs::read_to_string(sink.label_path("clip")).unwrap();
        assert_eq!(contents, "100 127 crosswalk\n200 227 crosswalk\n300 327 crosswalk\n");
    }

    #[test]
    fn test_empty_intervals_create_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileLabelSink::new(dir.path());
        sink.append("quiet", &[]).unwrap();
        assert!(!sink.label_path("quiet").exists());
    }

    #[test]
    fn test_file_sink_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileLabelSink::new(dir.path().join("missing"));
        let err = sink.append("clip", &[interval(0)]).unwrap_err();
        assert!(matches!(err, crate::CrosswalkError::Io(_)));
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemoryLabelSink::new();
        sink.append("a", &[interval(5)]).unwrap();
        sink.append("b", &[]).unwrap();

        assert_eq!(sink.lines("a").unwrap(), ["5 32 crosswalk".to_string()]);
        assert!(sink.lines("b").is_none());
        assert_eq!(sink.clip_count(), 1);
    }
}
