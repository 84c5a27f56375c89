//! Parallel directory processing.
//!
//! Clips share no state, so each one runs as an independent rayon task with
//! its own label sink.

use std::path::Path;

use rayon::prelude::*;
use tracing::info;

use super::{BatchError, BatchProcessor, BatchReport, BatchResult, list_files};
use crate::labels::LabelSink;

impl BatchProcessor {
    /// Processes the files of `dir` on a rayon pool.
    ///
    /// `sink_factory` is called once per clip so that no sink is shared across
    /// threads. `threads` sets the pool size; `None` uses rayon's default.
    /// The report lists files in the same order as [`process_directory`].
    ///
    /// [`process_directory`]: BatchProcessor::process_directory
    pub fn process_directory_parallel<F, S>(
        &self,
        dir: &Path,
        sink_factory: F,
        threads: Option<usize>,
    ) -> BatchResult<BatchReport>
    where
        F: Fn() -> S + Sync,
        S: LabelSink,
    {
        let files = list_files(dir)?;

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| BatchError::parallel_error(format!("Thread pool creation failed: {e}")))?;

        let results: Vec<_> = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let mut sink = sink_factory();
                    self.process_file(path, &mut sink)
                })
                .collect()
        });

        if results.iter().any(|r| matches!(r, Err(err) if err.is_cancelled())) {
            let processed = results
                .iter()
                .filter(|r| !matches!(r, Err(err) if err.is_cancelled()))
                .count();
            return Err(BatchError::Cancelled { processed });
        }

        let mut report = BatchReport::default();
        for (index, (path, result)) in files.into_iter().zip(results).enumerate() {
            report.record(index, path, result);
        }

        info!(
            dir = %dir.display(),
            audio_files = report.audio_files,
            found = report.found,
            "directory processed in parallel"
        );
        Ok(report)
    }
}
