//! Sequential background conversion of many MSG files.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::convert::Converter;
use crate::error::{ConvertError, Result};
use crate::parser::msg::read_msg_file;

use super::eml::{output_path_for, write_eml};

/// Error text longer than this is shortened in summaries.
pub const SHORT_ERROR_LEN: usize = 50;

/// Result of converting one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ConversionOutcome {
    Success {
        source: PathBuf,
        output: PathBuf,
        /// Why an error notice was written instead of the message, if it was.
        degraded: Option<String>,
    },
    Failure {
        source: PathBuf,
        error: String,
    },
}

impl ConversionOutcome {
    pub fn source(&self) -> &Path {
        match self {
            Self::Success { source, .. } | Self::Failure { source, .. } => source,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Error text cut to 50 characters with `...`; `None` on success.
    pub fn short_error(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(truncate_error(error)),
        }
    }
}

fn truncate_error(error: &str) -> String {
    if error.chars().count() > SHORT_ERROR_LEN {
        let cut: String = error.chars().take(SHORT_ERROR_LEN).collect();
        format!("{cut}...")
    } else {
        error.to_string()
    }
}

/// Totals for a finished (or cancelled) batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub degraded: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
    /// In submission order.
    pub outcomes: Vec<ConversionOutcome>,
}

impl BatchSummary {
    fn record(&mut self, outcome: &ConversionOutcome) {
        match outcome {
            ConversionOutcome::Success { degraded, .. } => {
                self.succeeded += 1;
                if degraded.is_some() {
                    self.degraded += 1;
                }
            }
            ConversionOutcome::Failure { .. } => self.failed += 1,
        }
    }
}

/// Progress reported by the worker.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { index: usize, source: PathBuf },
    Finished { index: usize, outcome: ConversionOutcome },
    Done(BatchSummary),
}

/// Where outputs go.
#[derive(Debug, Clone, Default)]
pub struct OutputSettings {
    pub output_dir: Option<PathBuf>,
    pub overwrite: bool,
}

/// Convert a single file to an `.eml` next to it or in the output directory.
///
/// A panic while reading or converting is reported as a failure of this item.
pub fn convert_file(converter: &Converter, source: &Path, output: &OutputSettings) -> ConversionOutcome {
    match guarded(|| try_convert_file(converter, source, output)) {
        Ok((path, degraded)) => ConversionOutcome::Success {
            source: source.to_path_buf(),
            output: path,
            degraded,
        },
        Err(e) => {
            warn!(source = %source.display(), error = %e, "Conversion failed");
            ConversionOutcome::Failure {
                source: source.to_path_buf(),
                error: e.to_string(),
            }
        }
    }
}

/// Run `f`, turning a panic into [`ConvertError::Panicked`].
fn guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(ConvertError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string())
}

fn try_convert_file(
    converter: &Converter,
    source: &Path,
    output: &OutputSettings,
) -> Result<(PathBuf, Option<String>)> {
    let message = read_msg_file(source)?;
    let converted = converter.convert(&message);
    // The MSG container is closed here; only the owned message remains
    drop(message);
    let path = output_path_for(source, output.output_dir.as_deref(), output.overwrite)?;
    write_eml(&path, &converted.bytes)?;
    debug!(source = %source.display(), output = %path.display(), "Wrote EML");
    Ok((path, converted.degraded))
}

/// Runs one worker thread that converts items in order.
pub struct BatchConverter {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<BatchSummary>>,
    events: Receiver<BatchEvent>,
}

impl BatchConverter {
    /// Start converting `sources`. The converter is moved into the worker,
    /// so later option changes do not affect this batch.
    pub fn spawn(converter: Converter, sources: Vec<PathBuf>, output: OutputSettings) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let flag = Arc::clone(&cancel);

        let handle = std::thread::spawn(move || {
            let start = Instant::now();
            let mut summary = BatchSummary::default();

            for (index, source) in sources.into_iter().enumerate() {
                if flag.load(Ordering::SeqCst) {
                    info!(remaining_from = index, "Batch cancelled");
                    summary.cancelled = true;
                    break;
                }
                let _ = tx.send(BatchEvent::Started {
                    index,
                    source: source.clone(),
                });
                let outcome = convert_file(&converter, &source, &output);
                summary.record(&outcome);
                summary.outcomes.push(outcome.clone());
                let _ = tx.send(BatchEvent::Finished { index, outcome });
            }

            summary.elapsed = start.elapsed();
            let _ = tx.send(BatchEvent::Done(summary.clone()));
            summary
        });

        Self {
            cancel,
            handle: Some(handle),
            events: rx,
        }
    }

    /// Event stream; ends after [`BatchEvent::Done`].
    pub fn events(&self) -> &Receiver<BatchEvent> {
        &self.events
    }

    /// Stop after the item in flight.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Wait for the worker and return its summary.
    pub fn join(mut self) -> BatchSummary {
        let Some(handle) = self.handle.take() else {
            return BatchSummary::default();
        };
        handle.join().unwrap_or_else(|_| {
            warn!("Batch worker panicked");
            BatchSummary {
                cancelled: true,
                ..Default::default()
            }
        })
    }
}

/// Convert `sources` on the current thread, calling `progress` after each item.
pub fn convert_all(
    converter: &Converter,
    sources: &[PathBuf],
    output: &OutputSettings,
    progress: &dyn Fn(usize, usize),
) -> BatchSummary {
    let start = Instant::now();
    let mut summary = BatchSummary::default();
    for (i, source) in sources.iter().enumerate() {
        let outcome = convert_file(converter, source, output);
        summary.record(&outcome);
        summary.outcomes.push(outcome);
        progress(i + 1, sources.len());
    }
    summary.elapsed = start.elapsed();
    summary
}
