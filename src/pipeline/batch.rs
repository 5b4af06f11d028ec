//! Batch translator: fragments in, translated fragments out.
//!
//! ## Correspondence
//!
//! Every non-blank fragment becomes a work item carrying its slot (position
//! in the input sequence). Batches are cut from the work items, and results
//! are written back through those slots, so the mapping does not depend on
//! completion order or on how many blank fragments sit in between.
//!
//! ## Failure isolation
//!
//! Each batch is retried with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`, capped at [`MAX_BACKOFF_MS`]), every
//! call bounded by
//! `api_timeout_secs`. A batch that still fails keeps its source text; the
//! failure is logged, reported to the progress callback and returned in
//! [`BatchOutcome::failures`]. Other batches are unaffected.
//!
//! A blank string in an otherwise valid reply keeps that fragment's source
//! text and is counted in [`BatchOutcome::blank_replies`].

use crate::config::TranslationConfig;
use crate::error::BatchError;
use crate::model::TextFragment;
use crate::pipeline::pacing::Pacer;
use crate::pipeline::translator::Translator;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Upper bound on a single retry sleep.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// One batch of work items. `number` is 1-indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkBatch {
    pub number: usize,
    /// Input positions of the fragments in this batch.
    pub slots: Vec<usize>,
    pub sources: Vec<String>,
}

/// Result of translating one fragment sequence.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Same length and order as the input.
    pub fragments: Vec<TextFragment>,
    pub total_batches: usize,
    pub translatable: usize,
    /// Batches that fell back to their source text, sorted by batch number.
    pub failures: Vec<(usize, BatchError)>,
    /// Fragment indices whose translation came back blank and kept the source.
    pub blank_replies: Vec<usize>,
}

/// Cut the non-blank fragments into batches of at most `batch_size`.
pub fn plan_batches(fragments: &[TextFragment], batch_size: usize) -> Vec<WorkBatch> {
    let items: Vec<(usize, &str)> = fragments
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.is_blank())
        .map(|(slot, f)| (slot, f.text.as_str()))
        .collect();

    items
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(i, chunk)| WorkBatch {
            number: i + 1,
            slots: chunk.iter().map(|(slot, _)| *slot).collect(),
            sources: chunk.iter().map(|(_, text)| text.to_string()).collect(),
        })
        .collect()
}

/// Translate every non-blank fragment, batch by batch.
///
/// Blank fragments are passed through untouched. Translated fragments get
/// `original_text` set to their source text. A blank translation leaves its
/// fragment at identity.
pub async fn translate_fragments(
    fragments: Vec<TextFragment>,
    translator: &Arc<dyn Translator>,
    config: &TranslationConfig,
) -> BatchOutcome {
    let batches = plan_batches(&fragments, config.batch_size);
    let total_batches = batches.len();
    let translatable = batches.iter().map(|b| b.sources.len()).sum();

    info!(
        "Translating {} fragments in {} batches ({} → {}, via {})",
        translatable,
        total_batches,
        config.source_language,
        config.target_language,
        translator.name()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_job_start(total_batches, translatable);
    }

    let pacer = Pacer::new(Duration::from_millis(config.inter_batch_delay_ms));
    let pacer = &pacer;

    let results: Vec<(WorkBatch, Result<Vec<String>, BatchError>)> =
        stream::iter(batches.into_iter().map(|batch| async move {
            pacer.wait_turn().await;
            if let Some(ref cb) = config.progress_callback {
                cb.on_batch_start(batch.number, total_batches);
            }
            let result = call_with_retry(translator, &batch, config).await;
            pacer.finished().await;
            if let Some(ref cb) = config.progress_callback {
                match &result {
                    Ok(items) => cb.on_batch_complete(batch.number, total_batches, items.len()),
                    Err(e) => cb.on_batch_error(batch.number, total_batches, &e.to_string()),
                }
            }
            (batch, result)
        }))
        .buffer_unordered(config.max_in_flight.max(1))
        .collect()
        .await;

    let mut fragments = fragments;
    let mut failures = Vec::new();
    let mut blank_replies = Vec::new();
    for (batch, result) in results {
        match result {
            Ok(translations) => {
                for (slot, translated) in batch.slots.iter().zip(translations) {
                    let f = &mut fragments[*slot];
                    if translated.trim().is_empty() {
                        debug!(
                            "Batch {}: blank translation for fragment {}, keeping source",
                            batch.number, f.index
                        );
                        blank_replies.push(f.index);
                        continue;
                    }
                    f.original_text = Some(std::mem::replace(&mut f.text, translated));
                }
            }
            Err(e) => {
                warn!(
                    "Batch {}/{} kept its source text ({} fragments): {}",
                    batch.number,
                    total_batches,
                    batch.slots.len(),
                    e
                );
                failures.push((batch.number, e));
            }
        }
    }
    failures.sort_by_key(|(n, _)| *n);
    blank_replies.sort_unstable();
    if !blank_replies.is_empty() {
        warn!(
            "{} fragments came back blank and kept their source text",
            blank_replies.len()
        );
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_job_complete(total_batches, failures.len());
    }

    BatchOutcome {
        fragments,
        total_batches,
        translatable,
        failures,
        blank_replies,
    }
}

/// Sleep before retry `attempt` (1-based): doubling from `base_ms`, saturating
/// at [`MAX_BACKOFF_MS`].
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

/// Call the translator for one batch, retrying failed or malformed replies.
async fn call_with_retry(
    translator: &Arc<dyn Translator>,
    batch: &WorkBatch,
    config: &TranslationConfig,
) -> Result<Vec<String>, BatchError> {
    let call_timeout = Duration::from_secs(config.api_timeout_secs);
    let mut last_err = BatchError::CallFailed("no attempt made".into());

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_delay(config.retry_backoff_ms, attempt);
            warn!(
                "Batch {}: retry {}/{} after {}ms",
                batch.number,
                attempt,
                config.max_retries,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        let call = translator.translate_batch(
            &batch.sources,
            &config.source_language,
            &config.target_language,
        );
        let result = match timeout(call_timeout, call).await {
            Ok(Ok(items)) if items.len() == batch.sources.len() => {
                debug!("Batch {}: {} strings translated", batch.number, items.len());
                return Ok(items);
            }
            Ok(Ok(items)) => BatchError::LengthMismatch {
                expected: batch.sources.len(),
                actual: items.len(),
            },
            Ok(Err(e)) => e,
            Err(_) => BatchError::Timeout {
                secs: config.api_timeout_secs,
            },
        };
        warn!(
            "Batch {}: attempt {} failed: {}",
            batch.number,
            attempt + 1,
            result
        );
        last_err = result;
    }

    Err(last_err)
}
