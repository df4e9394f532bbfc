//! The upload preparation pipeline.
//!
//! One shared routine replaces the per-page copies of "shrink this photo
//! before uploading it". For a file selection and a [`ProfileConfig`]:
//!
//! ```text
//! validate ─→ bypass? ─→ decode ─→ fit to max width ─→ re-encode loop ─→ wrap as .jpg
//!    │           │          │                                │
//!    ✗ reject    └─ upload original as-is      any failure ──┴─→ upload original as-is
//! ```
//!
//! ## Outcomes
//!
//! - **Rejected**: wrong type or too large. Nothing is decoded; the caller
//!   shows [`ValidationError::notice`].
//! - **Compressed**: a JPEG no wider than `max_width`, as close to
//!   `budget_bytes` as `max_attempts` qualities could get it.
//! - **Bypassed**: above `bypass_above_bytes` the original bytes are sent
//!   untouched under the `.jpg` output name and the server does the
//!   optimizing. Decoding a huge bitmap
//!   in-process costs more memory than it saves bandwidth.
//! - **Fallback**: decode or encode failed; the original is sent and the
//!   user is told optimization was skipped. The upload still goes ahead.
//!
//! ## Re-encode loop
//!
//! Starting quality comes from the profile's size tiers. Each attempt
//! encodes at the current quality; the result is accepted when it fits the
//! budget or when it was the last allowed attempt. Otherwise quality is
//! multiplied by `decay` and the next attempt runs. Attempts are strictly
//! sequential and the loop always terminates after `max_attempts`.
//!
//! ## Progress
//!
//! Pass a [`Sender<CompressEvent>`](std::sync::mpsc::Sender) to observe each
//! stage; the CLI prints them from a separate thread.

use crate::config::ProfileConfig;
use crate::imaging::{BackendError, Dimensions, ImageBackend, Quality, ReencodeParams, fit_within_width};
use crate::naming;
use crate::types::{EncodingAttempt, Notice, OutputFile, SourceFile, format_bytes};
use crate::validate::{ValidationError, validate};
use std::sync::mpsc::Sender;
use std::time::SystemTime;

/// Progress reported while a file moves through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum CompressEvent {
    Started {
        name: String,
        size: u64,
    },
    Decoded {
        name: String,
        natural: Dimensions,
        target: Dimensions,
    },
    Attempt {
        name: String,
        attempt: EncodingAttempt,
    },
    Finished {
        name: String,
        output_name: String,
        disposition: Disposition,
        output_size: u64,
    },
}

/// How the output file came to be.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Disposition {
    Compressed {
        natural: Dimensions,
        output: Dimensions,
        quality: f32,
        within_budget: bool,
    },
    Bypassed,
    Fallback {
        reason: String,
    },
}

/// A file ready to attach to an upload form.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedUpload {
    pub source_name: String,
    pub source_size: u64,
    pub file: OutputFile,
    pub disposition: Disposition,
    pub attempts: Vec<EncodingAttempt>,
    pub notices: Vec<Notice>,
}

/// Result of the re-encode loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub quality: Quality,
    pub attempts: Vec<EncodingAttempt>,
}

impl Encoded {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

fn emit(events: Option<&Sender<CompressEvent>>, event: CompressEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is watching.
        tx.send(event).ok();
    }
}

/// Encode `bitmap` as JPEG, lowering quality until it fits the budget.
///
/// Runs at least once and at most `params.max_attempts` times. When the
/// budget is never met, the last attempt is returned anyway.
pub fn reencode<B: ImageBackend>(
    backend: &B,
    bitmap: &B::Bitmap,
    params: &ReencodeParams,
    mut on_attempt: impl FnMut(EncodingAttempt),
) -> Result<Encoded, BackendError> {
    let max_attempts = params.max_attempts.max(1);
    let mut quality = params.initial;
    let mut attempts = Vec::with_capacity(max_attempts as usize);
    let mut n = 1;

    loop {
        let bytes = backend.encode_jpeg(bitmap, quality)?;
        let attempt = EncodingAttempt {
            attempt: n,
            quality,
            size: bytes.len() as u64,
        };
        tracing::debug!(
            attempt = n,
            quality = quality.value(),
            size = attempt.size,
            budget = params.budget_bytes,
            "encode attempt"
        );
        attempts.push(attempt);
        on_attempt(attempt);

        if attempt.size <= params.budget_bytes || n >= max_attempts {
            return Ok(Encoded {
                bytes,
                quality,
                attempts,
            });
        }
        n += 1;
        quality = quality.decayed(params.decay);
    }
}

/// Wrap re-encoded bytes as `<original base name>.jpg`.
pub fn wrap_jpeg(bytes: Vec<u8>, original_name: &str) -> OutputFile {
    OutputFile {
        name: naming::jpeg_output_name(original_name),
        mime: "image/jpeg".to_string(),
        bytes,
        last_modified: SystemTime::now(),
    }
}

/// Decode, fit, re-encode and wrap. Any backend failure aborts.
fn optimize<B: ImageBackend>(
    backend: &B,
    source: &SourceFile,
    profile: &ProfileConfig,
    events: Option<&Sender<CompressEvent>>,
) -> Result<(OutputFile, Disposition, Vec<EncodingAttempt>), BackendError> {
    let bitmap = backend.decode(&source.bytes)?;
    let natural = backend.dimensions(&bitmap);
    let target = fit_within_width(natural, profile.max_width);
    emit(
        events,
        CompressEvent::Decoded {
            name: source.name.clone(),
            natural,
            target,
        },
    );
    tracing::debug!(name = %source.name, %natural, %target, "decoded");

    let canvas = backend.draw(bitmap, target)?;
    let params = profile.reencode_params(source.size());
    let encoded = reencode(backend, &canvas, &params, |attempt| {
        emit(
            events,
            CompressEvent::Attempt {
                name: source.name.clone(),
                attempt,
            },
        )
    })?;

    let disposition = Disposition::Compressed {
        natural,
        output: target,
        quality: encoded.quality.value(),
        within_budget: encoded.size() <= params.budget_bytes,
    };
    Ok((
        wrap_jpeg(encoded.bytes, &source.name),
        disposition,
        encoded.attempts,
    ))
}

/// Run an already-validated source through bypass, optimize and fallback.
pub fn compress_source<B: ImageBackend>(
    backend: &B,
    source: &SourceFile,
    profile: &ProfileConfig,
    events: Option<&Sender<CompressEvent>>,
) -> PreparedUpload {
    emit(
        events,
        CompressEvent::Started {
            name: source.name.clone(),
            size: source.size(),
        },
    );

    let (file, disposition, attempts, notices) = match profile.bypass_above_bytes {
        Some(limit) if source.size() > limit => {
            tracing::info!(name = %source.name, size = source.size(), limit, "bypassing client-side compression");
            let notice = Notice::info(format!(
                "{} is {}; it will be uploaded as-is and optimized on the server.",
                source.name,
                format_bytes(source.size())
            ));
            (
                OutputFile::renamed_copy(source),
                Disposition::Bypassed,
                Vec::new(),
                vec![notice],
            )
        }
        _ => match optimize(backend, source, profile, events) {
            Ok((file, disposition, attempts)) => {
                let mut notices = vec![Notice::success(format!(
                    "{} optimized: {} → {}",
                    source.name,
                    format_bytes(source.size()),
                    format_bytes(file.size())
                ))];
                if let Disposition::Compressed {
                    within_budget: false,
                    ..
                } = disposition
                {
                    notices.push(Notice::warning(format!(
                        "{} is still above the {} target after {} attempts.",
                        file.name,
                        format_bytes(profile.budget_bytes),
                        attempts.len()
                    )));
                }
                tracing::info!(
                    name = %source.name,
                    from = source.size(),
                    to = file.size(),
                    attempts = attempts.len(),
                    "compressed"
                );
                (file, disposition, attempts, notices)
            }
            Err(err) => {
                tracing::warn!(name = %source.name, error = %err, "optimization skipped");
                let notice = Notice::warning(format!(
                    "Could not optimize {}; uploading the original file.",
                    source.name
                ));
                (
                    OutputFile::passthrough(source),
                    Disposition::Fallback {
                        reason: err.to_string(),
                    },
                    Vec::new(),
                    vec![notice],
                )
            }
        },
    };

    emit(
        events,
        CompressEvent::Finished {
            name: source.name.clone(),
            output_name: file.name.clone(),
            disposition: disposition.clone(),
            output_size: file.size(),
        },
    );

    PreparedUpload {
        source_name: source.name.clone(),
        source_size: source.size(),
        file,
        disposition,
        attempts,
        notices,
    }
}

/// Validate a selection and prepare its file for upload.
///
/// `Ok(None)` means nothing was selected. `Err` means the file was rejected
/// and never decoded.
pub fn prepare_upload<B: ImageBackend>(
    backend: &B,
    selection: &[SourceFile],
    profile: &ProfileConfig,
    events: Option<&Sender<CompressEvent>>,
) -> Result<Option<PreparedUpload>, ValidationError> {
    let Some(source) = validate(selection, &profile.constraints())? else {
        tracing::debug!("empty selection");
        return Ok(None);
    };
    Ok(Some(compress_source(backend, source, profile, events)))
}

/// Prepare several slots (e.g. desktop and mobile banner) one after another.
pub fn prepare_all<B: ImageBackend>(
    backend: &B,
    selections: &[Vec<SourceFile>],
    profile: &ProfileConfig,
    events: Option<&Sender<CompressEvent>>,
) -> Vec<Result<Option<PreparedUpload>, ValidationError>> {
    selections
        .iter()
        .map(|selection| prepare_upload(backend, selection, profile, events))
        .collect()
}
