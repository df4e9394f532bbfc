//! CLI output formatting.
//!
//! Output is **file-centric**: every block leads with the file the user
//! picked, and everything that happened to it is indented beneath. Notices
//! (the toasts a browser would show) are printed as tagged lines so a
//! terminal user gets the same feedback.
//!
//! # Output Format
//!
//! ## Compress
//!
//! ```text
//! summer-sale.jpeg (15.0 MB)
//!     Decoded: 3000x2000 → 1920x1280
//!     Attempt 1: q=0.75 → 2.6 MB
//!     Attempt 2: q=0.64 → 1.8 MB
//!     Output: summer-sale.jpg (1.8 MB, compressed)
//! [ok] summer-sale.jpeg optimized: 15.0 MB → 1.8 MB
//! ```
//!
//! ## Batch summary
//!
//! ```text
//! 12 files: 9 compressed, 1 bypassed, 1 fallback, 1 rejected
//! 84.2 MB → 14.7 MB
//! ```
//!
//! ## Form
//!
//! ```text
//! title = "Summer Sale"
//! image ← summer-sale.jpg (image/jpeg, 1.8 MB)
//! remove_mobile_image = "1"
//! ```
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::compress::{CompressEvent, Disposition, PreparedUpload};
use crate::config::{Endpoints, ProfileConfig, UploadConfig};
use crate::form::{FormPart, PartValue};
use crate::types::{Notice, NoticeLevel, format_bytes};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn disposition_label(disposition: &Disposition) -> &'static str {
    match disposition {
        Disposition::Compressed {
            within_budget: true,
            ..
        } => "compressed",
        Disposition::Compressed { .. } => "compressed, over budget",
        Disposition::Bypassed => "original, server-side optimization",
        Disposition::Fallback { .. } => "original, optimization skipped",
    }
}

// ============================================================================
// Notices
// ============================================================================

/// One notice as a tagged line.
///
/// ```text
/// [ok] photo.png optimized: 3.1 MB → 412 KB
/// [warn] Could not optimize photo.png; uploading the original file.
/// ```
pub fn format_notice(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Success => "ok",
        NoticeLevel::Info => "info",
        NoticeLevel::Warning => "warn",
        NoticeLevel::Error => "error",
    };
    format!("[{tag}] {}", notice.message)
}

pub fn print_notices(notices: &[Notice]) {
    for notice in notices {
        println!("{}", format_notice(notice));
    }
}

// ============================================================================
// Compress: progress events
// ============================================================================

/// Format a single pipeline event for streaming display.
pub fn format_compress_event(event: &CompressEvent) -> Vec<String> {
    match event {
        CompressEvent::Started { name, size } => {
            vec![format!("{name} ({})", format_bytes(*size))]
        }
        CompressEvent::Decoded {
            natural, target, ..
        } => {
            if natural == target {
                vec![format!("{}Decoded: {natural}", indent(1))]
            } else {
                vec![format!("{}Decoded: {natural} → {target}", indent(1))]
            }
        }
        CompressEvent::Attempt { attempt, .. } => vec![format!(
            "{}Attempt {}: q={:.2} → {}",
            indent(1),
            attempt.attempt,
            attempt.quality.value(),
            format_bytes(attempt.size)
        )],
        CompressEvent::Finished {
            output_name,
            disposition,
            output_size,
            ..
        } => {
            let mut lines = vec![format!(
                "{}Output: {output_name} ({}, {})",
                indent(1),
                format_bytes(*output_size),
                disposition_label(disposition)
            )];
            if let Disposition::Fallback { reason } = disposition {
                lines.push(format!("{}Reason: {reason}", indent(2)));
            }
            lines
        }
    }
}

// ============================================================================
// Compress: final report
// ============================================================================

/// Summary block for one prepared file, used when events were not streamed.
pub fn format_prepared(prepared: &PreparedUpload) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({})",
        prepared.source_name,
        format_bytes(prepared.source_size)
    )];
    if let Disposition::Compressed {
        natural,
        output,
        quality,
        ..
    } = &prepared.disposition
    {
        lines.push(format!("{}Size: {natural} → {output}", indent(1)));
        lines.push(format!(
            "{}Quality: {quality:.2} after {} attempt{}",
            indent(1),
            prepared.attempts.len(),
            if prepared.attempts.len() == 1 { "" } else { "s" }
        ));
    }
    lines.push(format!(
        "{}Output: {} ({}, {})",
        indent(1),
        prepared.file.name,
        format_bytes(prepared.file.size()),
        disposition_label(&prepared.disposition)
    ));
    lines.extend(prepared.notices.iter().map(format_notice));
    lines
}

pub fn print_prepared(prepared: &PreparedUpload) {
    for line in format_prepared(prepared) {
        println!("{}", line);
    }
}

/// What one file of a batch run came to.
///
/// Holds only what the summary needs; output bytes are written and dropped
/// as soon as each file is done.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Written {
        disposition: Disposition,
        bytes_in: u64,
        bytes_out: u64,
    },
    Rejected,
    /// Unreadable source, write error, or output name already taken.
    Failed,
}

impl BatchOutcome {
    pub fn written(prepared: &PreparedUpload) -> Self {
        BatchOutcome::Written {
            disposition: prepared.disposition.clone(),
            bytes_in: prepared.source_size,
            bytes_out: prepared.file.size(),
        }
    }
}

/// Totals across a batch run.
pub fn format_batch_summary(outcomes: &[BatchOutcome]) -> Vec<String> {
    let (mut compressed, mut bypassed, mut fallback, mut rejected, mut failed) = (0, 0, 0, 0, 0);
    let (mut total_in, mut total_out) = (0u64, 0u64);

    for outcome in outcomes {
        match outcome {
            BatchOutcome::Written {
                disposition,
                bytes_in,
                bytes_out,
            } => {
                match disposition {
                    Disposition::Compressed { .. } => compressed += 1,
                    Disposition::Bypassed => bypassed += 1,
                    Disposition::Fallback { .. } => fallback += 1,
                }
                total_in += bytes_in;
                total_out += bytes_out;
            }
            BatchOutcome::Rejected => rejected += 1,
            BatchOutcome::Failed => failed += 1,
        }
    }

    let total = outcomes.len();
    let mut counts = format!(
        "{total} file{}: {compressed} compressed, {bypassed} bypassed, {fallback} fallback, {rejected} rejected",
        if total == 1 { "" } else { "s" }
    );
    if failed > 0 {
        counts.push_str(&format!(", {failed} failed"));
    }
    vec![
        counts,
        format!("{} → {}", format_bytes(total_in), format_bytes(total_out)),
    ]
}

pub fn print_batch_summary(outcomes: &[BatchOutcome]) {
    for line in format_batch_summary(outcomes) {
        println!("{}", line);
    }
}

// ============================================================================
// Form
// ============================================================================

/// The multipart plan: one line per part, in send order.
pub fn format_form_parts(parts: &[FormPart]) -> Vec<String> {
    if parts.is_empty() {
        return vec!["(no changes)".to_string()];
    }
    parts
        .iter()
        .map(|part| match &part.value {
            PartValue::Text(value) => format!("{} = {:?}", part.name, value),
            PartValue::File(file) => format!(
                "{} ← {} ({}, {})",
                part.name,
                file.name,
                file.mime,
                format_bytes(file.size())
            ),
        })
        .collect()
}

pub fn print_form_parts(parts: &[FormPart]) {
    for line in format_form_parts(parts) {
        println!("{}", line);
    }
}

// ============================================================================
// Config
// ============================================================================

fn profile_lines(name: &str, profile: &ProfileConfig) -> Vec<String> {
    let mut lines = vec![
        name.to_string(),
        format!(
            "{}Accepts: {} up to {}",
            indent(1),
            profile.accepted_types.join(", "),
            format_bytes(profile.max_file_bytes)
        ),
        format!(
            "{}Output: ≤{}px wide, target {}",
            indent(1),
            profile.max_width,
            format_bytes(profile.budget_bytes)
        ),
        format!(
            "{}Attempts: {} (×{} per attempt, start q={:.2})",
            indent(1),
            profile.max_attempts,
            profile.decay,
            profile.fallback_quality.value()
        ),
    ];
    for tier in &profile.quality_tiers {
        lines.push(format!(
            "{}Above {}: start q={:.2}",
            indent(2),
            format_bytes(tier.above_bytes),
            tier.quality.value()
        ));
    }
    if let Some(limit) = profile.bypass_above_bytes {
        lines.push(format!(
            "{}Bypass: above {} uploads the original",
            indent(1),
            format_bytes(limit)
        ));
    }
    lines
}

/// Resolved endpoints and every profile.
pub fn format_config(config: &UploadConfig, endpoints: &Endpoints) -> Vec<String> {
    let mut lines = vec![
        "Endpoints".to_string(),
        format!("{}API: {}", indent(1), endpoints.api_url),
        format!("{}Storage: {}", indent(1), endpoints.storage_url),
        String::new(),
        "Profiles".to_string(),
    ];
    for (name, profile) in &config.profiles {
        lines.extend(profile_lines(name, profile).into_iter().map(|l| format!("{}{l}", indent(1))));
    }
    lines
}

pub fn print_config(config: &UploadConfig, endpoints: &Endpoints) {
    for line in format_config(config, endpoints) {
        println!("{}", line);
    }
}
