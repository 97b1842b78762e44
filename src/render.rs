//! Terminal rendering of a retrieval trace
//!
//! Each known step gets a label, optional timing badge and a short body.
//! Unknown steps render nothing.

use colored::Colorize;

use crate::rag::trace::{StepTiming, TracePayload, TraceStep};

/// One step prepared for display
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStep {
    pub label: &'static str,
    pub badge: Option<String>,
    pub body: Vec<String>,
    pub is_error: bool,
}

/// Timing badge, e.g. `230 ms · 180 ms this step`.
///
/// No badge without `elapsedMs`; a lone duration is not shown.
pub fn timing_badge(timing: StepTiming) -> Option<String> {
    match (timing.elapsed_ms, timing.duration_ms) {
        (None, _) => None,
        (Some(elapsed), None) => Some(format!("{} ms", elapsed)),
        (Some(elapsed), Some(duration)) => Some(format!("{} ms · {} ms this step", elapsed, duration)),
    }
}

/// Body lines for a step; `None` for steps this build does not know
fn step_body(step: &TraceStep) -> Option<Vec<String>> {
    let body = match step {
        TraceStep::Query { query, .. } => vec![format!("\"{}\"", query)],
        TraceStep::Config { message, .. }
        | TraceStep::EmbedError { message, .. }
        | TraceStep::VectorSearchError { message, .. }
        | TraceStep::Timeout { message }
        | TraceStep::TimeoutDiagnosis { message, .. } => vec![message.clone()],
        TraceStep::Embedding { dimensions, .. } => vec![format!("{} dimensions", dimensions)],
        TraceStep::VectorSearch {
            num_candidates,
            limit,
            ..
        } => vec![format!("numCandidates={}, limit={}", num_candidates, limit)],
        TraceStep::Chunks { count, chunks, .. } => {
            let mut lines = vec![format!(
                "{} chunk{} retrieved",
                count,
                if *count == 1 { "" } else { "s" }
            )];
            for (idx, chunk) in chunks.iter().enumerate() {
                let score = chunk
                    .score
                    .map(|s| format!("score {:.4} - ", s))
                    .unwrap_or_default();
                lines.push(format!("  {}. {}{}", idx + 1, score, chunk.preview));
            }
            lines
        }
        TraceStep::Context {
            formatted_length,
            snippet,
            ..
        } => {
            let mut lines = vec![format!("{} chars sent to model", formatted_length)];
            lines.extend(snippet.lines().map(|l| format!("  | {}", l)));
            lines
        }
        TraceStep::Unknown => return None,
    };
    Some(body)
}

/// Prepare every known step for display, in order
pub fn render_steps(payload: &TracePayload) -> Vec<RenderedStep> {
    payload
        .steps
        .iter()
        .filter_map(|step| {
            step_body(step).map(|body| RenderedStep {
                label: step.label(),
                badge: timing_badge(step.timing()),
                body,
                is_error: step.is_error(),
            })
        })
        .collect()
}

/// Plain-text rendering
pub fn render_trace(payload: &TracePayload) -> String {
    let mut out = String::new();
    for step in render_steps(payload) {
        out.push_str(step.label);
        if let Some(badge) = &step.badge {
            out.push_str(&format!("  [{}]", badge));
        }
        out.push('\n');
        for line in &step.body {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Print the trace with colors
pub fn print_trace(payload: &TracePayload) {
    println!("\n{}", "RAG trace".bold());
    println!("─────────────────────────────────────");
    for step in render_steps(payload) {
        let label = if step.is_error {
            step.label.red().bold()
        } else {
            step.label.cyan().bold()
        };
        match &step.badge {
            Some(badge) => println!("{}  {}", label, badge.dimmed()),
            None => println!("{}", label),
        }
        for line in &step.body {
            if step.is_error {
                println!("    {}", line.red());
            } else {
                println!("    {}", line);
            }
        }
    }
    println!();
}
