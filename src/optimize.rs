//! Best-effort SVG minification.
//!
//! Providers are tried in rank order. A missing tool is a normal outcome,
//! not an error: the next provider is tried, and when none succeeds the
//! document is left untouched and the run reports a degraded status.
//!
//! Every provider's output is checked before it replaces the document: it
//! must parse, keep an `svg` root with the same canvas size, keep at least
//! one shape if the input had any, and never gain shapes. Output failing
//! the check is discarded.

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Default wall-clock budget for one external minifier run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Why a single provider produced no usable output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MinifyError {
    #[error("{0} is not installed")]
    Unavailable(String),

    #[error("{tool} failed: {message}")]
    Failed { tool: String, message: String },

    #[error("{0} timed out")]
    TimedOut(String),

    #[error("output rejected: {0}")]
    Rejected(String),
}

/// A string-in/string-out SVG filter.
pub trait Minifier {
    fn name(&self) -> &str;
    fn minify(&self, svg: &str, timeout: Duration) -> Result<String, MinifyError>;
}

/// Built-in providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// External `svgo --multipass`.
    Svgo,
    /// External `scour` with viewboxing, id and comment stripping.
    Scour,
    /// In-process whitespace collapse between tags.
    Compact,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Svgo => "svgo",
            Provider::Scour => "scour",
            Provider::Compact => "compact",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svgo" => Ok(Provider::Svgo),
            "scour" => Ok(Provider::Scour),
            "compact" => Ok(Provider::Compact),
            other => Err(format!(
                "unknown minifier {:?}: expected svgo, scour or compact",
                other
            )),
        }
    }
}

impl Minifier for Provider {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn minify(&self, svg: &str, timeout: Duration) -> Result<String, MinifyError> {
        match self {
            Provider::Svgo => run_filter("svgo", &["--multipass", "-i", "-", "-o", "-"], svg, timeout),
            Provider::Scour => run_filter(
                "scour",
                &[
                    "--enable-viewboxing",
                    "--enable-id-stripping",
                    "--enable-comment-stripping",
                    "--shorten-ids",
                    "--indent=none",
                ],
                svg,
                timeout,
            ),
            Provider::Compact => Ok(compact(svg)),
        }
    }
}

/// Minification settings.
#[derive(Debug, Clone)]
pub struct OptimizeConfig {
    pub enabled: bool,
    /// Providers in rank order.
    pub providers: Vec<Provider>,
    pub timeout: Duration,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            providers: vec![Provider::Svgo, Provider::Scour],
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Result of the post-processing step. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizeOutcome {
    /// A provider's output replaced the document.
    Optimized {
        provider: String,
        before: usize,
        after: usize,
    },
    /// Optimization was switched off.
    Disabled,
    /// No provider produced usable output; the document is untouched.
    Degraded { attempts: Vec<(String, MinifyError)> },
}

/// Try each provider in order on `svg`.
///
/// Returns the document to keep (the original when every provider fails)
/// and the outcome.
pub fn optimize_str(
    svg: &str,
    providers: &[&dyn Minifier],
    timeout: Duration,
) -> (String, OptimizeOutcome) {
    let mut attempts = Vec::new();
    for provider in providers {
        let result = provider
            .minify(svg, timeout)
            .and_then(|candidate| check(svg, &candidate).map(|()| candidate));
        match result {
            Ok(candidate) => {
                let outcome = OptimizeOutcome::Optimized {
                    provider: provider.name().to_string(),
                    before: svg.len(),
                    after: candidate.len(),
                };
                return (candidate, outcome);
            }
            Err(e) => {
                match &e {
                    MinifyError::Unavailable(_) => tracing::debug!("{}", e),
                    _ => tracing::warn!("{} output discarded: {}", provider.name(), e),
                }
                attempts.push((provider.name().to_string(), e));
            }
        }
    }
    (svg.to_string(), OptimizeOutcome::Degraded { attempts })
}

/// Minify the document at `path` in place.
///
/// File errors are folded into a degraded outcome; the pipeline's result
/// never depends on this step.
pub fn optimize_file(path: &Path, config: &OptimizeConfig) -> OptimizeOutcome {
    if !config.enabled || config.providers.is_empty() {
        return OptimizeOutcome::Disabled;
    }
    let original = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            return OptimizeOutcome::Degraded {
                attempts: vec![(
                    "read".into(),
                    MinifyError::Failed {
                        tool: "read".into(),
                        message: e.to_string(),
                    },
                )],
            }
        }
    };

    let providers: Vec<&dyn Minifier> = config.providers.iter().map(|p| p as &dyn Minifier).collect();
    let (optimized, outcome) = optimize_str(&original, &providers, config.timeout);

    match &outcome {
        OptimizeOutcome::Optimized {
            provider,
            before,
            after,
        } => {
            if let Err(e) = std::fs::write(path, &optimized) {
                // A failed rewrite may leave a truncated file; restore.
                let _ = std::fs::write(path, &original);
                return OptimizeOutcome::Degraded {
                    attempts: vec![(
                        provider.clone(),
                        MinifyError::Failed {
                            tool: "write".into(),
                            message: e.to_string(),
                        },
                    )],
                };
            }
            tracing::info!("Optimize    {} {} \u{2192} {} bytes", provider, before, after);
        }
        OptimizeOutcome::Degraded { attempts } => {
            let tried: Vec<&str> = attempts.iter().map(|(name, _)| name.as_str()).collect();
            tracing::info!("Optimize    skipped (tried {})", tried.join(", "));
        }
        OptimizeOutcome::Disabled => {}
    }
    outcome
}

// ── Output guard ─────────────────────────────────────────

/// Verify a minifier did not corrupt the document.
pub fn check(original: &str, candidate: &str) -> Result<(), MinifyError> {
    let before = Summary::parse(original)
        .ok_or_else(|| MinifyError::Rejected("original is not a valid SVG".into()))?;
    let after = Summary::parse(candidate)
        .ok_or_else(|| MinifyError::Rejected("output is not a valid SVG".into()))?;

    if before.canvas != after.canvas {
        return Err(MinifyError::Rejected(format!(
            "canvas changed from {:?} to {:?}",
            before.canvas, after.canvas
        )));
    }
    if before.shapes > 0 && after.shapes == 0 {
        return Err(MinifyError::Rejected("all shapes removed".into()));
    }
    if after.shapes > before.shapes {
        return Err(MinifyError::Rejected(format!(
            "shape count grew from {} to {}",
            before.shapes, after.shapes
        )));
    }
    Ok(())
}

const SHAPE_TAGS: [&str; 3] = ["path", "rect", "polygon"];

struct Summary {
    /// Canvas size from the viewBox, or width/height when there is none.
    canvas: Option<(f64, f64)>,
    /// Painted shapes. svgo rewrites `rect` as `path`, so both count.
    shapes: usize,
}

impl Summary {
    fn parse(svg: &str) -> Option<Self> {
        let doc = roxmltree::Document::parse(svg).ok()?;
        let root = doc.root_element();
        if root.tag_name().name() != "svg" {
            return None;
        }
        let from_view_box = root.attribute("viewBox").and_then(|vb| {
            let nums: Vec<f64> = vb
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse().ok())
                .collect();
            (nums.len() == 4).then(|| (nums[2], nums[3]))
        });
        let from_size = || {
            let w = root.attribute("width")?.trim_end_matches("px").parse().ok()?;
            let h = root.attribute("height")?.trim_end_matches("px").parse().ok()?;
            Some((w, h))
        };
        Some(Self {
            canvas: from_view_box.or_else(from_size),
            shapes: doc
                .descendants()
                .filter(|n| SHAPE_TAGS.iter().any(|&tag| n.has_tag_name(tag)))
                .count(),
        })
    }
}

// ── Providers ────────────────────────────────────────────

/// Collapse whitespace: runs between `>` and `<` vanish, other runs
/// become a single space. Applying it twice changes nothing.
pub fn compact(svg: &str) -> String {
    let mut out = String::with_capacity(svg.len());
    let mut chars = svg.trim().chars().peekable();
    while let Some(c) = chars.next() {
        if !c.is_whitespace() {
            out.push(c);
            continue;
        }
        while chars.peek().is_some_and(|n| n.is_whitespace()) {
            chars.next();
        }
        let between_tags = out.ends_with('>') && chars.peek() == Some(&'<');
        if !between_tags {
            out.push(' ');
        }
    }
    out
}

/// Kills and reaps the child unless it already exited.
struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(None) = self.0.try_wait() {
            let _ = self.0.kill();
            let _ = self.0.wait();
        }
    }
}

/// Pipe `input` through an external filter with a wall-clock timeout.
fn run_filter(
    program: &str,
    args: &[&str],
    input: &str,
    timeout: Duration,
) -> Result<String, MinifyError> {
    let failed = |message: String| MinifyError::Failed {
        tool: program.to_string(),
        message,
    };

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MinifyError::Unavailable(program.to_string()),
            _ => failed(e.to_string()),
        })?;
    let mut guard = ChildGuard(child);

    let mut stdin = guard.0.stdin.take().ok_or_else(|| failed("no stdin".into()))?;
    let mut stdout = guard.0.stdout.take().ok_or_else(|| failed("no stdout".into()))?;
    let mut stderr = guard.0.stderr.take().ok_or_else(|| failed("no stderr".into()))?;

    let payload = input.to_owned();
    let writer = thread::spawn(move || stdin.write_all(payload.as_bytes()));
    let reader = thread::spawn(move || {
        let mut buf = String::new();
        stdout.read_to_string(&mut buf).map(|_| buf)
    });
    let err_reader = thread::spawn(move || {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf);
        buf
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match guard.0.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                // Dropping the guard kills and reaps; the pipe threads then see EOF.
                drop(guard);
                return Err(MinifyError::TimedOut(program.to_string()));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(failed(e.to_string())),
        }
    };

    let _ = writer.join();
    let output = reader
        .join()
        .map_err(|_| failed("stdout reader panicked".into()))?
        .map_err(|e| failed(e.to_string()))?;
    let diagnostics = err_reader.join().unwrap_or_default();

    if !status.success() {
        return Err(failed(format!("{}: {}", status, diagnostics.trim())));
    }
    if output.trim().is_empty() {
        return Err(failed("empty output".into()));
    }
    Ok(output)
}
