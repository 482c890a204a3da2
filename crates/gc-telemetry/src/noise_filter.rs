//! Scoped filtering of known third-party log noise.
//!
//! Wallet SDKs, analytics beacons and the encryption relayer emit a steady
//! stream of harmless network errors. `NoiseFilter` is a per-layer
//! `tracing-subscriber` filter that drops events whose message, string fields
//! or target contain one of its patterns. It does nothing until installed and
//! stops filtering when its guard is dropped.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Metadata};
use tracing_subscriber::layer::{Context, Filter};

/// Substrings suppressed by default.
pub const DEFAULT_NOISE_PATTERNS: &[&str] = &[
    "Cross-Origin-Opener-Policy",
    "Failed to fetch",
    "Failed to load resource",
    "Analytics SDK",
    "cca-lite.coinbase.com",
    "NotSameOriginAfterDefaultedToSameOriginByCoep",
    "ERR_BLOCKED_BY_RESPONSE",
    "relayer.testnet.zama.cloud",
    "ERR_CONNECTION_CLOSED",
    "relayer-sdk-js.umd.cjs",
];

struct NoiseFilterInner {
    installed: AtomicBool,
    patterns: RwLock<Vec<String>>,
}

/// Per-layer filter dropping events that match a noise pattern.
#[derive(Clone)]
pub struct NoiseFilter {
    inner: Arc<NoiseFilterInner>,
}

impl NoiseFilter {
    /// Filter with the given patterns, not yet installed.
    pub fn new<I, P>(patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            inner: Arc::new(NoiseFilterInner {
                installed: AtomicBool::new(false),
                patterns: RwLock::new(patterns.into_iter().map(Into::into).collect()),
            }),
        }
    }

    /// Filter with `DEFAULT_NOISE_PATTERNS`, not yet installed.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_NOISE_PATTERNS.iter().copied())
    }

    /// Start suppressing. Filtering stops when the guard is dropped.
    #[must_use = "dropping the guard uninstalls the filter"]
    pub fn install(&self) -> NoiseFilterGuard {
        self.inner.installed.store(true, Ordering::SeqCst);
        NoiseFilterGuard {
            filter: self.clone(),
        }
    }

    /// Whether matching events are currently dropped.
    pub fn is_installed(&self) -> bool {
        self.inner.installed.load(Ordering::SeqCst)
    }

    /// Add a pattern.
    pub fn add_pattern(&self, pattern: impl Into<String>) {
        self.inner.patterns.write().push(pattern.into());
    }

    /// True if `text` contains any pattern.
    pub fn matches(&self, text: &str) -> bool {
        self.inner
            .patterns
            .read()
            .iter()
            .any(|p| !p.is_empty() && text.contains(p.as_str()))
    }

    fn suppresses(&self, event: &Event<'_>) -> bool {
        if !self.is_installed() {
            return false;
        }
        if self.matches(event.metadata().target()) {
            return true;
        }
        let mut visitor = TextVisitor::default();
        event.record(&mut visitor);
        visitor.values.iter().any(|v| self.matches(v))
    }
}

impl fmt::Debug for NoiseFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoiseFilter")
            .field("installed", &self.is_installed())
            .field("patterns", &self.inner.patterns.read().len())
            .finish()
    }
}

impl<S> Filter<S> for NoiseFilter {
    fn enabled(&self, _meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        true
    }

    fn event_enabled(&self, event: &Event<'_>, _cx: &Context<'_, S>) -> bool {
        !self.suppresses(event)
    }
}

/// Keeps a `NoiseFilter` installed.
#[derive(Debug)]
pub struct NoiseFilterGuard {
    filter: NoiseFilter,
}

impl Drop for NoiseFilterGuard {
    fn drop(&mut self) {
        self.filter.inner.installed.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct TextVisitor {
    values: Vec<String>,
}

impl Visit for TextVisitor {
    fn record_str(&mut self, _field: &Field, value: &str) {
        self.values.push(value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.values.push(format!("{value:?}"));
        }
    }
}
