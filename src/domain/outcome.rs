use std::fmt;
use std::path::PathBuf;

/// Why a fetch failed. Failures are reported as values inside
/// [`FetchResult`], never as panics or propagated errors; the caller checks
/// the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The candidate string does not match the supported URL grammar.
    NotAUrl,
    /// DNS, connect, TLS, or timeout failure before or during transfer.
    Transport(String),
    /// The server was reached but answered with a non-200/304 status.
    HttpStatus(u16),
    /// HTTP 200 but the content type failed the configured allow-list.
    ContentType(String),
    /// Local filesystem failure (cache dir, staging file, promotion).
    LocalIo(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAUrl => write!(f, "not a fetchable URL"),
            Self::Transport(e) => write!(f, "transport failure: {}", e),
            Self::HttpStatus(status) => write!(f, "HTTP status {}", status),
            Self::ContentType(ct) => write!(f, "unexpected content type: {}", ct),
            Self::LocalIo(e) => write!(f, "local IO failure: {}", e),
        }
    }
}

/// Tagged outcome of a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Fresh content was retrieved (HTTP 200) and promoted into the cache.
    Fetched {
        status: u16,
        content_type: Option<String>,
        duration_ms: u64,
    },
    /// The origin answered 304 Not Modified; the cached copy is current.
    CacheHit { duration_ms: u64 },
    /// The fetch did not produce usable content.
    Failed {
        reason: FailureReason,
        status: Option<u16>,
        duration_ms: u64,
    },
}

/// What a fetch hands back to the caller: the outcome plus the local file
/// path (when one exists) and cleanup ownership.
///
/// Lifecycle: `Pending -> (Succeeded | Failed) -> Released`. `Released` is
/// reached only through [`FetchResult::release`], which deletes the local
/// file iff `needs_unlink` is set. Release is idempotent.
#[derive(Debug)]
pub struct FetchResult {
    pub outcome: FetchOutcome,
    /// Local readable path of the fetched or cached content. `None` on
    /// failure paths that left nothing behind.
    pub local_path: Option<PathBuf>,
    /// `true` when the file is a throwaway artifact the caller owns;
    /// `false` when it is a durable cache slot the engine owns.
    pub needs_unlink: bool,
    released: bool,
}

impl FetchResult {
    pub(crate) fn new(outcome: FetchOutcome, local_path: Option<PathBuf>, needs_unlink: bool) -> Self {
        Self {
            outcome,
            local_path,
            needs_unlink,
            released: false,
        }
    }

    pub(crate) fn failed(
        reason: FailureReason,
        status: Option<u16>,
        duration_ms: u64,
    ) -> Self {
        Self::new(
            FetchOutcome::Failed {
                reason,
                status,
                duration_ms,
            },
            None,
            false,
        )
    }

    pub fn succeeded(&self) -> bool {
        matches!(
            self.outcome,
            FetchOutcome::Fetched { .. } | FetchOutcome::CacheHit { .. }
        )
    }

    /// HTTP status code, when a server was reached.
    pub fn status(&self) -> Option<u16> {
        match &self.outcome {
            FetchOutcome::Fetched { status, .. } => Some(*status),
            FetchOutcome::CacheHit { .. } => Some(304),
            FetchOutcome::Failed { status, .. } => *status,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Fetched { content_type, .. } => content_type.as_deref(),
            _ => None,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        match &self.outcome {
            FetchOutcome::Fetched { duration_ms, .. }
            | FetchOutcome::CacheHit { duration_ms }
            | FetchOutcome::Failed { duration_ms, .. } => *duration_ms,
        }
    }

    /// Release the result: delete the local file if this result owns it.
    /// Safe to call more than once; the second call is a no-op.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if self.needs_unlink {
            if let Some(path) = &self.local_path {
                if let Err(e) = std::fs::remove_file(path) {
                    tracing::warn!("failed to unlink {}: {}", path.display(), e);
                }
            }
        }
    }
}
