//! Status events and cooperative cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, TopoError};

/// Points in a run that are reported to a `ProgressObserver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    ResampleStart,
    SlopeStart,
    TpiStart,
    TriStart,
    HillshadeStart,
    CompositeStart,
    WriteStart,
    Completed,
    Aborted,
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Milestone::ResampleStart => "resampling elevation",
            Milestone::SlopeStart => "computing slope",
            Milestone::TpiStart => "computing TPI",
            Milestone::TriStart => "computing TRI",
            Milestone::HillshadeStart => "computing hillshade",
            Milestone::CompositeStart => "compositing",
            Milestone::WriteStart => "writing outputs",
            Milestone::Completed => "completed",
            Milestone::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Receives milestones as a run progresses. Nothing the engine returns depends
/// on what an observer does with them.
pub trait ProgressObserver: Send + Sync {
    fn milestone(&self, milestone: Milestone);
}

/// Logs every milestone at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn milestone(&self, milestone: Milestone) {
        match milestone {
            Milestone::Aborted => tracing::warn!("{}", milestone),
            _ => tracing::info!("{}", milestone),
        }
    }
}

/// Discards every milestone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn milestone(&self, _milestone: Milestone) {}
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(TopoError::Cancelled)` once cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TopoError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());
        other.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(TopoError::Cancelled)));
    }

    #[test]
    fn cancel_from_another_thread() {
        let token = CancelToken::new();
        let handler = token.clone();
        std::thread::spawn(move || handler.cancel()).join().unwrap();
        assert!(matches!(token.check(), Err(TopoError::Cancelled)));
    }
}
