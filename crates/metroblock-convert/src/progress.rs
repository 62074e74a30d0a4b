use crate::report::RegionOutcome;
use metroblock_common::{ChunkPos, RegionPos};
use std::fmt;
use uuid::Uuid;

/// Stage a region is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reading,
    Smoothing,
    Composing,
    Writing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Reading => "reading",
            Phase::Smoothing => "smoothing",
            Phase::Composing => "composing",
            Phase::Writing => "writing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    RunStarted { run_id: Uuid, regions: usize },
    RegionStarted { region: RegionPos, chunks: usize },
    RegionPhase { region: RegionPos, phase: Phase },
    ChunkSealed { chunk: ChunkPos, defaulted: bool },
    RegionFinished { region: RegionPos, outcome: RegionOutcome },
    RunFinished { run_id: Uuid, failed: usize },
}

/// Receives pipeline progress. Called from the orchestrating task, so
/// implementations should return quickly.
pub trait ProgressListener: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressListener for NoProgress {
    fn on_event(&self, _event: &ProgressEvent) {}
}
