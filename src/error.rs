use std::{io, path::PathBuf};

use thiserror::Error;

use crate::types::{PeriodKey, PointId};

/// Fatal failures: the animation is aborted and every timer cancelled.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("scheduler rejected a task: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("duplicate point id `{id}`")]
    DuplicatePoint { id: PointId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("scheduler is closed")]
    Closed,
    #[error("scheduler has no room for more timers")]
    Exhausted,
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Irregular magnitude data. The affected point is scaled as zero.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("point `{id}` has an empty magnitude series")]
    EmptySeries { id: PointId },
    #[error("point `{id}` has a non-numeric value for period {period}")]
    NonNumeric { id: PointId, period: PeriodKey },
    #[error("point `{id}` has a negative value for period {period}")]
    Negative { id: PointId, period: PeriodKey },
    #[error("point `{id}` has no value for period {period}")]
    MissingPeriod { id: PointId, period: PeriodKey },
}

/// Grouping problems. The affected point is pinned to the fallback focus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("point `{id}` references group `{group}` which has no focus")]
    UnknownGroup { id: PointId, group: String },
}
