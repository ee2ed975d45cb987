use std::fmt;

use hoard_types::{AFile, Hour};

/// A divergence found by the audit.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Problem {
    /// The hour holds more than one AFile across the replicas.
    UnmergedHour { hour: Hour },
    /// The hour exists in some replica but not in the replica at `replica`.
    NonReplicatedData { hour: Hour, replica: usize },
    /// The hour's only AFile is not in the configured compression format.
    IncorrectCompression { hour: Hour, afile: AFile },
}

impl Problem {
    pub fn hour(&self) -> Hour {
        match self {
            Problem::UnmergedHour { hour }
            | Problem::NonReplicatedData { hour, .. }
            | Problem::IncorrectCompression { hour, .. } => *hour,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Problem::UnmergedHour { .. } => "unmerged hour",
            Problem::NonReplicatedData { .. } => "non-replicated data",
            Problem::IncorrectCompression { .. } => "incorrect compression",
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::UnmergedHour { hour } => write!(f, "unmerged hour {hour}"),
            Problem::NonReplicatedData { hour, replica } => {
                write!(f, "non-replicated data for hour {hour} (missing from replica {replica})")
            }
            Problem::IncorrectCompression { afile, .. } => {
                write!(f, "incorrect compression for {afile}")
            }
        }
    }
}
