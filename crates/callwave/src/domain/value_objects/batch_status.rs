//! BatchStatus - aggregate status of a call batch

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Created,
    Dispatching,
    Completed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Created => "created",
            BatchStatus::Dispatching => "dispatching",
            BatchStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "created" => Ok(BatchStatus::Created),
            "dispatching" => Ok(BatchStatus::Dispatching),
            "completed" => Ok(BatchStatus::Completed),
            _ => Err(format!("Unknown batch status: {}", s)),
        }
    }
}
