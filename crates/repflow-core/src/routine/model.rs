use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RoutineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    #[default]
    Exercise,
    Rest,
}

/// How an activity is finished. The unit lives inside the variant, so a
/// time-based activity can never carry a rep count and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Measurement {
    Time { duration_secs: u32 },
    Reps { count: u32 },
}

impl Measurement {
    pub fn kind(&self) -> MeasurementKind {
        match self {
            Measurement::Time { .. } => MeasurementKind::Time,
            Measurement::Reps { .. } => MeasurementKind::Reps,
        }
    }

    pub fn duration_secs(&self) -> Option<u32> {
        match self {
            Measurement::Time { duration_secs } => Some(*duration_secs),
            Measurement::Reps { .. } => None,
        }
    }

    pub fn is_time(&self) -> bool {
        matches!(self, Measurement::Time { .. })
    }

    pub fn is_reps(&self) -> bool {
        matches!(self, Measurement::Reps { .. })
    }
}

/// Unit-less discriminant of [`Measurement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementKind {
    Time,
    Reps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub kind: ActivityKind,
    pub measurement: Measurement,
}

impl Activity {
    pub fn timed(name: &str, duration_secs: u32) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            icon: None,
            kind: ActivityKind::Exercise,
            measurement: Measurement::Time { duration_secs },
        }
    }

    pub fn reps(name: &str, count: u32) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            icon: None,
            kind: ActivityKind::Exercise,
            measurement: Measurement::Reps { count },
        }
    }

    pub fn rest(duration_secs: u32) -> Self {
        Self {
            kind: ActivityKind::Rest,
            ..Self::timed("Rest", duration_secs)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    #[default]
    Normal,
    Warmup,
    Cooldown,
    InterBlockRest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: BlockKind,
    #[serde(default = "default_repetitions")]
    pub repetitions: u32,
    /// Seconds of rest inserted between consecutive repetitions.
    #[serde(default)]
    pub rest_between_repetitions: Option<u32>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl Block {
    pub fn new(name: &str, repetitions: u32, activities: Vec<Activity>) -> Self {
        Self {
            name: name.to_string(),
            kind: BlockKind::Normal,
            repetitions,
            rest_between_repetitions: None,
            activities,
        }
    }

    pub fn with_rest(mut self, secs: u32) -> Self {
        self.rest_between_repetitions = Some(secs);
        self
    }

    pub fn with_kind(mut self, kind: BlockKind) -> Self {
        self.kind = kind;
        self
    }

    /// Rest seconds actually emitted between repetitions, if any.
    pub fn effective_rest(&self) -> Option<u32> {
        match self.rest_between_repetitions {
            Some(secs) if secs > 0 && self.repetitions > 1 => Some(secs),
            _ => None,
        }
    }

    /// Number of activity positions this block contributes to a run.
    pub fn position_count(&self) -> usize {
        self.activities.len() * self.repetitions as usize
    }
}

/// An ordered sequence of blocks. Treated as immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Routine {
    pub fn new(name: &str, blocks: Vec<Block>) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            blocks,
        }
    }

    /// Parse a routine from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, RoutineError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a routine file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed. The routine is
    /// not validated here; the engine validates on start.
    pub fn load(path: &Path) -> Result<Self, RoutineError> {
        let content = std::fs::read_to_string(path).map_err(|source| RoutineError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Check that the routine can be run.
    ///
    /// # Errors
    ///
    /// Returns the first shape violation found, naming the offending block.
    pub fn validate(&self) -> Result<(), RoutineError> {
        if self.blocks.is_empty() {
            return Err(RoutineError::NoBlocks(self.name.clone()));
        }
        for (block_index, block) in self.blocks.iter().enumerate() {
            if block.activities.is_empty() {
                return Err(RoutineError::EmptyBlock {
                    block_index,
                    block_name: block.name.clone(),
                });
            }
            if block.repetitions == 0 {
                return Err(RoutineError::ZeroRepetitions {
                    block_index,
                    block_name: block.name.clone(),
                });
            }
            for activity in &block.activities {
                let unit = match activity.measurement {
                    Measurement::Time { duration_secs: 0 } => "duration",
                    Measurement::Reps { count: 0 } => "rep count",
                    _ => continue,
                };
                return Err(RoutineError::ZeroMeasurement {
                    block_index,
                    activity: activity.name.clone(),
                    unit,
                });
            }
        }
        Ok(())
    }

    /// Σ activities × repetitions over all blocks.
    pub fn total_positions(&self) -> usize {
        self.blocks.iter().map(Block::position_count).sum()
    }
}

fn default_repetitions() -> u32 {
    1
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
