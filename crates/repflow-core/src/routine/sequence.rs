//! Flattened, read-only view of a routine.
//!
//! The live engine walks the routine directly; this expansion exists for
//! previews and for picking a starting point before a run begins.

use serde::{Deserialize, Serialize};

use super::model::{Activity, Routine};
use super::position::Position;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedActivity {
    pub sequence_index: usize,
    pub block_index: usize,
    /// 1-based.
    pub block_repetition_number: u32,
    /// Index inside the block; `None` for synthetic inter-repetition rests.
    pub activity_index: Option<usize>,
    pub is_inter_repetition_rest: bool,
    pub activity: Activity,
}

impl SequencedActivity {
    /// The execution position of this entry. Rest entries have none.
    pub fn position(&self) -> Option<Position> {
        self.activity_index.map(|activity_index| Position {
            block_index: self.block_index,
            repetition_index: self.block_repetition_number - 1,
            activity_index,
        })
    }
}

/// Expand block repetitions into a flat list, inserting a rest entry between
/// consecutive repetitions of blocks that ask for one.
pub fn generate(routine: &Routine) -> Vec<SequencedActivity> {
    let mut out = Vec::new();
    for (block_index, block) in routine.blocks.iter().enumerate() {
        for rep in 0..block.repetitions {
            for (activity_index, activity) in block.activities.iter().enumerate() {
                out.push(SequencedActivity {
                    sequence_index: out.len(),
                    block_index,
                    block_repetition_number: rep + 1,
                    activity_index: Some(activity_index),
                    is_inter_repetition_rest: false,
                    activity: activity.clone(),
                });
            }
            let is_last_rep = rep + 1 == block.repetitions;
            if let (false, Some(secs)) = (is_last_rep, block.effective_rest()) {
                let mut rest = Activity::rest(secs);
                rest.id = format!("rest-{}-{}", block_index, rep + 1);
                out.push(SequencedActivity {
                    sequence_index: out.len(),
                    block_index,
                    block_repetition_number: rep + 1,
                    activity_index: None,
                    is_inter_repetition_rest: true,
                    activity: rest,
                });
            }
        }
    }
    out
}

/// Translate a generator index back into an execution position.
///
/// A rest entry resolves to the first activity after it. Returns `None` for
/// an index past the end.
pub fn position_for_index(routine: &Routine, sequence_index: usize) -> Option<Position> {
    generate(routine)
        .into_iter()
        .skip(sequence_index)
        .find_map(|entry| entry.position())
}

/// Total seconds of all time-based entries, rests included.
pub fn total_duration_secs(sequence: &[SequencedActivity]) -> u64 {
    sequence
        .iter()
        .filter_map(|s| s.activity.measurement.duration_secs())
        .map(u64::from)
        .sum()
}
