use serde::{Deserialize, Serialize};

use super::model::{Activity, Routine};

/// A block / repetition / activity triple inside a routine.
///
/// `repetition_index` is 0-based; user-facing repetition numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Position {
    pub block_index: usize,
    pub repetition_index: u32,
    pub activity_index: usize,
}

impl Position {
    pub const START: Position = Position {
        block_index: 0,
        repetition_index: 0,
        activity_index: 0,
    };

    pub fn new(block_index: usize, repetition_index: u32, activity_index: usize) -> Self {
        Self {
            block_index,
            repetition_index,
            activity_index,
        }
    }

    /// 1-based repetition number.
    pub fn repetition_number(&self) -> u32 {
        self.repetition_index + 1
    }
}

impl Routine {
    pub fn activity_at(&self, pos: Position) -> Option<&Activity> {
        let block = self.blocks.get(pos.block_index)?;
        if pos.repetition_index >= block.repetitions {
            return None;
        }
        block.activities.get(pos.activity_index)
    }

    /// Whether `pos` is the last activity of the last repetition of the last block.
    pub fn is_terminal(&self, pos: Position) -> bool {
        self.next_position(pos).is_none()
    }

    /// The position that follows `pos`: next activity in the repetition,
    /// else first activity of the next repetition, else first activity of
    /// the next non-empty block.
    pub fn next_position(&self, pos: Position) -> Option<Position> {
        let block = self.blocks.get(pos.block_index)?;
        if pos.activity_index + 1 < block.activities.len() {
            return Some(Position {
                activity_index: pos.activity_index + 1,
                ..pos
            });
        }
        if pos.repetition_index + 1 < block.repetitions {
            return Some(Position {
                repetition_index: pos.repetition_index + 1,
                activity_index: 0,
                ..pos
            });
        }
        self.blocks
            .iter()
            .enumerate()
            .skip(pos.block_index + 1)
            .find(|(_, b)| !b.activities.is_empty() && b.repetitions > 0)
            .map(|(block_index, _)| Position::new(block_index, 0, 0))
    }

    /// Number of positions strictly before `pos` in execution order.
    pub fn positions_before(&self, pos: Position) -> usize {
        let prior_blocks: usize = self
            .blocks
            .iter()
            .take(pos.block_index)
            .map(|b| b.position_count())
            .sum();
        let per_rep = self
            .blocks
            .get(pos.block_index)
            .map(|b| b.activities.len())
            .unwrap_or(0);
        prior_blocks + pos.repetition_index as usize * per_rep + pos.activity_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routine::{Activity, Block};

    fn routine() -> Routine {
        Routine::new(
            "Nav",
            vec![
                Block::new("A", 2, vec![Activity::timed("a1", 10), Activity::timed("a2", 10)]),
                Block::new("B", 1, vec![Activity::reps("b1", 5)]),
            ],
        )
    }

    #[test]
    fn next_position_walks_activity_then_repetition_then_block() {
        let r = routine();
        let mut pos = Position::START;
        let mut visited = vec![pos];
        while let Some(next) = r.next_position(pos) {
            visited.push(next);
            pos = next;
        }
        assert_eq!(
            visited,
            vec![
                Position::new(0, 0, 0),
                Position::new(0, 0, 1),
                Position::new(0, 1, 0),
                Position::new(0, 1, 1),
                Position::new(1, 0, 0),
            ]
        );
        assert!(r.is_terminal(Position::new(1, 0, 0)));
        assert!(!r.is_terminal(Position::new(0, 1, 1)));
    }

    #[test]
    fn positions_before_counts_completed_positions() {
        let r = routine();
        assert_eq!(r.positions_before(Position::START), 0);
        assert_eq!(r.positions_before(Position::new(0, 1, 1)), 3);
        assert_eq!(r.positions_before(Position::new(1, 0, 0)), 4);
        assert_eq!(r.total_positions(), 5);
    }

    #[test]
    fn activity_at_rejects_out_of_range_repetition() {
        let r = routine();
        assert!(r.activity_at(Position::new(0, 1, 0)).is_some());
        assert!(r.activity_at(Position::new(0, 2, 0)).is_none());
        assert!(r.activity_at(Position::new(5, 0, 0)).is_none());
    }
}
