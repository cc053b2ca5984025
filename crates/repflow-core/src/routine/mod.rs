mod model;
mod position;
pub mod sequence;

pub use model::{
    Activity, ActivityKind, Block, BlockKind, Measurement, MeasurementKind, Routine,
};
pub use position::Position;
pub use sequence::{generate, position_for_index, SequencedActivity};
