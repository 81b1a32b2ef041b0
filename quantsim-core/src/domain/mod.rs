//! Domain types: bars, series, synchronizers, positions, containers.

pub mod bar;
pub mod container;
pub mod position;
pub mod series;

pub use bar::{Bar, Bars, ErrorHandlingMode};
pub use container::PositionsContainer;
pub use position::{
    AutoStopState, ClosedLeg, OrderType, Position, PositionError, PositionId, PositionSide,
};
pub use series::{Series, SeriesError, Synchronizer};
