//! # Pathlock Core
//!
//! Deterministic puzzle core for Pathlock.
//!
//! Players draw cardinal-direction paths for several agents on a shared
//! grid. Once every path is committed, all agents move at once; if two of
//! them come within the collision radius before reaching a goal, the
//! attempt fails.
//!
//! This crate contains **only** game logic:
//! - No rendering
//! - No input handling
//! - No system randomness
//! - No floating-point simulation math (uses fixed-point)
//!
//! Level files are the one piece of IO: they are parsed from RON and their
//! decimals converted to fixed-point once, at load time.
//!
//! ## Crate Structure
//!
//! - [`grid`] - Grid cells, directions, and the world mapper
//! - [`level`] - Level files, validation, and the loaded level context
//! - [`legality`] - Selection legality and full-path validation
//! - [`selection`] - Per-agent path drafting
//! - [`timeline`] - Trajectory simulation
//! - [`collision`] - Batch and live collision prediction
//! - [`orchestrator`] - The move orchestrator state machine
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod agent;
pub mod collision;
pub mod error;
pub mod goals;
pub mod grid;
pub mod legality;
pub mod level;
pub mod math;
pub mod orchestrator;
pub mod selection;
pub mod timeline;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{Agent, AgentColor, AgentId};
    pub use crate::collision::{
        predict, predict_all, AgentSnapshot, CollisionEvent, CollisionKind, LiveCollisionMonitor,
    };
    pub use crate::error::{GameError, LevelValidationError, Result};
    pub use crate::goals::{Goal, GoalType};
    pub use crate::grid::{CellType, Direction, GridCell, GridMap};
    pub use crate::legality::{PathChecker, RejectReason};
    pub use crate::level::{AgentData, GoalData, GridData, LevelContext, LevelData};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::orchestrator::{
        AgentFrame, GameObserver, MoveOrchestrator, NullObserver, Phase, TickEvents,
    };
    pub use crate::selection::{PathBook, SelectionOutcome};
    pub use crate::timeline::{
        interpolated_position_at, position_at_time, simulate, total_move_time, Easing,
        MotionSettings, Timeline, TimelineSample,
    };
}
