//! Trajectory simulation: from a grid path to a time-sampled trace.
//!
//! A timeline is a pure function of the path, the grid mapper and the
//! motion settings. Identical inputs always produce identical samples,
//! which is what lets batch prediction act as ground truth for live play.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::grid::{GridCell, GridMap};
use crate::math::{fixed_decimal, Fixed, Vec2Fixed};

/// Progress curve applied within each segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Easing {
    /// Constant speed.
    #[default]
    Linear,
    /// Ease in and out: `3t² - 2t³`.
    SmoothStep,
}

impl Easing {
    /// Map linear progress `t` in `[0, 1]` onto the curve.
    #[must_use]
    pub fn apply(self, t: Fixed) -> Fixed {
        match self {
            Self::Linear => t,
            Self::SmoothStep => t * t * (Fixed::from_num(3) - Fixed::from_num(2) * t),
        }
    }

    /// Steepest slope of the curve, as a multiple of the linear speed.
    #[must_use]
    pub fn peak_slope(self) -> Fixed {
        match self {
            Self::Linear => Fixed::ONE,
            // d/dt (3t² - 2t³) = 6t - 6t², largest at t = 0.5.
            Self::SmoothStep => Fixed::from_num(3) / Fixed::from_num(2),
        }
    }
}

/// Motion and collision tuning shared by simulation, prediction and
/// playback.
///
/// Distances are in cell sizes, times in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    /// World units per second.
    #[serde(with = "fixed_decimal")]
    pub speed: Fixed,
    /// Spacing between timeline samples.
    #[serde(with = "fixed_decimal")]
    pub time_step: Fixed,
    /// Pause at each interior waypoint.
    #[serde(with = "fixed_decimal")]
    pub dwell: Fixed,
    /// Progress curve within a segment.
    pub easing: Easing,
    /// Agents closer than this collide.
    #[serde(with = "fixed_decimal")]
    pub collision_threshold: Fixed,
    /// Collisions closer than this are labelled same-tile.
    #[serde(with = "fixed_decimal")]
    pub same_tile_threshold: Fixed,
    /// Extra sample spacing used by batch prediction.
    #[serde(with = "fixed_decimal")]
    pub coarse_interval: Fixed,
    /// Delay between all paths being ready and motion starting.
    /// `None` waits for an explicit start.
    pub start_delay: Option<StartDelay>,
}

/// Wrapper so the optional start delay can be written as a decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StartDelay(#[serde(with = "fixed_decimal")] pub Fixed);

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            speed: Fixed::from_num(2),
            time_step: Fixed::from_num(0.1),
            dwell: Fixed::from_num(0.1),
            easing: Easing::Linear,
            collision_threshold: Fixed::from_num(0.3),
            same_tile_threshold: Fixed::from_num(0.1),
            coarse_interval: Fixed::from_num(0.2),
            start_delay: Some(StartDelay(Fixed::ONE)),
        }
    }
}

impl MotionSettings {
    /// Settings with the given speed.
    pub fn with_speed(mut self, speed: Fixed) -> Self {
        self.speed = speed;
        self
    }

    /// Settings with the given sample spacing.
    pub fn with_time_step(mut self, time_step: Fixed) -> Self {
        self.time_step = time_step;
        self
    }

    /// Settings with the given waypoint pause.
    pub fn with_dwell(mut self, dwell: Fixed) -> Self {
        self.dwell = dwell;
        self
    }

    /// Settings with the given easing.
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Settings with the given collision threshold, in cell sizes.
    pub fn with_collision_threshold(mut self, threshold: Fixed) -> Self {
        self.collision_threshold = threshold;
        self
    }

    /// Settings with the given start delay; `None` requires an explicit start.
    pub fn with_start_delay(mut self, delay: Option<Fixed>) -> Self {
        self.start_delay = delay.map(StartDelay);
        self
    }

    /// Check that every interval and threshold is usable.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("speed", self.speed),
            ("time_step", self.time_step),
            ("collision_threshold", self.collision_threshold),
            ("coarse_interval", self.coarse_interval),
        ];
        for (name, value) in positive {
            if value <= Fixed::ZERO {
                return Err(GameError::InvalidState(format!("{name} must be positive, got {value}")));
            }
        }
        if self.dwell < Fixed::ZERO || self.same_tile_threshold < Fixed::ZERO {
            return Err(GameError::InvalidState("dwell and same_tile_threshold must not be negative".into()));
        }
        if self.start_delay.is_some_and(|d| d.0 < Fixed::ZERO) {
            return Err(GameError::InvalidState("start_delay must not be negative".into()));
        }
        Ok(())
    }
}

/// One sample of a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimelineSample {
    /// Seconds since motion started.
    pub time: Fixed,
    /// World position.
    pub position: Vec2Fixed,
}

/// Time-sampled positions of one agent along its path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Timeline {
    samples: Vec<TimelineSample>,
    time_step: Fixed,
    /// Time each waypoint after the first is reached.
    arrivals: Vec<Fixed>,
}

impl Timeline {
    /// All samples, in time order.
    #[must_use]
    pub fn samples(&self) -> &[TimelineSample] {
        &self.samples
    }

    /// True for paths that do not move.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Sample spacing.
    #[must_use]
    pub fn time_step(&self) -> Fixed {
        self.time_step
    }

    /// Time of the last sample; zero for an empty timeline.
    #[must_use]
    pub fn duration(&self) -> Fixed {
        self.samples.last().map_or(Fixed::ZERO, |s| s.time)
    }

    /// Time at which each waypoint after the start is first reached.
    #[must_use]
    pub fn arrivals(&self) -> &[Fixed] {
        &self.arrivals
    }

    /// Whether the agent is still travelling at time `t`.
    #[must_use]
    pub fn is_moving_at(&self, t: Fixed) -> bool {
        !self.is_empty() && t < self.duration()
    }

    /// Final position, if the timeline has any samples.
    #[must_use]
    pub fn final_position(&self) -> Option<Vec2Fixed> {
        self.samples.last().map(|s| s.position)
    }

    /// Index of the last sample at or before `t`.
    fn index_at(&self, t: Fixed) -> usize {
        if t <= Fixed::ZERO || self.time_step <= Fixed::ZERO {
            return 0;
        }
        let index = (t / self.time_step).floor().saturating_to_num::<usize>();
        index.min(self.samples.len().saturating_sub(1))
    }
}

/// Build the timeline of `path`.
///
/// Paths shorter than two cells produce an empty timeline.
#[must_use]
pub fn simulate(grid: &GridMap, path: &[GridCell], settings: &MotionSettings) -> Timeline {
    let step = settings.time_step;
    debug_assert!(step > Fixed::ZERO, "time_step must be positive");
    if path.len() < 2 || step <= Fixed::ZERO || settings.speed <= Fixed::ZERO {
        return Timeline {
            time_step: step,
            ..Timeline::default()
        };
    }

    let dwell_steps = (settings.dwell / step).round().saturating_to_num::<usize>();
    let segment_count = path.len() - 1;
    let mut positions: Vec<Vec2Fixed> = Vec::new();
    let mut arrival_indices = Vec::with_capacity(segment_count);

    for (segment, pair) in path.windows(2).enumerate() {
        let start = grid.to_world(pair[0]);
        let end = grid.to_world(pair[1]);
        let duration = start.distance(end) / settings.speed;
        let steps = if duration > Fixed::ZERO {
            (duration / step).ceil().saturating_to_num::<usize>() + 1
        } else {
            1
        };

        for k in 0..steps {
            if segment > 0 && k == 0 {
                continue;
            }
            let position = if k == steps - 1 {
                end
            } else {
                let t = (Fixed::from_num(k) * step / duration).clamp(Fixed::ZERO, Fixed::ONE);
                start.lerp(end, settings.easing.apply(t))
            };
            positions.push(position);
        }
        arrival_indices.push(positions.len() - 1);

        if segment + 1 < segment_count {
            positions.extend(std::iter::repeat(end).take(dwell_steps));
        }
    }

    let time_of = |i: usize| Fixed::from_num(i) * step;
    Timeline {
        samples: positions
            .into_iter()
            .enumerate()
            .map(|(i, position)| TimelineSample {
                time: time_of(i),
                position,
            })
            .collect(),
        time_step: step,
        arrivals: arrival_indices.into_iter().map(time_of).collect(),
    }
}

/// Analytic travel time of `path`, including dwell at interior waypoints.
#[must_use]
pub fn total_move_time(grid: &GridMap, path: &[GridCell], settings: &MotionSettings) -> Fixed {
    if path.len() < 2 || settings.speed <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    let travel = path.windows(2).fold(Fixed::ZERO, |acc, pair| {
        acc + grid.to_world(pair[0]).distance(grid.to_world(pair[1])) / settings.speed
    });
    let interior = Fixed::from_num(path.len() - 2);
    travel + settings.dwell * interior
}

/// Position of the last sample at or before `t`.
///
/// Past the end this is the final waypoint. `None` for an empty timeline.
#[must_use]
pub fn position_at_time(timeline: &Timeline, t: Fixed) -> Option<Vec2Fixed> {
    timeline
        .samples
        .get(timeline.index_at(t))
        .map(|s| s.position)
}

/// Position at `t`, blended linearly between the bracketing samples.
///
/// Clamps to the first and last samples outside the timeline.
#[must_use]
pub fn interpolated_position_at(timeline: &Timeline, t: Fixed) -> Option<Vec2Fixed> {
    let index = timeline.index_at(t);
    let current = timeline.samples.get(index)?;
    let Some(next) = timeline.samples.get(index + 1) else {
        return Some(current.position);
    };
    if t <= current.time {
        return Some(current.position);
    }
    let fraction = ((t - current.time) / timeline.time_step).clamp(Fixed::ZERO, Fixed::ONE);
    Some(current.position.lerp(next.position, fraction))
}
