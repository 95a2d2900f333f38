//! Simulated Highway Environment
//!
//! This module provides a gym-like environment for training and evaluating
//! driving agents on a multi-lane highway without external simulators.

mod highway;
mod monitor;
mod render;

pub use highway::{HighwayEnv, N_OBS_VEHICLES, OBS_FEATURES};
pub use monitor::{EpisodeRecord, Monitor};

use crate::config::EnvConfig;
use crate::error::Result;

/// Discrete meta-actions available to the driving agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Move one lane to the left
    LaneLeft,
    /// Keep lane and speed
    Idle,
    /// Move one lane to the right
    LaneRight,
    /// Increase target speed
    Faster,
    /// Decrease target speed
    Slower,
}

/// All actions in index order
pub const ALL_ACTIONS: [Action; 5] = [
    Action::LaneLeft,
    Action::Idle,
    Action::LaneRight,
    Action::Faster,
    Action::Slower,
];

impl Action {
    /// Number of discrete actions.
    pub const COUNT: usize = 5;

    /// Index of this action in the policy output.
    pub fn index(self) -> usize {
        match self {
            Action::LaneLeft => 0,
            Action::Idle => 1,
            Action::LaneRight => 2,
            Action::Faster => 3,
            Action::Slower => 4,
        }
    }
}

impl From<usize> for Action {
    fn from(index: usize) -> Self {
        match index {
            0 => Action::LaneLeft,
            1 => Action::Idle,
            2 => Action::LaneRight,
            3 => Action::Faster,
            4 => Action::Slower,
            _ => Action::Idle,
        }
    }
}

/// Rendering mode requested at environment construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// No rendering (training)
    #[default]
    None,
    /// State transitions logged for interactive inspection
    Interactive,
    /// Frame-based rendering for video recording
    FrameCapture,
}

/// A single rendered RGB frame, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Result of taking a step in the environment
#[derive(Debug, Clone)]
pub struct StepResult {
    /// New observation after action
    pub observation: Vec<f32>,
    /// Reward signal
    pub reward: f64,
    /// Whether the episode ended in a terminal state (collision)
    pub terminated: bool,
    /// Whether the episode was cut off at the duration cap
    pub truncated: bool,
    /// Additional step information
    pub info: StepInfo,
}

/// Additional step information
#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    /// Ego speed after the step
    pub speed: f64,
    /// Ego lane after the step
    pub lane: usize,
    /// Whether the ego vehicle has crashed
    pub crashed: bool,
}

/// Simulation environment contract
///
/// Each instance is exclusively owned by the component that created it and
/// must be closed on every exit path.
pub trait Environment {
    /// Start a new episode and return the initial observation.
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Advance the simulation by one policy step.
    fn step(&mut self, action: Action) -> Result<StepResult>;

    /// Produce a frame in frame-capture mode, `None` otherwise.
    fn render(&mut self) -> Option<Frame>;

    /// Release simulation resources. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Flattened observation length.
    fn observation_dim(&self) -> usize;

    /// Number of discrete actions.
    fn action_count(&self) -> usize;
}

/// Create and configure a highway environment.
///
/// Fails fast with a configuration error if parameters are missing or out of
/// range; no side effects beyond allocating the instance.
pub fn make_highway_env(config: &EnvConfig, render_mode: RenderMode) -> Result<HighwayEnv> {
    config.validate()?;
    Ok(HighwayEnv::new(config.clone(), render_mode))
}

/// Create a monitored highway environment for training or evaluation.
pub fn make_monitored_env(
    config: &EnvConfig,
    render_mode: RenderMode,
) -> Result<Monitor<HighwayEnv>> {
    Ok(Monitor::new(make_highway_env(config, render_mode)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_index_roundtrip() {
        for action in ALL_ACTIONS {
            assert_eq!(Action::from(action.index()), action);
        }
    }

    #[test]
    fn test_out_of_range_action_falls_back_to_idle() {
        assert_eq!(Action::from(17), Action::Idle);
    }

    #[test]
    fn test_factory_rejects_invalid_config() {
        let config = EnvConfig {
            lanes_count: 0,
            ..Default::default()
        };
        assert!(make_highway_env(&config, RenderMode::None).is_err());
    }
}
