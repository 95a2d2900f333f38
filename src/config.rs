//! Harness Configuration
//!
//! Immutable configuration structs for the environment, the DQN agent and
//! the training pipeline. All values are fixed at build time; the CLI only
//! selects which stage to run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{HighwayError, Result};

/// Number of environment steps to record per rollout GIF
pub const DEFAULT_RECORD_STEPS: usize = 200;
/// Playback rate for per-depth rollout GIFs
pub const RECORD_FPS: u16 = 12;
/// Playback rate for the concatenated evolution GIF
pub const EVOLUTION_FPS: u16 = 15;

/// Directory for agent snapshots
pub const MODELS_DIR: &str = "models";
/// Directory for training logs and evaluation records
pub const LOGS_DIR: &str = "logs";
/// Directory for rendered media artifacts
pub const MEDIA_DIR: &str = "media";

/// Highway environment configuration
///
/// Identical configuration and rendering mode must yield behaviorally
/// equivalent environment instances; `seed` pins the traffic layout exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Number of lanes on the highway
    pub lanes_count: usize,
    /// Number of traffic vehicles spawned around the ego vehicle
    pub vehicles_count: usize,
    /// Episode length cap in policy steps
    pub duration: usize,
    /// Reward applied on collision (expected negative)
    pub collision_reward: f64,
    /// Reward coefficient for driving at high speed
    pub high_speed_reward: f64,
    /// Reward coefficient for keeping to the rightmost lane
    pub right_lane_reward: f64,
    /// Scale per-step rewards into [0, 1]
    pub normalize_reward: bool,
    /// Optional RNG seed for reproducible traffic
    pub seed: Option<u64>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            lanes_count: 3,
            vehicles_count: 30,
            duration: 40,
            collision_reward: -5.0,
            high_speed_reward: 0.5,
            right_lane_reward: 0.1,
            normalize_reward: true,
            seed: None,
        }
    }
}

impl EnvConfig {
    /// Validate parameters, failing fast before any environment is built.
    pub fn validate(&self) -> Result<()> {
        if self.lanes_count == 0 {
            return Err(HighwayError::Config(
                "lanes_count must be positive".to_string(),
            ));
        }
        if self.duration == 0 {
            return Err(HighwayError::Config(
                "duration must be positive".to_string(),
            ));
        }
        if self.collision_reward > 0.0 {
            return Err(HighwayError::Config(format!(
                "collision_reward must not be positive, got {}",
                self.collision_reward
            )));
        }
        Ok(())
    }
}

/// DQN hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DqnConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Replay buffer capacity
    pub buffer_size: usize,
    /// Environment steps collected before the first gradient update
    pub learning_starts: usize,
    /// Mini-batch size
    pub batch_size: usize,
    /// Discount factor (gamma)
    pub gamma: f32,
    /// Environment steps between gradient updates
    pub train_freq: usize,
    /// Environment steps between target network refreshes
    pub target_update_interval: usize,
    /// Hidden layer width of the Q-network
    pub hidden_dim: usize,
    /// Initial exploration rate
    pub epsilon_start: f32,
    /// Final exploration rate
    pub epsilon_end: f32,
    /// Environment steps over which epsilon decays linearly
    pub epsilon_decay_steps: usize,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-4,
            buffer_size: 100_000,
            learning_starts: 1_000,
            batch_size: 64,
            gamma: 0.99,
            train_freq: 4,
            target_update_interval: 1_000,
            hidden_dim: 128,
            epsilon_start: 1.0,
            epsilon_end: 0.05,
            epsilon_decay_steps: 10_000,
        }
    }
}

impl DqnConfig {
    /// Validate hyperparameters before agent construction.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(HighwayError::Config(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.buffer_size < self.batch_size {
            return Err(HighwayError::Config(format!(
                "buffer_size {} smaller than batch_size {}",
                self.buffer_size, self.batch_size
            )));
        }
        if self.train_freq == 0 || self.target_update_interval == 0 {
            return Err(HighwayError::Config(
                "train_freq and target_update_interval must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.epsilon_start) || !(0.0..=1.0).contains(&self.epsilon_end) {
            return Err(HighwayError::Config(
                "epsilon bounds must lie in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Evaluation probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Elapsed training timesteps between probe invocations
    pub eval_freq: usize,
    /// Deterministic episodes per probe invocation
    pub n_eval_episodes: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            eval_freq: 5_000,
            n_eval_episodes: 5,
        }
    }
}

impl EvalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_eval_episodes == 0 {
            return Err(HighwayError::Config(
                "n_eval_episodes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// One full training run: configuration, budget and artifact paths
#[derive(Debug, Clone)]
pub struct TrainRunConfig {
    /// Environment configuration shared by training and evaluation instances
    pub env: EnvConfig,
    /// Agent hyperparameters
    pub dqn: DqnConfig,
    /// Evaluation probe settings
    pub eval: EvalConfig,
    /// Total timestep budget; zero produces an untrained snapshot
    pub total_timesteps: usize,
    /// Destination for the terminal snapshot
    pub model_path: PathBuf,
    /// Directory for the evaluation record and the best snapshot
    pub log_dir: PathBuf,
    /// Snapshot stem to resume from instead of a fresh policy
    pub resume_from: Option<PathBuf>,
}

impl TrainRunConfig {
    pub fn validate(&self) -> Result<()> {
        self.env.validate()?;
        self.dqn.validate()?;
        self.eval.validate()
    }

    /// Path of the persisted evaluation record.
    pub fn evaluations_path(&self) -> PathBuf {
        self.log_dir.join("evaluations.json")
    }

    /// Stem of the best-so-far snapshot written by the evaluation probe.
    pub fn best_model_path(&self) -> PathBuf {
        self.log_dir.join("best").join("best_model")
    }
}

/// Training depth presets illustrating learning progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Depth {
    /// Randomly initialized policy, no learning
    Untrained,
    /// Partially converged policy
    Half,
    /// Fully trained policy
    Full,
}

impl Depth {
    /// Timestep budget for this depth.
    pub fn total_timesteps(self) -> usize {
        match self {
            Depth::Untrained => 0,
            Depth::Half => 20_000,
            Depth::Full => 60_000,
        }
    }

    /// Snapshot stem for this depth.
    pub fn model_path(self) -> PathBuf {
        let name = match self {
            Depth::Untrained => "dqn_untrained",
            Depth::Half => "dqn_half_20k",
            Depth::Full => "dqn_final_60k",
        };
        PathBuf::from(MODELS_DIR).join(name)
    }

    /// Log directory for this depth's training run.
    pub fn log_dir(self) -> PathBuf {
        let name = match self {
            Depth::Untrained => "dqn_highway_untrained",
            Depth::Half => "dqn_highway_half",
            Depth::Full => "dqn_highway_full",
        };
        PathBuf::from(LOGS_DIR).join(name)
    }

    /// Rollout GIF path for this depth.
    pub fn gif_path(self) -> PathBuf {
        let name = match self {
            Depth::Untrained => "untrained.gif",
            Depth::Half => "half_trained.gif",
            Depth::Full => "fully_trained.gif",
        };
        PathBuf::from(MEDIA_DIR).join(name)
    }

    /// Full training run configuration for this depth.
    pub fn run_config(self) -> TrainRunConfig {
        TrainRunConfig {
            env: EnvConfig::default(),
            dqn: DqnConfig::default(),
            eval: EvalConfig::default(),
            total_timesteps: self.total_timesteps(),
            model_path: self.model_path(),
            log_dir: self.log_dir(),
            resume_from: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_env_config_is_valid() {
        assert!(EnvConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_lanes_rejected() {
        let config = EnvConfig {
            lanes_count: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HighwayError::Config(_))));
    }

    #[test]
    fn test_positive_collision_reward_rejected() {
        let config = EnvConfig {
            collision_reward: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_buffer_smaller_than_batch_rejected() {
        let config = DqnConfig {
            buffer_size: 8,
            batch_size: 64,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_depth_budgets() {
        assert_eq!(Depth::Untrained.total_timesteps(), 0);
        assert_eq!(Depth::Half.total_timesteps(), 20_000);
        assert_eq!(Depth::Full.total_timesteps(), 60_000);
    }
}
