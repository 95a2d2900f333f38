//! Episode Monitor
//!
//! Wraps an environment transparently and records per-episode statistics
//! needed by evaluation and logging.

use tracing::debug;

use super::{Action, Environment, Frame, StepResult};
use crate::error::Result;

/// Statistics of one completed episode
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRecord {
    /// Cumulative reward over the episode
    pub reward: f64,
    /// Episode length in steps
    pub length: usize,
}

/// Transparent environment wrapper accumulating episode statistics
///
/// Every call is forwarded unchanged; rewards and observations pass through
/// unaltered. One record is appended per completed episode.
pub struct Monitor<E: Environment> {
    inner: E,
    episode_reward: f64,
    episode_length: usize,
    episodes: Vec<EpisodeRecord>,
}

impl<E: Environment> Monitor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            episode_reward: 0.0,
            episode_length: 0,
            episodes: Vec::new(),
        }
    }

    /// Records of all episodes completed so far.
    pub fn episodes(&self) -> &[EpisodeRecord] {
        &self.episodes
    }

    /// Access the wrapped environment.
    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: Environment> Environment for Monitor<E> {
    fn reset(&mut self) -> Result<Vec<f32>> {
        self.episode_reward = 0.0;
        self.episode_length = 0;
        self.inner.reset()
    }

    fn step(&mut self, action: Action) -> Result<StepResult> {
        let result = self.inner.step(action)?;

        self.episode_reward += result.reward;
        self.episode_length += 1;

        if result.terminated || result.truncated {
            let record = EpisodeRecord {
                reward: self.episode_reward,
                length: self.episode_length,
            };
            debug!(
                episode = self.episodes.len() + 1,
                reward = record.reward,
                length = record.length,
                "episode complete"
            );
            self.episodes.push(record);
        }

        Ok(result)
    }

    fn render(&mut self) -> Option<Frame> {
        self.inner.render()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn observation_dim(&self) -> usize {
        self.inner.observation_dim()
    }

    fn action_count(&self) -> usize {
        self.inner.action_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;
    use crate::env::{make_monitored_env, RenderMode};

    #[test]
    fn test_monitor_records_completed_episodes() {
        let config = EnvConfig {
            vehicles_count: 0,
            duration: 4,
            seed: Some(3),
            ..Default::default()
        };
        let mut env = make_monitored_env(&config, RenderMode::None).unwrap();

        for _ in 0..2 {
            env.reset().unwrap();
            loop {
                let result = env.step(Action::Idle).unwrap();
                if result.terminated || result.truncated {
                    break;
                }
            }
        }

        let episodes = env.episodes();
        assert_eq!(episodes.len(), 2);
        assert!(episodes.iter().all(|e| e.length == 4));
    }

    #[test]
    fn test_monitor_passes_rewards_through() {
        let config = EnvConfig {
            vehicles_count: 0,
            duration: 3,
            seed: Some(3),
            ..Default::default()
        };
        let mut plain = crate::env::make_highway_env(&config, RenderMode::None).unwrap();
        let mut monitored = make_monitored_env(&config, RenderMode::None).unwrap();

        plain.reset().unwrap();
        monitored.reset().unwrap();

        let a = plain.step(Action::Faster).unwrap();
        let b = monitored.step(Action::Faster).unwrap();
        assert_eq!(a.reward, b.reward);
        assert_eq!(a.observation, b.observation);
    }
}
