//! Rollout Recorder
//!
//! Loads a frozen checkpoint and replays it deterministically in
//! frame-capture mode, collecting rendered frames. Episodes ending before
//! the step budget is exhausted restart with a fresh reset.

use std::path::Path;

use tracing::info;

use crate::agent::DqnAgent;
use crate::config::EnvConfig;
use crate::env::{make_highway_env, Action, Environment, Frame, RenderMode};
use crate::error::Result;
use crate::training::CheckpointStore;

/// Ordered, temporally contiguous sequence of rendered frames
#[derive(Debug, Clone, Default)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// Append all frames of another sequence, preserving order.
    pub fn extend(&mut self, other: FrameSequence) {
        self.frames.extend(other.frames);
    }
}

/// Record a rollout of a persisted snapshot.
///
/// Fails with NotFound if the checkpoint stem is absent. The environment is
/// closed on every exit path.
pub fn record_rollout(
    checkpoint: &Path,
    env_config: &EnvConfig,
    steps: usize,
) -> Result<FrameSequence> {
    let store = CheckpointStore::new();
    let mut env = make_highway_env(env_config, RenderMode::FrameCapture)?;
    let mut agent = match store.load(checkpoint, &env) {
        Ok(agent) => agent,
        Err(e) => {
            let _ = env.close();
            return Err(e);
        }
    };

    let result = run_rollout(&mut agent, &mut env, steps);
    let close = env.close();
    let frames = result?;
    close?;

    info!(
        checkpoint = %checkpoint.display(),
        frames = frames.len(),
        "rollout recorded"
    );
    Ok(frames)
}

/// Drive a deterministic rollout in the given environment.
///
/// Captures at most one frame per step; steps where the environment yields
/// no frame are skipped, not errors. Never returns more frames than the
/// requested step budget.
pub fn run_rollout<E: Environment>(
    agent: &mut DqnAgent,
    env: &mut E,
    steps: usize,
) -> Result<FrameSequence> {
    let mut frames = FrameSequence::new();
    let mut obs = env.reset()?;

    for _ in 0..steps {
        let action = agent.predict(&obs, true);
        let step = env.step(Action::from(action))?;

        if let Some(frame) = env.render() {
            frames.push(frame);
        }

        obs = if step.terminated || step.truncated {
            env.reset()?
        } else {
            step.observation
        };
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::config::DqnConfig;
    use crate::env::{make_monitored_env, HighwayEnv, Monitor};
    use crate::error::HighwayError;

    fn small_agent(env: &dyn Environment) -> DqnAgent {
        DqnAgent::new(
            env.observation_dim(),
            env.action_count(),
            DqnConfig {
                hidden_dim: 16,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn short_episodes() -> EnvConfig {
        EnvConfig {
            vehicles_count: 0,
            duration: 8,
            seed: Some(21),
            ..Default::default()
        }
    }

    #[test]
    fn test_rollout_never_exceeds_step_budget() {
        let mut env = make_highway_env(&short_episodes(), RenderMode::FrameCapture).unwrap();
        let mut agent = small_agent(&env);

        let frames = run_rollout(&mut agent, &mut env, 20).unwrap();
        assert!(frames.len() <= 20);
        assert!(!frames.is_empty());
    }

    #[test]
    fn test_rollout_without_rendering_returns_zero_frames() {
        let mut env = make_highway_env(&short_episodes(), RenderMode::None).unwrap();
        let mut agent = small_agent(&env);

        let frames = run_rollout(&mut agent, &mut env, 20).unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn test_rollout_restarts_episodes_until_budget_spent() {
        // 40-step recording over 8-step episodes completes at least 4 of them
        let mut env: Monitor<HighwayEnv> =
            make_monitored_env(&short_episodes(), RenderMode::None).unwrap();
        let mut agent = small_agent(&env);

        run_rollout(&mut agent, &mut env, 40).unwrap();
        assert!(env.episodes().len() >= 4);
    }

    #[test]
    fn test_missing_checkpoint_is_not_found() {
        let result = record_rollout(
            &PathBuf::from("/nonexistent/model"),
            &short_episodes(),
            10,
        );
        assert!(matches!(result, Err(HighwayError::NotFound { .. })));
    }
}
