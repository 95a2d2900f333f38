//! Training Loop
//!
//! Drives the agent/environment interaction for a bounded number of
//! timesteps, invoking the evaluation probe on cadence and writing a final
//! checkpoint. A zero-timestep budget is valid and produces a snapshot of
//! randomly initialized, unlearned policy parameters.

use std::path::PathBuf;

use tracing::info;

use super::checkpoint::CheckpointStore;
use super::eval::EvalProbe;
use crate::agent::{DqnAgent, Transition};
use crate::config::TrainRunConfig;
use crate::env::{
    make_highway_env, make_monitored_env, Action, Environment, HighwayEnv, Monitor, RenderMode,
};
use crate::error::Result;

/// Loop phases, in transition order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Running,
    Evaluating,
    Finalizing,
    Done,
}

/// Summary of one completed training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Timesteps actually executed
    pub timesteps: usize,
    /// Training episodes completed
    pub episodes: usize,
    /// Evaluation record entries appended
    pub evaluations: usize,
    /// Stem of the terminal snapshot
    pub model_path: PathBuf,
}

/// Single-run training driver
pub struct TrainingLoop {
    config: TrainRunConfig,
}

impl TrainingLoop {
    /// Validate the run configuration and build the loop.
    pub fn new(config: TrainRunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Execute the run to completion.
    ///
    /// Both environment instances are closed on every exit path; errors
    /// during the run propagate after best-effort cleanup.
    pub fn run(&self) -> Result<TrainingOutcome> {
        // Initializing: construct both environments and a fresh policy.
        // An evaluation environment construction failure aborts the run.
        let mut train_env = make_monitored_env(&self.config.env, RenderMode::None)?;
        let mut eval_env = match make_highway_env(&self.config.env, RenderMode::None) {
            Ok(env) => env,
            Err(e) => {
                let _ = train_env.close();
                return Err(e);
            }
        };
        // Fresh policy, or one loaded from a prior snapshot
        let agent = match &self.config.resume_from {
            Some(stem) => CheckpointStore::new().load(stem, &train_env),
            None => DqnAgent::new(
                train_env.observation_dim(),
                train_env.action_count(),
                self.config.dqn.clone(),
            ),
        };
        let mut agent = match agent {
            Ok(agent) => agent,
            Err(e) => {
                let _ = train_env.close();
                let _ = eval_env.close();
                return Err(e);
            }
        };

        let result = self.drive(&mut agent, &mut train_env, &mut eval_env);

        let train_close = train_env.close();
        let eval_close = eval_env.close();
        let outcome = result?;
        train_close?;
        eval_close?;
        Ok(outcome)
    }

    fn drive(
        &self,
        agent: &mut DqnAgent,
        train_env: &mut Monitor<HighwayEnv>,
        eval_env: &mut HighwayEnv,
    ) -> Result<TrainingOutcome> {
        let budget = self.config.total_timesteps;
        let store = CheckpointStore::new();
        let mut probe = EvalProbe::new(
            self.config.eval.clone(),
            self.config.evaluations_path(),
            self.config.best_model_path(),
        );

        info!(
            total_timesteps = budget,
            eval_freq = self.config.eval.eval_freq,
            "training run starting"
        );

        let mut elapsed = 0usize;
        let mut obs = Vec::new();
        let mut phase = Phase::Initializing;

        loop {
            match phase {
                Phase::Initializing => {
                    // A zero budget is an untrained run: skip interaction
                    phase = if budget == 0 {
                        Phase::Finalizing
                    } else {
                        obs = train_env.reset()?;
                        Phase::Running
                    };
                }
                Phase::Running => {
                    if elapsed >= budget {
                        phase = Phase::Finalizing;
                        continue;
                    }

                    let action = agent.predict(&obs, false);
                    let step = train_env.step(Action::from(action))?;
                    elapsed += 1;

                    agent.observe(Transition {
                        state: obs,
                        action,
                        reward: step.reward as f32,
                        next_state: step.observation.clone(),
                        done: step.terminated,
                    });

                    obs = if step.terminated || step.truncated {
                        train_env.reset()?
                    } else {
                        step.observation
                    };

                    if probe.due(elapsed) {
                        phase = Phase::Evaluating;
                    }
                }
                Phase::Evaluating => {
                    probe.tick(agent, eval_env, elapsed)?;
                    phase = Phase::Running;
                }
                Phase::Finalizing => {
                    store.save(agent, &self.config.model_path)?;
                    train_env.close()?;
                    eval_env.close()?;
                    phase = Phase::Done;
                }
                Phase::Done => break,
            }
        }

        let outcome = TrainingOutcome {
            timesteps: elapsed,
            episodes: train_env.episodes().len(),
            evaluations: probe.entries().len(),
            model_path: self.config.model_path.clone(),
        };
        info!(
            timesteps = outcome.timesteps,
            episodes = outcome.episodes,
            evaluations = outcome.evaluations,
            "training run complete"
        );
        Ok(outcome)
    }
}
