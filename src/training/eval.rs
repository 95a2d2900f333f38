//! Evaluation Probe
//!
//! At a fixed cadence of elapsed training timesteps, runs a fixed number of
//! deterministic episodes in a dedicated evaluation environment, appends an
//! entry to the evaluation record, and persists the best-performing snapshot
//! seen so far in the current run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::checkpoint::CheckpointStore;
use crate::agent::DqnAgent;
use crate::config::EvalConfig;
use crate::env::{Action, Environment};
use crate::error::{HighwayError, Result};

/// One evaluation record entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalEntry {
    /// Elapsed training timesteps when the probe fired
    pub timestep: usize,
    /// Mean return across the evaluation episodes
    pub mean_return: f64,
    /// Individual episode returns
    pub episode_returns: Vec<f64>,
}

impl EvalEntry {
    /// Per-timestep mean, reduced from the episode returns when present.
    pub fn mean(&self) -> f64 {
        if self.episode_returns.is_empty() {
            self.mean_return
        } else {
            self.episode_returns.iter().sum::<f64>() / self.episode_returns.len() as f64
        }
    }
}

/// Load a persisted evaluation record.
pub fn load_evaluations(path: &Path) -> Result<Vec<EvalEntry>> {
    if !path.exists() {
        return Err(HighwayError::not_found(path));
    }
    serde_json::from_slice(&fs::read(path)?)
        .map_err(|e| HighwayError::CorruptData(format!("evaluation record: {e}")))
}

/// Periodic deterministic evaluation with best-snapshot tracking
///
/// The best-so-far comparison is stateful across probe ticks within one
/// training run and lives here, threaded through the loop explicitly.
pub struct EvalProbe {
    config: EvalConfig,
    store: CheckpointStore,
    log_path: PathBuf,
    best_path: PathBuf,
    next_eval_at: usize,
    best_mean: Option<f64>,
    entries: Vec<EvalEntry>,
}

impl EvalProbe {
    pub fn new(config: EvalConfig, log_path: PathBuf, best_path: PathBuf) -> Self {
        let next_eval_at = config.eval_freq;
        Self {
            config,
            store: CheckpointStore::new(),
            log_path,
            best_path,
            next_eval_at,
            best_mean: None,
            entries: Vec::new(),
        }
    }

    /// Whether the cadence boundary has been crossed.
    ///
    /// Fires on the first timestep at or past the next cadence multiple; a
    /// zero cadence disables the probe entirely.
    pub fn due(&self, elapsed: usize) -> bool {
        self.config.eval_freq > 0 && elapsed >= self.next_eval_at
    }

    /// Entries recorded so far in this run.
    pub fn entries(&self) -> &[EvalEntry] {
        &self.entries
    }

    /// Best mean return observed so far in this run.
    pub fn best_mean(&self) -> Option<f64> {
        self.best_mean
    }

    /// Run one full probe tick.
    ///
    /// Any episode failure fails the whole tick; partial evaluation data
    /// cannot be trusted for the best-snapshot comparison.
    pub fn tick<E: Environment>(
        &mut self,
        agent: &mut DqnAgent,
        env: &mut E,
        elapsed: usize,
    ) -> Result<()> {
        let mut episode_returns = Vec::with_capacity(self.config.n_eval_episodes);
        for _ in 0..self.config.n_eval_episodes {
            episode_returns.push(run_episode(agent, env)?);
        }
        let mean_return = episode_returns.iter().sum::<f64>() / episode_returns.len() as f64;

        info!(
            timestep = elapsed,
            mean_return,
            episodes = episode_returns.len(),
            "evaluation complete"
        );

        self.entries.push(EvalEntry {
            timestep: elapsed,
            mean_return,
            episode_returns,
        });
        self.persist()?;

        if self.best_mean.map_or(true, |best| mean_return > best) {
            self.best_mean = Some(mean_return);
            self.store.save(agent, &self.best_path)?;
            info!(mean_return, "new best model");
        }

        self.next_eval_at = (elapsed / self.config.eval_freq + 1) * self.config.eval_freq;
        Ok(())
    }

    /// Write the evaluation record atomically (temp file + rename).
    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.log_path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.entries)?)?;
        fs::rename(&tmp, &self.log_path)?;
        Ok(())
    }
}

/// Run one deterministic episode and return its cumulative reward.
pub(crate) fn run_episode<E: Environment>(agent: &mut DqnAgent, env: &mut E) -> Result<f64> {
    let mut obs = env.reset()?;
    let mut total = 0.0;
    loop {
        let action = agent.predict(&obs, true);
        let step = env.step(Action::from(action))?;
        total += step.reward;
        if step.terminated || step.truncated {
            return Ok(total);
        }
        obs = step.observation;
    }
}
