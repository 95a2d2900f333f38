//! Model Checkpointing
//!
//! Filesystem-backed mapping from a snapshot stem to serialized agent state.
//! A snapshot is two artifacts sharing a stem: `<stem>.mpk` (network weights)
//! and `<stem>.json` (metadata carrying the space signature). Writes go to a
//! temp file first and are renamed into place, so a reader never observes a
//! partially written snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::DqnAgent;
use crate::config::DqnConfig;
use crate::env::Environment;
use crate::error::{HighwayError, Result};

/// Sidecar metadata identifying a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Observation length the policy was trained against
    pub obs_dim: usize,
    /// Action count the policy was trained against
    pub n_actions: usize,
    /// Exploration rate at save time
    pub epsilon: f32,
    /// Environment steps observed at save time
    pub env_steps: usize,
    /// Save timestamp
    pub saved_at: DateTime<Utc>,
    /// Hyperparameters needed to rebuild the network
    pub config: DqnConfig,
}

/// Store for saving and loading agent snapshots
#[derive(Debug, Default)]
pub struct CheckpointStore;

impl CheckpointStore {
    pub fn new() -> Self {
        Self
    }

    /// Weights artifact path for a snapshot stem.
    pub fn weights_path(stem: &Path) -> PathBuf {
        sibling(stem, "mpk")
    }

    /// Metadata artifact path for a snapshot stem.
    pub fn meta_path(stem: &Path) -> PathBuf {
        sibling(stem, "json")
    }

    /// Check whether a snapshot exists at the given stem.
    pub fn exists(&self, stem: &Path) -> bool {
        Self::weights_path(stem).exists() && Self::meta_path(stem).exists()
    }

    /// Serialize the agent to `<stem>.mpk` + `<stem>.json`.
    ///
    /// Intermediate directories are created; existing snapshots are
    /// overwritten atomically via rename.
    pub fn save(&self, agent: &DqnAgent, stem: &Path) -> Result<PathBuf> {
        let parent = stem.parent().unwrap_or_else(|| Path::new("."));
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }

        let name = stem
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| HighwayError::Config(format!("invalid snapshot stem: {stem:?}")))?;
        let tmp_stem = parent.join(format!(".tmp-{name}"));

        agent.save_weights(&tmp_stem)?;

        let meta = SnapshotMeta {
            obs_dim: agent.obs_dim(),
            n_actions: agent.n_actions(),
            epsilon: agent.epsilon(),
            env_steps: agent.env_steps(),
            saved_at: Utc::now(),
            config: agent.config().clone(),
        };
        fs::write(Self::meta_path(&tmp_stem), serde_json::to_vec_pretty(&meta)?)?;

        let weights = Self::weights_path(stem);
        fs::rename(Self::weights_path(&tmp_stem), &weights)?;
        fs::rename(Self::meta_path(&tmp_stem), Self::meta_path(stem))?;

        info!(path = %weights.display(), "saved checkpoint");
        Ok(weights)
    }

    /// Deserialize a snapshot bound to the given environment's spaces.
    ///
    /// Fails with NotFound if either artifact is missing, and with
    /// CorruptData if deserialization fails or the space signature does not
    /// match the environment.
    pub fn load(&self, stem: &Path, env: &dyn Environment) -> Result<DqnAgent> {
        if !self.exists(stem) {
            return Err(HighwayError::not_found(stem));
        }

        let meta: SnapshotMeta = serde_json::from_slice(&fs::read(Self::meta_path(stem))?)
            .map_err(|e| HighwayError::CorruptData(format!("snapshot metadata: {e}")))?;

        if meta.obs_dim != env.observation_dim() || meta.n_actions != env.action_count() {
            return Err(HighwayError::CorruptData(format!(
                "space signature mismatch: snapshot ({}, {}), environment ({}, {})",
                meta.obs_dim,
                meta.n_actions,
                env.observation_dim(),
                env.action_count()
            )));
        }

        let mut agent = DqnAgent::new(meta.obs_dim, meta.n_actions, meta.config.clone())?;
        agent.load_weights(stem)?;
        agent.restore_state(meta.epsilon, meta.env_steps);

        info!(path = %Self::weights_path(stem).display(), "loaded checkpoint");
        Ok(agent)
    }
}

/// Append an extension to a stem without interpreting existing dots.
fn sibling(stem: &Path, ext: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    use crate::config::EnvConfig;
    use crate::env::{make_highway_env, RenderMode};

    fn unique_dir(tag: &str) -> PathBuf {
        let dir = temp_dir().join(format!("highway_rl_ckpt_{tag}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn small_agent(env: &dyn Environment) -> DqnAgent {
        let config = DqnConfig {
            hidden_dim: 16,
            ..Default::default()
        };
        DqnAgent::new(env.observation_dim(), env.action_count(), config).unwrap()
    }

    #[test]
    fn test_save_creates_both_artifacts() {
        let dir = unique_dir("save");
        let env = make_highway_env(&EnvConfig::default(), RenderMode::None).unwrap();
        let agent = small_agent(&env);

        let store = CheckpointStore::new();
        let stem = dir.join("nested").join("model");
        store.save(&agent, &stem).unwrap();

        assert!(CheckpointStore::weights_path(&stem).exists());
        assert!(CheckpointStore::meta_path(&stem).exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_roundtrip_preserves_deterministic_actions() {
        let dir = unique_dir("roundtrip");
        let mut env = make_highway_env(&EnvConfig::default(), RenderMode::None).unwrap();
        let mut agent = small_agent(&env);

        let store = CheckpointStore::new();
        let stem = dir.join("model");
        store.save(&agent, &stem).unwrap();
        let mut loaded = store.load(&stem, &env).unwrap();

        let obs = env.reset().unwrap();
        for _ in 0..5 {
            assert_eq!(agent.predict(&obs, true), loaded.predict(&obs, true));
        }
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_snapshot_is_not_found() {
        let env = make_highway_env(&EnvConfig::default(), RenderMode::None).unwrap();
        let store = CheckpointStore::new();
        let result = store.load(Path::new("/nonexistent/model"), &env);
        assert!(matches!(result, Err(HighwayError::NotFound { .. })));
    }

    #[test]
    fn test_load_with_mismatched_spaces_is_corrupt() {
        let dir = unique_dir("mismatch");
        let env = make_highway_env(&EnvConfig::default(), RenderMode::None).unwrap();
        let agent = small_agent(&env);

        let store = CheckpointStore::new();
        let stem = dir.join("model");
        store.save(&agent, &stem).unwrap();

        // An environment advertising a different observation shape
        struct OtherSpace;
        impl Environment for OtherSpace {
            fn reset(&mut self) -> crate::error::Result<Vec<f32>> {
                Ok(vec![0.0; 7])
            }
            fn step(&mut self, _action: crate::env::Action) -> crate::error::Result<crate::env::StepResult> {
                unreachable!("not stepped in this test")
            }
            fn render(&mut self) -> Option<crate::env::Frame> {
                None
            }
            fn close(&mut self) -> crate::error::Result<()> {
                Ok(())
            }
            fn observation_dim(&self) -> usize {
                7
            }
            fn action_count(&self) -> usize {
                5
            }
        }

        let result = store.load(&stem, &OtherSpace);
        assert!(matches!(result, Err(HighwayError::CorruptData(_))));
        let _ = fs::remove_dir_all(&dir);
    }
}
