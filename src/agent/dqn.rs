//! Deep Q-Network agent
//!
//! Online + target networks, replay buffer and Adam optimizer. Exploration
//! is epsilon-greedy with a linear decay over environment steps; evaluation
//! and recording use deterministic greedy action selection.

use std::path::Path;

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::network::{QNetwork, QNetworkConfig};
use super::replay::{ReplayBuffer, Transition};
use super::{InferBackend, TrainBackend};
use crate::config::DqnConfig;
use crate::error::{HighwayError, Result};

type Device = <InferBackend as Backend>::Device;

/// DQN agent with online + target networks, replay buffer, and Adam optimizer
pub struct DqnAgent {
    online: QNetwork<TrainBackend>,
    target: QNetwork<InferBackend>,
    optimizer: OptimizerAdaptor<Adam<InferBackend>, QNetwork<TrainBackend>, TrainBackend>,
    replay: ReplayBuffer,
    config: DqnConfig,
    obs_dim: usize,
    n_actions: usize,
    device: Device,
    epsilon: f32,
    env_steps: usize,
    rng: StdRng,
}

impl DqnAgent {
    /// Create a freshly initialized agent bound to the given spaces.
    pub fn new(obs_dim: usize, n_actions: usize, config: DqnConfig) -> Result<Self> {
        config.validate()?;
        if obs_dim == 0 || n_actions == 0 {
            return Err(HighwayError::Config(format!(
                "degenerate spaces: obs_dim={obs_dim}, n_actions={n_actions}"
            )));
        }

        let device = Device::default();
        let online: QNetwork<TrainBackend> = QNetworkConfig::new(obs_dim, n_actions)
            .with_hidden_dim(config.hidden_dim)
            .init(&device);
        // Target starts in sync with the online network
        let target = online.valid();
        let optimizer = AdamConfig::new().init();
        let replay = ReplayBuffer::new(config.buffer_size);
        let epsilon = config.epsilon_start;

        Ok(Self {
            online,
            target,
            optimizer,
            replay,
            config,
            obs_dim,
            n_actions,
            device,
            epsilon,
            env_steps: 0,
            rng: StdRng::from_entropy(),
        })
    }

    /// Select an action: epsilon-greedy unless deterministic.
    pub fn predict(&mut self, obs: &[f32], deterministic: bool) -> usize {
        if !deterministic && self.rng.gen::<f32>() < self.epsilon {
            return self.rng.gen_range(0..self.n_actions);
        }

        let q = self.q_values(obs);
        let mut best = 0;
        let mut best_q = f32::NEG_INFINITY;
        for (i, &value) in q.iter().enumerate() {
            if value > best_q {
                best_q = value;
                best = i;
            }
        }
        best
    }

    /// Feed one transition to the learning machinery.
    ///
    /// Returns the training loss when a gradient update was performed.
    pub fn observe(&mut self, transition: Transition) -> Option<f32> {
        self.replay.push(transition);
        self.env_steps += 1;
        self.decay_epsilon();

        let mut loss = None;
        let warmup = self.config.learning_starts.max(self.config.batch_size);
        if self.replay.has_enough_samples(warmup) && self.env_steps % self.config.train_freq == 0 {
            loss = Some(self.train_step());
        }

        if self.env_steps % self.config.target_update_interval == 0 {
            self.target = self.online.valid();
            debug!(step = self.env_steps, "target network refreshed");
        }

        loss
    }

    /// Current exploration rate.
    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Environment steps observed so far.
    pub fn env_steps(&self) -> usize {
        self.env_steps
    }

    /// Observation length this agent was built against.
    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    /// Action count this agent was built against.
    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    /// Hyperparameters this agent was built with.
    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    /// Restore exploration state from a snapshot.
    pub(crate) fn restore_state(&mut self, epsilon: f32, env_steps: usize) {
        self.epsilon = epsilon;
        self.env_steps = env_steps;
    }

    /// Persist online network weights to `<stem>.mpk`.
    pub(crate) fn save_weights(&self, stem: &Path) -> Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.online
            .clone()
            .valid()
            .save_file(stem, &recorder)
            .map_err(|e| HighwayError::Resource(format!("failed to save weights: {e}")))
    }

    /// Load network weights from `<stem>.mpk`, replacing online and target.
    pub(crate) fn load_weights(&mut self, stem: &Path) -> Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let network: QNetwork<TrainBackend> = QNetworkConfig::new(self.obs_dim, self.n_actions)
            .with_hidden_dim(self.config.hidden_dim)
            .init(&self.device)
            .load_file(stem, &recorder, &self.device)
            .map_err(|e| HighwayError::CorruptData(format!("failed to load weights: {e}")))?;

        self.online = network;
        self.target = self.online.valid();
        Ok(())
    }

    fn q_values(&self, obs: &[f32]) -> Vec<f32> {
        let input = Tensor::<InferBackend, 1>::from_data(TensorData::from(obs), &self.device)
            .reshape([1, self.obs_dim]);
        self.target
            .forward(input)
            .into_data()
            .to_vec()
            .expect("f32 tensor data extraction")
    }

    /// Decay epsilon linearly over the configured number of steps.
    fn decay_epsilon(&mut self) {
        let c = &self.config;
        if c.epsilon_decay_steps == 0 {
            self.epsilon = c.epsilon_end;
            return;
        }
        let progress = (self.env_steps as f32 / c.epsilon_decay_steps as f32).min(1.0);
        self.epsilon = c.epsilon_start + (c.epsilon_end - c.epsilon_start) * progress;
    }

    /// Perform one gradient update from the replay buffer.
    fn train_step(&mut self) -> f32 {
        let batch = self.replay.sample(self.config.batch_size);
        let batch_size = batch.len();
        let n_actions = self.n_actions;

        let mut states = Vec::with_capacity(batch_size * self.obs_dim);
        let mut next_states = Vec::with_capacity(batch_size * self.obs_dim);
        for t in &batch {
            states.extend_from_slice(&t.state);
            next_states.extend_from_slice(&t.next_state);
        }

        // Q(s, a) for the actions actually taken, via one-hot masking
        let state_tensor =
            Tensor::<TrainBackend, 1>::from_data(TensorData::from(states.as_slice()), &self.device)
                .reshape([batch_size, self.obs_dim]);
        let q_all = self.online.forward(state_tensor);

        let mut mask_data = vec![0.0f32; batch_size * n_actions];
        for (i, t) in batch.iter().enumerate() {
            mask_data[i * n_actions + t.action] = 1.0;
        }
        let mask = Tensor::<TrainBackend, 1>::from_data(
            TensorData::from(mask_data.as_slice()),
            &self.device,
        )
        .reshape([batch_size, n_actions]);
        let q_taken = (q_all * mask).sum_dim(1);

        // Bootstrapped targets from the frozen target network
        let next_tensor = Tensor::<InferBackend, 1>::from_data(
            TensorData::from(next_states.as_slice()),
            &self.device,
        )
        .reshape([batch_size, self.obs_dim]);
        let next_q_max: Vec<f32> = self
            .target
            .forward(next_tensor)
            .max_dim(1)
            .into_data()
            .to_vec()
            .expect("f32 tensor data extraction");

        let mut target_data = Vec::with_capacity(batch_size);
        for (i, t) in batch.iter().enumerate() {
            let bootstrap = if t.done {
                0.0
            } else {
                self.config.gamma * next_q_max[i]
            };
            target_data.push(t.reward + bootstrap);
        }
        let targets = Tensor::<TrainBackend, 1>::from_data(
            TensorData::from(target_data.as_slice()),
            &self.device,
        )
        .reshape([batch_size, 1]);

        // MSE loss on the taken actions
        let diff = q_taken - targets;
        let loss = (diff.clone() * diff).mean();
        let loss_val: f32 = loss
            .clone()
            .into_data()
            .to_vec::<f32>()
            .expect("f32 loss tensor extraction")[0];

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.online);
        self.online = self
            .optimizer
            .step(self.config.learning_rate, self.online.clone(), grads);

        loss_val
    }
}
