//! Q-Network
//!
//! Fully connected network estimating action values from flattened
//! kinematics observations.

use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;

/// Q-network configuration
#[derive(Config, Debug)]
pub struct QNetworkConfig {
    /// Flattened observation length
    pub obs_dim: usize,
    /// Number of discrete actions
    pub n_actions: usize,
    /// Hidden layer width
    #[config(default = "128")]
    pub hidden_dim: usize,
}

/// MLP mapping observations to one Q-value per action
#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    q_head: Linear<B>,
    activation: Relu,
}

impl QNetworkConfig {
    /// Initialize the network on the given device.
    pub fn init<B: Backend>(&self, device: &B::Device) -> QNetwork<B> {
        QNetwork {
            fc1: LinearConfig::new(self.obs_dim, self.hidden_dim).init(device),
            fc2: LinearConfig::new(self.hidden_dim, self.hidden_dim).init(device),
            q_head: LinearConfig::new(self.hidden_dim, self.n_actions).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> QNetwork<B> {
    /// Forward pass returning Q-values for all actions, shape `[batch, n_actions]`.
    pub fn forward(&self, state: Tensor<B, 2>) -> Tensor<B, 2> {
        let hidden = self.activation.forward(self.fc1.forward(state));
        let hidden = self.activation.forward(self.fc2.forward(hidden));
        self.q_head.forward(hidden)
    }
}
