//! DQN Agent
//!
//! Value-based learning agent built on the Burn framework with the ndarray
//! backend. The agent exposes a narrow contract: action selection, transition
//! feedback and weight persistence.

mod dqn;
mod network;
mod replay;

pub use dqn::DqnAgent;
pub use network::{QNetwork, QNetworkConfig};
pub use replay::{ReplayBuffer, Transition};

/// Inference backend (CPU, ndarray)
pub type InferBackend = burn::backend::NdArray<f32>;
/// Training backend with autodiff
pub type TrainBackend = burn::backend::Autodiff<InferBackend>;
