pub mod agent;
pub mod config;
pub mod env;
pub mod error;
pub mod training;
pub mod viz;

pub use agent::{DqnAgent, QNetwork, QNetworkConfig, ReplayBuffer, Transition};
pub use config::{Depth, DqnConfig, EnvConfig, EvalConfig, TrainRunConfig};
pub use env::{
    make_highway_env, make_monitored_env, Action, Environment, EpisodeRecord, Frame, HighwayEnv,
    Monitor, RenderMode, StepResult,
};
pub use error::{HighwayError, Result};
pub use training::{
    load_evaluations, CheckpointStore, EvalEntry, EvalProbe, SnapshotMeta, TrainingLoop,
    TrainingOutcome,
};
pub use viz::{
    concat_gifs, load_gif_frames, record_rollout, render_reward_chart, save_gif, FrameSequence,
};
