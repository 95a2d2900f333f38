use clap::{Parser, Subcommand};
use highway_rl::config::{self, Depth, EnvConfig, EVOLUTION_FPS, RECORD_FPS};
use highway_rl::env::{make_highway_env, Action, Environment, RenderMode};
use highway_rl::error::Result;
use highway_rl::training::TrainingLoop;
use highway_rl::viz::{concat_gifs, record_rollout, render_reward_chart, save_gif};
use rand::Rng;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "highway-rl", about = "DQN experiment harness for a simulated highway driving task", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save an untrained snapshot with randomly initialized weights
    CreateUntrained,
    /// Train an agent for the given depth's timestep budget
    Train {
        /// Training depth preset
        #[arg(value_enum)]
        depth: Depth,
    },
    /// Record rollout GIFs from persisted snapshots
    Record {
        /// Record only this depth instead of all three
        #[arg(value_enum)]
        depth: Option<Depth>,
        /// Environment steps to record
        #[arg(long, default_value_t = config::DEFAULT_RECORD_STEPS)]
        steps: usize,
    },
    /// Concatenate the per-depth rollout GIFs into the evolution GIF
    Evolution,
    /// Plot the reward curve from the full run's evaluation record
    Plot,
    /// Run one random-action episode for visualization and debugging
    TestEnv,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::CreateUntrained => run_training(Depth::Untrained),
        Commands::Train { depth } => run_training(depth),
        Commands::Record { depth, steps } => {
            let depths = match depth {
                Some(depth) => vec![depth],
                None => vec![Depth::Untrained, Depth::Half, Depth::Full],
            };
            for depth in depths {
                record_depth(depth, steps)?;
            }
            Ok(())
        }
        Commands::Evolution => {
            let inputs: Vec<PathBuf> = [Depth::Untrained, Depth::Half, Depth::Full]
                .into_iter()
                .map(Depth::gif_path)
                .collect();
            let output = PathBuf::from(config::MEDIA_DIR).join("evolution.gif");
            concat_gifs(&inputs, &output, EVOLUTION_FPS)
        }
        Commands::Plot => {
            let output = PathBuf::from(config::MEDIA_DIR).join("reward_curve.png");
            render_reward_chart(&Depth::Full.run_config().evaluations_path(), &output)
        }
        Commands::TestEnv => run_random_episode(),
    }
}

fn run_training(depth: Depth) -> Result<()> {
    let outcome = TrainingLoop::new(depth.run_config())?.run()?;
    info!(
        model = %outcome.model_path.display(),
        timesteps = outcome.timesteps,
        episodes = outcome.episodes,
        "snapshot ready"
    );
    Ok(())
}

fn record_depth(depth: Depth, steps: usize) -> Result<()> {
    let frames = record_rollout(&depth.model_path(), &EnvConfig::default(), steps)?;
    save_gif(&frames, &depth.gif_path(), RECORD_FPS)
}

/// Drive a random (untrained) agent through one episode.
fn run_random_episode() -> Result<()> {
    let mut env = make_highway_env(&EnvConfig::default(), RenderMode::Interactive)?;
    let mut rng = rand::thread_rng();

    env.reset()?;
    let mut total_reward = 0.0;
    loop {
        let action = Action::from(rng.gen_range(0..env.action_count()));
        let step = match env.step(action) {
            Ok(step) => step,
            Err(e) => {
                let _ = env.close();
                return Err(e);
            }
        };
        total_reward += step.reward;
        info!(
            ?action,
            reward = step.reward,
            speed = step.info.speed,
            lane = step.info.lane,
            "step"
        );
        if step.terminated || step.truncated {
            break;
        }
    }

    info!(total_reward, "episode finished");
    env.close()
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,highway_rl=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
