//! Kinematic highway simulation
//!
//! The ego vehicle drives on a multi-lane highway among traffic vehicles.
//! One policy step advances the world by one second; collisions terminate
//! the episode, the duration cap truncates it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Action, Environment, Frame, RenderMode, StepInfo, StepResult};
use crate::config::EnvConfig;
use crate::error::{HighwayError, Result};

/// Vehicles encoded in the observation, ego first
pub const N_OBS_VEHICLES: usize = 5;
/// Features per observed vehicle: presence, x, y, vx, vy
pub const OBS_FEATURES: usize = 5;

/// Lane width in meters, used for lateral coordinates and rendering
pub(crate) const LANE_WIDTH: f64 = 4.0;
/// Vehicle length in meters; closer same-lane gaps count as collisions
pub(crate) const VEHICLE_LENGTH: f64 = 5.0;

const DT: f64 = 1.0;
const EGO_MIN_SPEED: f64 = 20.0;
const EGO_MAX_SPEED: f64 = 30.0;
const EGO_SPEED_DELTA: f64 = 5.0;
const TRAFFIC_MIN_SPEED: f64 = 18.0;
const TRAFFIC_MAX_SPEED: f64 = 28.0;
const TRAFFIC_SPACING: f64 = 22.0;
const TRAFFIC_LANE_CHANGE_PROB: f64 = 0.03;
const FOLLOW_DISTANCE: f64 = 15.0;

#[derive(Debug, Clone)]
pub(crate) struct Vehicle {
    pub(crate) x: f64,
    pub(crate) lane: usize,
    pub(crate) speed: f64,
}

impl Vehicle {
    fn y(&self) -> f64 {
        self.lane as f64 * LANE_WIDTH + LANE_WIDTH / 2.0
    }
}

/// Simulated multi-lane highway with a single learning-controlled ego vehicle
pub struct HighwayEnv {
    pub(crate) config: EnvConfig,
    render_mode: RenderMode,
    rng: StdRng,
    pub(crate) ego: Vehicle,
    pub(crate) traffic: Vec<Vehicle>,
    pub(crate) steps: usize,
    pub(crate) crashed: bool,
    closed: bool,
    needs_reset: bool,
}

impl HighwayEnv {
    /// Construct a configured environment. Prefer [`super::make_highway_env`],
    /// which validates the configuration first.
    pub fn new(config: EnvConfig, render_mode: RenderMode) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            render_mode,
            rng,
            ego: Vehicle {
                x: 0.0,
                lane: 0,
                speed: EGO_MIN_SPEED,
            },
            traffic: Vec::new(),
            steps: 0,
            crashed: false,
            closed: false,
            needs_reset: true,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(HighwayError::Resource(
                "environment used after close".to_string(),
            ));
        }
        Ok(())
    }

    fn spawn_traffic(&mut self) {
        self.traffic.clear();
        let lanes = self.config.lanes_count;
        let mut x = self.ego.x;
        for _ in 0..self.config.vehicles_count {
            x += TRAFFIC_SPACING + self.rng.gen_range(0.0..TRAFFIC_SPACING);
            self.traffic.push(Vehicle {
                x,
                lane: self.rng.gen_range(0..lanes),
                speed: self.rng.gen_range(TRAFFIC_MIN_SPEED..TRAFFIC_MAX_SPEED),
            });
        }
    }

    fn apply_action(&mut self, action: Action) {
        let lanes = self.config.lanes_count;
        match action {
            Action::LaneLeft => {
                if self.ego.lane > 0 {
                    self.ego.lane -= 1;
                }
            }
            Action::LaneRight => {
                if self.ego.lane + 1 < lanes {
                    self.ego.lane += 1;
                }
            }
            Action::Faster => {
                self.ego.speed = (self.ego.speed + EGO_SPEED_DELTA).min(EGO_MAX_SPEED);
            }
            Action::Slower => {
                self.ego.speed = (self.ego.speed - EGO_SPEED_DELTA).max(EGO_MIN_SPEED);
            }
            Action::Idle => {}
        }
    }

    fn advance_traffic(&mut self) {
        let lanes = self.config.lanes_count;
        let ego = self.ego.clone();
        let snapshot = self.traffic.clone();

        for (i, vehicle) in self.traffic.iter_mut().enumerate() {
            // Occasional lane drift
            if lanes > 1 && self.rng.gen_bool(TRAFFIC_LANE_CHANGE_PROB) {
                if vehicle.lane == 0 {
                    vehicle.lane = 1;
                } else if vehicle.lane + 1 >= lanes || self.rng.gen_bool(0.5) {
                    vehicle.lane -= 1;
                } else {
                    vehicle.lane += 1;
                }
            }

            // Match the speed of a close leader to keep traffic flowing
            let mut leader_speed: Option<f64> = None;
            for (j, other) in snapshot.iter().enumerate() {
                if j != i && other.lane == vehicle.lane {
                    let gap = other.x - vehicle.x;
                    if gap > 0.0 && gap < FOLLOW_DISTANCE {
                        leader_speed = Some(other.speed);
                    }
                }
            }
            if ego.lane == vehicle.lane {
                let gap = ego.x - vehicle.x;
                if gap > 0.0 && gap < FOLLOW_DISTANCE {
                    leader_speed = Some(ego.speed);
                }
            }
            if let Some(speed) = leader_speed {
                vehicle.speed = vehicle.speed.min(speed);
            }

            vehicle.x += vehicle.speed * DT;
        }
    }

    fn detect_collision(&self, ego_x_before: f64, traffic_before: &[Vehicle]) -> bool {
        for (vehicle, before) in self.traffic.iter().zip(traffic_before) {
            if vehicle.lane != self.ego.lane {
                continue;
            }
            let dx_after = vehicle.x - self.ego.x;
            if dx_after.abs() < VEHICLE_LENGTH {
                return true;
            }
            // Pass-through within one step also counts
            let dx_before = before.x - ego_x_before;
            if dx_before.signum() != dx_after.signum() && before.lane == self.ego.lane {
                return true;
            }
        }
        false
    }

    fn compute_reward(&self) -> f64 {
        let c = &self.config;
        let speed_ratio = (self.ego.speed - EGO_MIN_SPEED) / (EGO_MAX_SPEED - EGO_MIN_SPEED);
        let lane_ratio = if c.lanes_count > 1 {
            self.ego.lane as f64 / (c.lanes_count - 1) as f64
        } else {
            1.0
        };

        let mut reward = c.high_speed_reward * speed_ratio + c.right_lane_reward * lane_ratio;
        if self.crashed {
            reward += c.collision_reward;
        }

        if c.normalize_reward {
            let lo = c.collision_reward;
            let hi = c.high_speed_reward + c.right_lane_reward;
            reward = if hi > lo {
                ((reward - lo) / (hi - lo)).clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
        reward
    }

    fn observation(&self) -> Vec<f32> {
        let road_width = self.config.lanes_count as f64 * LANE_WIDTH;
        let mut obs = vec![0.0f32; N_OBS_VEHICLES * OBS_FEATURES];

        // Ego row: absolute kinematics
        obs[0] = 1.0;
        obs[1] = ((self.ego.x / 1000.0).clamp(-1.0, 1.0)) as f32;
        obs[2] = (self.ego.y() / road_width) as f32;
        obs[3] = (self.ego.speed / EGO_MAX_SPEED) as f32;
        obs[4] = 0.0;

        // Nearest traffic rows: kinematics relative to the ego vehicle
        let mut nearest: Vec<&Vehicle> = self.traffic.iter().collect();
        nearest.sort_by(|a, b| {
            let da = (a.x - self.ego.x).abs();
            let db = (b.x - self.ego.x).abs();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });

        for (row, vehicle) in nearest.iter().take(N_OBS_VEHICLES - 1).enumerate() {
            let base = (row + 1) * OBS_FEATURES;
            obs[base] = 1.0;
            obs[base + 1] = (((vehicle.x - self.ego.x) / 100.0).clamp(-1.0, 1.0)) as f32;
            obs[base + 2] = ((vehicle.y() - self.ego.y()) / road_width) as f32;
            obs[base + 3] = (((vehicle.speed - self.ego.speed) / EGO_MAX_SPEED).clamp(-1.0, 1.0))
                as f32;
            obs[base + 4] = 0.0;
        }

        obs
    }
}

impl Environment for HighwayEnv {
    fn reset(&mut self) -> Result<Vec<f32>> {
        self.ensure_open()?;

        let lanes = self.config.lanes_count;
        self.ego = Vehicle {
            x: 0.0,
            lane: self.rng.gen_range(0..lanes),
            speed: 25.0f64.clamp(EGO_MIN_SPEED, EGO_MAX_SPEED),
        };
        self.spawn_traffic();
        self.steps = 0;
        self.crashed = false;
        self.needs_reset = false;

        Ok(self.observation())
    }

    fn step(&mut self, action: Action) -> Result<StepResult> {
        self.ensure_open()?;
        if self.needs_reset {
            return Err(HighwayError::Resource(
                "step called before reset".to_string(),
            ));
        }

        let ego_x_before = self.ego.x;
        let traffic_before = self.traffic.clone();

        self.apply_action(action);
        self.advance_traffic();
        self.ego.x += self.ego.speed * DT;

        self.crashed = self.detect_collision(ego_x_before, &traffic_before);
        self.steps += 1;

        let terminated = self.crashed;
        let truncated = !terminated && self.steps >= self.config.duration;
        if terminated || truncated {
            self.needs_reset = true;
        }

        Ok(StepResult {
            observation: self.observation(),
            reward: self.compute_reward(),
            terminated,
            truncated,
            info: StepInfo {
                speed: self.ego.speed,
                lane: self.ego.lane,
                crashed: self.crashed,
            },
        })
    }

    fn render(&mut self) -> Option<Frame> {
        if self.closed || self.render_mode != RenderMode::FrameCapture {
            return None;
        }
        Some(self.render_frame())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn observation_dim(&self) -> usize {
        N_OBS_VEHICLES * OBS_FEATURES
    }

    fn action_count(&self) -> usize {
        Action::COUNT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::make_highway_env;

    fn test_config() -> EnvConfig {
        EnvConfig {
            lanes_count: 3,
            vehicles_count: 10,
            duration: 40,
            seed: Some(7),
            ..Default::default()
        }
    }

    #[test]
    fn test_reset_observation_shape() {
        let mut env = make_highway_env(&test_config(), RenderMode::None).unwrap();
        let obs = env.reset().unwrap();
        assert_eq!(obs.len(), env.observation_dim());
        assert_eq!(obs.len(), N_OBS_VEHICLES * OBS_FEATURES);
        // Ego presence flag
        assert_eq!(obs[0], 1.0);
    }

    #[test]
    fn test_episode_truncates_at_duration_cap() {
        let config = EnvConfig {
            vehicles_count: 0,
            duration: 5,
            ..test_config()
        };
        let mut env = make_highway_env(&config, RenderMode::None).unwrap();
        env.reset().unwrap();

        for i in 0..5 {
            let result = env.step(Action::Idle).unwrap();
            assert!(!result.terminated, "no traffic, no collision");
            if i < 4 {
                assert!(!result.truncated);
            } else {
                assert!(result.truncated);
            }
        }
    }

    #[test]
    fn test_step_before_reset_fails() {
        let mut env = make_highway_env(&test_config(), RenderMode::None).unwrap();
        assert!(env.step(Action::Idle).is_err());
    }

    #[test]
    fn test_step_after_close_fails() {
        let mut env = make_highway_env(&test_config(), RenderMode::None).unwrap();
        env.reset().unwrap();
        env.close().unwrap();
        assert!(env.step(Action::Idle).is_err());
        // Close is idempotent
        assert!(env.close().is_ok());
    }

    #[test]
    fn test_seeded_envs_agree() {
        let config = test_config();
        let mut a = make_highway_env(&config, RenderMode::None).unwrap();
        let mut b = make_highway_env(&config, RenderMode::None).unwrap();

        assert_eq!(a.reset().unwrap(), b.reset().unwrap());
        for _ in 0..10 {
            let ra = a.step(Action::Faster).unwrap();
            let rb = b.step(Action::Faster).unwrap();
            assert_eq!(ra.observation, rb.observation);
            assert_eq!(ra.reward, rb.reward);
            if ra.terminated || ra.truncated {
                break;
            }
        }
    }

    #[test]
    fn test_normalized_reward_in_unit_interval() {
        let mut env = make_highway_env(&test_config(), RenderMode::None).unwrap();
        env.reset().unwrap();
        for _ in 0..40 {
            let result = env.step(Action::Faster).unwrap();
            assert!((0.0..=1.0).contains(&result.reward));
            if result.terminated || result.truncated {
                break;
            }
        }
    }

    #[test]
    fn test_render_none_outside_frame_capture() {
        let mut env = make_highway_env(&test_config(), RenderMode::None).unwrap();
        env.reset().unwrap();
        assert!(env.render().is_none());
    }

    #[test]
    fn test_render_produces_frame_in_frame_capture() {
        let mut env = make_highway_env(&test_config(), RenderMode::FrameCapture).unwrap();
        env.reset().unwrap();
        let frame = env.render().expect("frame in frame-capture mode");
        assert_eq!(frame.data.len(), (frame.width * frame.height * 3) as usize);
    }
}
