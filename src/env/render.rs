//! Frame rendering for the highway environment
//!
//! Draws the road, lane markings and vehicles into an RGB buffer using the
//! plotters bitmap backend. Only used in frame-capture mode.

use plotters::prelude::*;

use super::highway::{HighwayEnv, LANE_WIDTH, VEHICLE_LENGTH};
use super::Frame;

const FRAME_WIDTH: u32 = 600;
const FRAME_HEIGHT: u32 = 150;

/// Meters of road visible in one frame
const VIEWPORT_METERS: f64 = 150.0;
/// Fraction of the viewport kept behind the ego vehicle
const EGO_VIEW_OFFSET: f64 = 0.3;

const ROAD_COLOR: RGBColor = RGBColor(100, 100, 100);
const GRASS_COLOR: RGBColor = RGBColor(80, 120, 60);
const MARKING_COLOR: RGBColor = RGBColor(220, 220, 220);
const EGO_COLOR: RGBColor = RGBColor(60, 110, 220);
const EGO_CRASHED_COLOR: RGBColor = RGBColor(220, 60, 60);
const TRAFFIC_COLOR: RGBColor = RGBColor(230, 200, 60);

impl HighwayEnv {
    /// Render the current world state into an owned RGB frame.
    pub(crate) fn render_frame(&self) -> Frame {
        let mut data = vec![0u8; (FRAME_WIDTH * FRAME_HEIGHT * 3) as usize];

        let lanes = self.config.lanes_count;
        let scale = FRAME_WIDTH as f64 / VIEWPORT_METERS;
        let view_left = self.ego.x - VIEWPORT_METERS * EGO_VIEW_OFFSET;

        let road_height = (lanes as f64 * LANE_WIDTH * scale) as i32;
        let road_top = (FRAME_HEIGHT as i32 - road_height) / 2;
        let car_w = (VEHICLE_LENGTH * scale) as i32;
        let car_h = ((LANE_WIDTH - 1.5) * scale) as i32;

        let to_px = |x: f64| ((x - view_left) * scale) as i32;
        let lane_top = |lane: usize| road_top + (lane as f64 * LANE_WIDTH * scale) as i32;

        {
            let root =
                BitMapBackend::with_buffer(&mut data, (FRAME_WIDTH, FRAME_HEIGHT)).into_drawing_area();
            let _ = root.fill(&GRASS_COLOR);

            // Road band
            let _ = root.draw(&Rectangle::new(
                [(0, road_top), (FRAME_WIDTH as i32, road_top + road_height)],
                ROAD_COLOR.filled(),
            ));

            // Lane markings
            for lane in 0..=lanes {
                let y = road_top + (lane as f64 * LANE_WIDTH * scale) as i32;
                let _ = root.draw(&Rectangle::new(
                    [(0, y), (FRAME_WIDTH as i32, y + 1)],
                    MARKING_COLOR.filled(),
                ));
            }

            // Traffic vehicles
            for vehicle in &self.traffic {
                let x = to_px(vehicle.x);
                if x + car_w < 0 || x > FRAME_WIDTH as i32 {
                    continue;
                }
                let y = lane_top(vehicle.lane) + (0.75 * scale) as i32;
                let _ = root.draw(&Rectangle::new(
                    [(x, y), (x + car_w, y + car_h)],
                    TRAFFIC_COLOR.filled(),
                ));
            }

            // Ego vehicle on top
            let color = if self.crashed {
                EGO_CRASHED_COLOR
            } else {
                EGO_COLOR
            };
            let x = to_px(self.ego.x);
            let y = lane_top(self.ego.lane) + (0.75 * scale) as i32;
            let _ = root.draw(&Rectangle::new(
                [(x, y), (x + car_w, y + car_h)],
                color.filled(),
            ));

            let _ = root.present();
        }

        Frame {
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            data,
        }
    }
}
