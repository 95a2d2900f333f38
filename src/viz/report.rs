//! Reporting Stage
//!
//! Stateless, idempotent transformations: a persisted evaluation record
//! becomes a line chart, and recorded frame sequences become animated GIFs.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use gif::{Encoder, Repeat};
use plotters::prelude::*;
use tracing::info;

use super::recorder::FrameSequence;
use crate::env::Frame;
use crate::error::{HighwayError, Result};
use crate::training::load_evaluations;

const CHART_WIDTH: u32 = 800;
const CHART_HEIGHT: u32 = 500;

fn render_err<E: std::fmt::Display>(e: E) -> HighwayError {
    HighwayError::Render(e.to_string())
}

/// Encode a frame sequence as an animated GIF at a fixed playback rate.
pub fn save_gif(sequence: &FrameSequence, path: &Path, fps: u16) -> Result<()> {
    let first = sequence
        .frames()
        .first()
        .ok_or_else(|| HighwayError::Render("no frames to encode".to_string()))?;
    let (width, height) = (first.width, first.height);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let mut encoder =
        Encoder::new(writer, width as u16, height as u16, &[]).map_err(render_err)?;
    encoder.set_repeat(Repeat::Infinite).map_err(render_err)?;

    // GIF frame delay is in centiseconds
    let delay = (100 / fps.max(1)).max(1);

    for frame in sequence.frames() {
        if frame.width != width || frame.height != height {
            return Err(HighwayError::Render(format!(
                "frame size mismatch: expected {width}x{height}, got {}x{}",
                frame.width, frame.height
            )));
        }
        let mut gif_frame =
            gif::Frame::from_rgb_speed(width as u16, height as u16, &frame.data, 10);
        gif_frame.delay = delay;
        encoder.write_frame(&gif_frame).map_err(render_err)?;
    }

    info!(path = %path.display(), frames = sequence.len(), "saved GIF");
    Ok(())
}

/// Load all frames from a GIF file.
pub fn load_gif_frames(path: &Path) -> Result<FrameSequence> {
    if !path.exists() {
        return Err(HighwayError::not_found(path));
    }

    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options
        .read_info(File::open(path)?)
        .map_err(|e| HighwayError::CorruptData(format!("GIF decode: {e}")))?;

    let mut sequence = FrameSequence::new();
    while let Some(frame) = decoder
        .read_next_frame()
        .map_err(|e| HighwayError::CorruptData(format!("GIF decode: {e}")))?
    {
        let width = frame.width as u32;
        let height = frame.height as u32;
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for pixel in frame.buffer.chunks_exact(4) {
            data.extend_from_slice(&pixel[..3]);
        }
        sequence.push(Frame {
            width,
            height,
            data,
        });
    }

    Ok(sequence)
}

/// Concatenate GIF files, in the given order, into a single animation.
///
/// Fails with NotFound if any input file is missing; frame order within and
/// across inputs is preserved verbatim.
pub fn concat_gifs(inputs: &[impl AsRef<Path>], output: &Path, fps: u16) -> Result<()> {
    let mut all = FrameSequence::new();
    for input in inputs {
        all.extend(load_gif_frames(input.as_ref())?);
    }
    save_gif(&all, output, fps)?;

    info!(inputs = inputs.len(), path = %output.display(), "saved concatenated GIF");
    Ok(())
}

/// Render a persisted evaluation record as a reward-vs-timesteps line chart.
pub fn render_reward_chart(evaluations: &Path, output: &Path) -> Result<()> {
    let entries = load_evaluations(evaluations)?;
    if entries.is_empty() {
        return Err(HighwayError::CorruptData(
            "evaluation record is empty".to_string(),
        ));
    }

    let points: Vec<(f64, f64)> = entries
        .iter()
        .map(|e| (e.timestep as f64, e.mean()))
        .collect();

    let x_max = points.last().map(|p| p.0).unwrap_or(1.0).max(1.0);
    let y_min = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let y_max = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let pad = ((y_max - y_min) * 0.1).max(0.1);

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let root = BitMapBackend::new(output, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Training Performance: Reward vs Timesteps",
            ("sans-serif", 20),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, (y_min - pad)..(y_max + pad))
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_desc("Timesteps")
        .y_desc("Mean Evaluation Reward")
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(LineSeries::new(points, BLUE.stroke_width(2)))
        .map_err(render_err)?;

    root.present().map_err(render_err)?;

    info!(path = %output.display(), entries = entries.len(), "saved reward chart");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;
    use std::path::PathBuf;

    fn unique_dir(tag: &str) -> PathBuf {
        let dir = temp_dir().join(format!("highway_rl_report_{tag}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn solid_frame(value: u8) -> Frame {
        Frame {
            width: 8,
            height: 4,
            data: vec![value; 8 * 4 * 3],
        }
    }

    fn sequence_of(values: &[u8]) -> FrameSequence {
        let mut seq = FrameSequence::new();
        for &v in values {
            seq.push(solid_frame(v));
        }
        seq
    }

    #[test]
    fn test_gif_roundtrip_preserves_frame_count() {
        let dir = unique_dir("roundtrip");
        let path = dir.join("clip.gif");

        save_gif(&sequence_of(&[10, 200, 10]), &path, 12).unwrap();
        let decoded = load_gif_frames(&path).unwrap();
        assert_eq!(decoded.len(), 3);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_sequence_extend_preserves_ordering_verbatim() {
        let mut merged = sequence_of(&[0, 250]);
        let first_two: Vec<Frame> = merged.frames().to_vec();
        merged.extend(sequence_of(&[120]));

        assert_eq!(merged.len(), 3);
        assert_eq!(&merged.frames()[..2], first_two.as_slice());
    }

    #[test]
    fn test_concat_preserves_input_ordering() {
        let dir = unique_dir("concat");
        let a = dir.join("a.gif");
        let b = dir.join("b.gif");
        let out = dir.join("out.gif");

        save_gif(&sequence_of(&[0, 250]), &a, 12).unwrap();
        save_gif(&sequence_of(&[120]), &b, 12).unwrap();

        concat_gifs(&[&a, &b], &out, 15).unwrap();

        let merged = load_gif_frames(&out).unwrap();
        assert_eq!(merged.len(), 3);
        // Frame order survives encoding: dark, bright, then mid-gray.
        // GIF palettes are quantized, so compare with tolerance.
        let first_px = |i: usize| merged.frames()[i].data[0] as i32;
        assert!(first_px(0) < 60, "expected dark frame first, got {}", first_px(0));
        assert!(first_px(1) > 190, "expected bright frame second, got {}", first_px(1));
        assert!(
            (60..=190).contains(&first_px(2)),
            "expected mid-gray frame last, got {}",
            first_px(2)
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_concat_with_missing_input_is_not_found() {
        let dir = unique_dir("missing");
        let a = dir.join("a.gif");
        save_gif(&sequence_of(&[1]), &a, 12).unwrap();

        let result = concat_gifs(&[&a, &dir.join("absent.gif")], &dir.join("out.gif"), 15);
        assert!(matches!(result, Err(HighwayError::NotFound { .. })));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_empty_sequence_cannot_be_encoded() {
        let dir = unique_dir("empty");
        let result = save_gif(&FrameSequence::new(), &dir.join("out.gif"), 12);
        assert!(matches!(result, Err(HighwayError::Render(_))));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_reward_chart_from_persisted_record() {
        let dir = unique_dir("chart");
        let record = dir.join("evaluations.json");
        let entries = vec![
            crate::training::EvalEntry {
                timestep: 50,
                mean_return: 1.0,
                episode_returns: vec![0.5, 1.5],
            },
            crate::training::EvalEntry {
                timestep: 100,
                mean_return: 2.0,
                episode_returns: vec![2.0, 2.0],
            },
        ];
        fs::write(&record, serde_json::to_vec(&entries).unwrap()).unwrap();

        let output = dir.join("curve.png");
        render_reward_chart(&record, &output).unwrap();
        assert!(output.exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_reward_chart_missing_record_is_not_found() {
        let dir = unique_dir("chart_missing");
        let result = render_reward_chart(&dir.join("absent.json"), &dir.join("curve.png"));
        assert!(matches!(result, Err(HighwayError::NotFound { .. })));
        let _ = fs::remove_dir_all(&dir);
    }
}
