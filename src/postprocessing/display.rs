// Handles video playback post-solve

use std::{
    collections::HashMap,
    error::Error,
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use image::{DynamicImage, GenericImageView, imageops::FilterType};
use minifb::{Key, Window, WindowOptions};
use ndarray::Array1;
use screen_size::get_primary_screen_size as get_screen_size;

/// Window width used when the screen size is unavailable
const FALLBACK_SCREEN_WIDTH: u64 = 1280;

/// Pick which simulation ticks to show so that playback at `fps` runs at
/// simulated real time.
///
/// Parameters
/// - `fps` - The desired *video* frames per second
/// - `temporal_map` - A vector with indices pointing to the time-value in that iteration
///
/// Returns
/// - Tick indices, one per video frame, non-decreasing
pub fn sample_frame_indices(fps: usize, temporal_map: &[f32]) -> Vec<usize> {
    let Some(&elapsed_time) = temporal_map.last() else {
        return Vec::new();
    };

    let total_frames = ((elapsed_time * fps as f32).floor() as usize).max(1);

    Array1::linspace(0., elapsed_time, total_frames)
        .iter()
        .filter_map(|&t| {
            let t = t.min(elapsed_time);
            temporal_map.iter().position(|&f| f >= t)
        })
        .collect()
}

/// Frame files in `frames_dir` named `<tick>.png`, one per requested tick
/// and in the requested order. A tick requested twice yields its path
/// twice; ticks with no frame on disk are skipped.
fn frame_paths(frames_dir: &Path, desired_frames: &[usize]) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let frames: HashMap<usize, PathBuf> = fs::read_dir(frames_dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("png"))
        .filter_map(|path| {
            let idx = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<usize>().ok())?;

            Some((idx, path))
        })
        .collect();

    Ok(desired_frames
        .iter()
        .filter_map(|idx| frames.get(idx).cloned())
        .collect())
}

/// Open a window and play the simulation solution in realtime. Samples
/// simulation frames (png images) in such a way that the video plays
/// at true speed.
///
/// Parameters
/// - `fps` - The desired *video* frames per second
/// - `temporal_map` - A vector with indices pointing to the time-value in that iteration
/// - `frames_dir` - The directory that contains the frames (png images) to animate.
pub fn play_video(fps: usize, temporal_map: &[f32], frames_dir: &Path) -> Result<(), Box<dyn Error>> {
    let desired_frames = sample_frame_indices(fps, temporal_map);
    let paths = frame_paths(frames_dir, &desired_frames)?;
    if paths.is_empty() {
        return Err("no PNG frames found".into());
    }

    // load all frames as DynamicImage
    let originals: Vec<DynamicImage> = paths.iter().map(image::open).collect::<Result<_, _>>()?;

    // determine base dimensions
    let (w, h) = originals[0].dimensions();
    let screen_w = get_screen_size()
        .map(|(w, _)| w as u64)
        .unwrap_or(FALLBACK_SCREEN_WIDTH);
    let init_w = screen_w / 2;
    let init_h = (init_w as f32 * (h as f32 / w as f32)) as u64;

    let mut window = Window::new(
        "Fluid 2D",
        init_w as usize,
        init_h as usize,
        WindowOptions {
            resize: true,
            ..WindowOptions::default()
        },
    )?;

    let frame_time = Duration::from_secs_f64(1.0 / fps as f64);
    let start = Instant::now();

    while window.is_open() && !window.is_key_down(Key::Escape) {
        let (win_w, win_h) = window.get_size();
        let elapsed = Instant::now().duration_since(start);
        let tick = (elapsed.as_secs_f64() * fps as f64) as usize;
        let idx = tick % originals.len();

        // resize & convert to 0RGB buffer
        let img = originals[idx]
            .resize_exact(win_w as u32, win_h as u32, FilterType::Nearest)
            .to_rgba8();

        let buffer: Vec<u32> = img
            .pixels()
            .map(|px| ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | (px[2] as u32))
            .collect();

        window.update_with_buffer(&buffer, win_w, win_h)?;

        // throttle to fps
        let next = start + frame_time * (tick + 1) as u32;
        if let Some(d) = next.checked_duration_since(Instant::now()) {
            std::thread::sleep(d);
        }
    }

    Ok(())
}
