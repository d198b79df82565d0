use std::{error::Error, fs, path::Path, sync::mpsc};

use plotters::prelude::*;
use tracing::debug;

use crate::{DyeField, SolidMask};

/// Grey level solid cells are drawn with
const SOLID_SHADE: u8 = 128;

pub struct DisplayPacket {
    pub dye: DyeField,
    pub i: usize,
}

/// Composite one RGBA dye sample over black.
pub fn dye_pixel(rgba: [f32; 4]) -> RGBColor {
    let alpha = rgba[3].clamp(0., 1.);
    let channel = |c: f32| (255. * (c * alpha).clamp(0., 1.)).round() as u8;

    RGBColor(channel(rgba[0]), channel(rgba[1]), channel(rgba[2]))
}

/// Write a dye field to `<frames_dir>/<filename>` as a PNG, one pixel per
/// cell, with y pointing up.
pub fn image_save(
    dye: &DyeField,
    solid: &SolidMask,
    filename: &str,
    frames_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    let (cols, rows) = solid.shape();

    let filename = frames_dir.join(filename);

    let root = BitMapBackend::new(&filename, (cols as u32, rows as u32)).into_drawing_area();
    root.fill(&BLACK)?;

    for x in 0..cols {
        for y in 0..rows {
            let pixel_color = if solid[(x, y)] {
                RGBColor(SOLID_SHADE, SOLID_SHADE, SOLID_SHADE)
            } else {
                dye_pixel([dye[0][(x, y)], dye[1][(x, y)], dye[2][(x, y)], dye[3][(x, y)]])
            };

            root.draw_pixel((x as i32, (rows - 1 - y) as i32), &pixel_color)?;
        }
    }
    root.present()?;

    Ok(())
}

/// Save every inbound frame until the sending side hangs up.
pub fn image_io_loop(
    inbound_frames: mpsc::Receiver<DisplayPacket>,
    solid: SolidMask,
    frames_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    if frames_dir.exists() {
        fs::remove_dir_all(frames_dir)?;
    }
    fs::create_dir_all(frames_dir)?;

    let mut saved = 0;
    while let Ok(inbound) = inbound_frames.recv() {
        image_save(&inbound.dye, &solid, &format!("{}.png", inbound.i), frames_dir)?;
        saved += 1;
    }

    debug!("Image stream closed after {} frames", saved);
    Ok(())
}
