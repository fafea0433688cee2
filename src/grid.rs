//! Tile canvases for inspecting search results.

use crate::corpus::{load_rgb, CorpusImage};
use crate::error::Result;
use crate::persistence::atomic::write_atomic;
use crate::report::BatchReport;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::io::Cursor;
use std::path::Path;

/// Side length of one tile.
pub const TILE: u32 = 200;
/// Tiles per row in both layouts.
pub const COLUMNS: u32 = 5;
/// Width of the outline around the query tile.
pub const OUTLINE: u32 = 8;

const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Lowercase and collapse every run of non-alphanumerics into `_`.
pub fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending = false;
    for c in s.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending && !out.is_empty() {
                out.push('_');
            }
            pending = false;
            out.push(c);
        } else {
            pending = true;
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

fn load_tile(path: &Path) -> Result<RgbImage> {
    Ok(load_rgb(path)?
        .resize_exact(TILE, TILE, FilterType::Triangle)
        .to_rgb8())
}

fn save_png(canvas: RgbImage, out: &Path) -> Result<()> {
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(canvas).write_to(&mut bytes, ImageOutputFormat::Png)?;
    write_atomic(out, bytes.get_ref())
}

fn cell_origin(cell: u32) -> (i64, i64) {
    (((cell % COLUMNS) * TILE) as i64, ((cell / COLUMNS) * TILE) as i64)
}

/// One row of up to five tiles on a 1000×200 canvas.
///
/// Tile `j` always sits in column `j`; an unreadable image leaves its cell black.
pub fn render_strip(images: &[CorpusImage], out: &Path) -> Result<BatchReport> {
    let mut canvas = RgbImage::new(COLUMNS * TILE, TILE);
    let mut report = BatchReport::new();

    for (j, image) in images.iter().take(COLUMNS as usize).enumerate() {
        match load_tile(&image.path) {
            Ok(tile) => {
                let (x, y) = cell_origin(j as u32);
                imageops::replace(&mut canvas, &tile, x, y);
                report.processed(j, image.name.clone());
            }
            Err(e) => report.skipped(image.name.clone(), e),
        }
    }

    save_png(canvas, out)?;
    Ok(report)
}

/// A 5×5 grid on a 1000×1000 canvas: the query at the top left outlined in
/// red, neighbours filling the remaining cells in row-major order.
pub fn render_grid(query: &CorpusImage, neighbours: &[CorpusImage], out: &Path) -> Result<BatchReport> {
    let mut canvas = RgbImage::new(COLUMNS * TILE, COLUMNS * TILE);
    let mut report = BatchReport::new();

    match load_tile(&query.path) {
        Ok(mut tile) => {
            for inset in 0..OUTLINE {
                let side = TILE - 2 * inset;
                let rect = Rect::at(inset as i32, inset as i32).of_size(side, side);
                draw_hollow_rect_mut(&mut tile, rect, RED);
            }
            imageops::replace(&mut canvas, &tile, 0, 0);
            report.processed(0, query.name.clone());
        }
        Err(e) => report.skipped(query.name.clone(), e),
    }

    let cells = (COLUMNS * COLUMNS - 1) as usize;
    for (j, image) in neighbours.iter().take(cells).enumerate() {
        let cell = j as u32 + 1;
        match load_tile(&image.path) {
            Ok(tile) => {
                let (x, y) = cell_origin(cell);
                imageops::replace(&mut canvas, &tile, x, y);
                report.processed(cell as usize, image.name.clone());
            }
            Err(e) => report.skipped(image.name.clone(), e),
        }
    }

    save_png(canvas, out)?;
    Ok(report)
}
