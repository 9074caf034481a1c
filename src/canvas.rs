//! Raster drawing surface on an equirectangular lon/lat plot.
//!
//! A [`Canvas`] owns the plot area only. [`Canvas::finish`] lays out the title,
//! the framed map and an optional legend on a white page and crops the page
//! to its content.

use std::fmt;
use std::str::FromStr;

use image::{imageops, Rgba, RgbaImage};

use crate::font;
use crate::geometry::Rectangle;
use crate::palette::Color;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Visible lon/lat window of a rendered map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderTarget {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Default for RenderTarget {
    fn default() -> Self {
        Self::GLOBE
    }
}

impl RenderTarget {
    pub const GLOBE: RenderTarget = RenderTarget {
        min_lon: -180.0,
        max_lon: 180.0,
        min_lat: -90.0,
        max_lat: 90.0,
    };

    fn lon_extent(&self) -> f64 {
        (self.max_lon - self.min_lon).abs()
    }

    fn lat_extent(&self) -> f64 {
        (self.max_lat - self.min_lat).abs()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBoundaries(pub String);

impl fmt::Display for InvalidBoundaries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid boundaries {:?}: expected (min_lon, max_lon, min_lat, max_lat) with non-empty spans",
            self.0
        )
    }
}

impl std::error::Error for InvalidBoundaries {}

/// Parses a literal 4-tuple such as `(-30, 45, 15, 60)` or `[-30,45,15,60]`.
impl FromStr for RenderTarget {
    type Err = InvalidBoundaries;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidBoundaries(s.to_string());
        let inner = s
            .trim()
            .trim_start_matches(['(', '['])
            .trim_end_matches([')', ']']);

        let values = inner
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| err())?;

        let [min_lon, max_lon, min_lat, max_lat] = values[..] else {
            return Err(err());
        };
        let target = RenderTarget { min_lon, max_lon, min_lat, max_lat };

        if values.iter().any(|v| !v.is_finite()) || target.lon_extent() == 0.0 || target.lat_extent() == 0.0 {
            return Err(err());
        }
        Ok(target)
    }
}

/// A single swatch + label row of the legend.
#[derive(Clone, Debug, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: Color,
    pub alpha: f32,
}

/// Plot area for one artifact. Never shared between renders.
pub struct Canvas {
    target: RenderTarget,
    plot: RgbaImage,
    text_scale: u32,
}

impl Canvas {
    /// Fit `target` into a `width` x `height` pixel figure keeping one degree
    /// of longitude as wide as one degree of latitude is tall.
    pub fn new(target: RenderTarget, width: u32, height: u32) -> Self {
        let lon = target.lon_extent().max(f64::EPSILON);
        let lat = target.lat_extent().max(f64::EPSILON);
        let px_per_degree = (width as f64 / lon).min(height as f64 / lat);

        let plot_w = ((lon * px_per_degree).round() as u32).max(1);
        let plot_h = ((lat * px_per_degree).round() as u32).max(1);

        Self {
            target,
            plot: RgbaImage::from_pixel(plot_w, plot_h, BACKGROUND),
            text_scale: (height / 450).max(1),
        }
    }

    pub fn width(&self) -> u32 {
        self.plot.width()
    }

    pub fn height(&self) -> u32 {
        self.plot.height()
    }

    /// Plot area pixels, without title, frame or legend.
    pub fn plot(&self) -> &RgbaImage {
        &self.plot
    }

    /// Map lon/lat to fractional pixel coordinates (y grows southwards).
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let t = &self.target;
        let x = (lon - t.min_lon) / (t.max_lon - t.min_lon) * self.plot.width() as f64;
        let y = (t.max_lat - lat) / (t.max_lat - t.min_lat) * self.plot.height() as f64;
        (x, y)
    }

    /// Fill a batch of rectangles with one colour.
    ///
    /// The batch is rasterised to a coverage mask first, so overlaps inside
    /// one batch blend once. Rectangles outside the window are simply not
    /// visible.
    pub fn fill_rectangles(&mut self, rects: &[Rectangle], face: Color, alpha: f32, edge: Option<Color>) {
        let (w, h) = (self.plot.width(), self.plot.height());
        let mut mask = vec![false; (w * h) as usize];

        let mut boxes = Vec::with_capacity(rects.len());
        for rect in rects {
            let (west, east) = rect.lon_span();
            let (south, north) = rect.lat_span();
            let (xa, ya) = self.project(west, north);
            let (xb, yb) = self.project(east, south);
            let (x0, x1) = (xa.min(xb), xa.max(xb));
            let (y0, y1) = (ya.min(yb), ya.max(yb));
            boxes.push((x0, y0, x1, y1));

            let px0 = x0.round().clamp(0.0, w as f64) as u32;
            let px1 = x1.round().clamp(0.0, w as f64) as u32;
            let py0 = y0.round().clamp(0.0, h as f64) as u32;
            let py1 = y1.round().clamp(0.0, h as f64) as u32;
            for y in py0..py1 {
                for x in px0..px1 {
                    mask[(y * w + x) as usize] = true;
                }
            }
        }

        for y in 0..h {
            for x in 0..w {
                if mask[(y * w + x) as usize] {
                    blend_pixel(self.plot.get_pixel_mut(x, y), face, alpha);
                }
            }
        }

        if let Some(edge) = edge {
            for (x0, y0, x1, y1) in boxes {
                let ring = [(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)];
                self.stroke_pixels(&ring, edge);
            }
        }
    }

    /// Fill one polygon given as lon/lat rings (exterior first, holes after)
    /// using the even-odd rule.
    pub fn fill_polygon(&mut self, rings: &[Vec<(f64, f64)>], color: Color) {
        let projected: Vec<Vec<(f64, f64)>> = rings
            .iter()
            .map(|ring| ring.iter().map(|&(lon, lat)| self.project(lon, lat)).collect())
            .collect();

        let (w, h) = (self.plot.width() as i64, self.plot.height() as i64);
        let px = Rgba([color.r, color.g, color.b, 255]);
        let mut crossings = Vec::new();

        for y in 0..h {
            let sy = y as f64 + 0.5;
            crossings.clear();
            for ring in &projected {
                for edge in ring.windows(2) {
                    let ((ax, ay), (bx, by)) = (edge[0], edge[1]);
                    if (ay <= sy) != (by <= sy) {
                        crossings.push(ax + (sy - ay) / (by - ay) * (bx - ax));
                    }
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));

            for span in crossings.chunks_exact(2) {
                let x0 = ((span[0] - 0.5).ceil() as i64).max(0);
                let x1 = ((span[1] - 0.5).floor() as i64).min(w - 1);
                for x in x0..=x1 {
                    self.plot.put_pixel(x as u32, y as u32, px);
                }
            }
        }
    }

    /// Draw a lon/lat polyline one pixel wide.
    pub fn stroke_polyline(&mut self, points: &[(f64, f64)], color: Color) {
        let projected: Vec<(f64, f64)> = points.iter().map(|&(lon, lat)| self.project(lon, lat)).collect();
        self.stroke_pixels(&projected, color);
    }

    fn stroke_pixels(&mut self, points: &[(f64, f64)], color: Color) {
        let px = Rgba([color.r, color.g, color.b, 255]);
        let (w, h) = (self.plot.width() as f64, self.plot.height() as f64);

        for seg in points.windows(2) {
            let Some(((x0, y0), (x1, y1))) = clip_segment(seg[0], seg[1], w, h) else {
                continue;
            };
            for (x, y) in bresenham(x0, y0, x1, y1) {
                if x >= 0 && y >= 0 && (x as u32) < self.plot.width() && (y as u32) < self.plot.height() {
                    self.plot.put_pixel(x as u32, y as u32, px);
                }
            }
        }
    }

    /// Lay out title, framed plot and legend on a page cropped to content.
    pub fn finish(self, title: &str, legend: &[LegendEntry]) -> RgbaImage {
        let pad = 8 * self.text_scale;
        let title_scale = self.text_scale + 1;
        let label_scale = self.text_scale;

        let title_h = if title.is_empty() { 0 } else { font::text_height(title_scale) + pad };
        let legend_layout = LegendLayout::new(legend, label_scale, pad);

        let plot_w = self.plot.width();
        let plot_h = self.plot.height();
        let content_w = plot_w
            .max(font::text_width(title, title_scale))
            .max(legend_layout.width);
        let page_w = content_w + 2 * (pad + 1);
        let legend_h = if legend.is_empty() { 0 } else { pad + legend_layout.height };
        let page_h = pad + title_h + plot_h + 2 + legend_h + pad;

        let mut page = RgbaImage::from_pixel(page_w, page_h, BACKGROUND);

        if !title.is_empty() {
            let tx = (page_w - font::text_width(title, title_scale)) / 2;
            font::draw_text(&mut page, title, tx, pad, title_scale, Color::BLACK);
        }

        // Frame is drawn one pixel outside the plot area.
        let plot_x = (page_w - plot_w) / 2;
        let plot_y = pad + title_h + 1;
        imageops::replace(&mut page, &self.plot, plot_x as i64, plot_y as i64);
        draw_box(&mut page, plot_x - 1, plot_y - 1, plot_w + 2, plot_h + 2, Color::BLACK);

        if !legend.is_empty() {
            let lx = (page_w - legend_layout.width) / 2;
            let ly = plot_y + plot_h + 1 + pad;
            legend_layout.draw(&mut page, legend, lx, ly);
        }

        crop_to_content(&page, pad)
    }
}

/// Two-column legend: colour swatch then label, filled row by row.
struct LegendLayout {
    scale: u32,
    row_h: u32,
    col_w: u32,
    gap: u32,
    width: u32,
    height: u32,
}

impl LegendLayout {
    const COLUMNS: usize = 2;

    fn new(entries: &[LegendEntry], scale: u32, pad: u32) -> Self {
        let swatch = font::text_height(scale);
        let gap = pad;
        let row_h = swatch + scale * 3;
        let label_w = entries
            .iter()
            .map(|e| font::text_width(&e.label, scale))
            .max()
            .unwrap_or(0);
        let col_w = swatch + gap / 2 + label_w;

        if entries.is_empty() {
            return Self { scale, row_h, col_w, gap, width: 0, height: 0 };
        }

        let cols = entries.len().min(Self::COLUMNS) as u32;
        let rows = entries.len().div_ceil(Self::COLUMNS) as u32;
        Self {
            scale,
            row_h,
            col_w,
            gap,
            width: cols * col_w + (cols - 1) * gap + 2 * gap,
            height: rows * row_h + 2 * gap,
        }
    }

    fn draw(&self, page: &mut RgbaImage, entries: &[LegendEntry], x: u32, y: u32) {
        draw_box(page, x, y, self.width, self.height, Color::rgb(204, 204, 204));

        let swatch = font::text_height(self.scale);
        for (i, entry) in entries.iter().enumerate() {
            let col = (i % Self::COLUMNS) as u32;
            let row = (i / Self::COLUMNS) as u32;
            let ex = x + self.gap + col * (self.col_w + self.gap);
            let ey = y + self.gap + row * self.row_h;

            for dy in 0..swatch {
                for dx in 0..swatch {
                    blend_pixel(page.get_pixel_mut(ex + dx, ey + dy), entry.color, entry.alpha);
                }
            }
            font::draw_text(page, &entry.label, ex + swatch + self.gap / 2, ey, self.scale, Color::BLACK);
        }
    }
}

fn blend_pixel(dst: &mut Rgba<u8>, src: Color, alpha: f32) {
    let a = alpha.clamp(0.0, 1.0);
    let mix = |d: u8, s: u8| (s as f32 * a + d as f32 * (1.0 - a)).round() as u8;
    dst.0 = [mix(dst.0[0], src.r), mix(dst.0[1], src.g), mix(dst.0[2], src.b), 255];
}

fn draw_box(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Color) {
    if w == 0 || h == 0 {
        return;
    }
    let px = Rgba([color.r, color.g, color.b, 255]);
    for dx in 0..w {
        img.put_pixel(x + dx, y, px);
        img.put_pixel(x + dx, y + h - 1, px);
    }
    for dy in 0..h {
        img.put_pixel(x, y + dy, px);
        img.put_pixel(x + w - 1, y + dy, px);
    }
}

/// Crop to the bounding box of non-background pixels plus `pad`.
fn crop_to_content(img: &RgbaImage, pad: u32) -> RgbaImage {
    let mut min = (u32::MAX, u32::MAX);
    let mut max = (0u32, 0u32);
    for (x, y, px) in img.enumerate_pixels() {
        if *px != BACKGROUND {
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }
    }
    if min.0 == u32::MAX {
        return img.clone();
    }

    let x0 = min.0.saturating_sub(pad);
    let y0 = min.1.saturating_sub(pad);
    let x1 = (max.0 + pad + 1).min(img.width());
    let y1 = (max.1 + pad + 1).min(img.height());
    imageops::crop_imm(img, x0, y0, x1 - x0, y1 - y0).to_image()
}

/// Liang-Barsky clip of a segment to [0, w) x [0, h).
fn clip_segment(a: (f64, f64), b: (f64, f64), w: f64, h: f64) -> Option<((i64, i64), (i64, i64))> {
    if !(a.0.is_finite() && a.1.is_finite() && b.0.is_finite() && b.1.is_finite()) {
        return None;
    }
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    let max_x = w - 0.5;
    let max_y = h - 0.5;

    for (p, q) in [(-dx, a.0), (dx, max_x - a.0), (-dy, a.1), (dy, max_y - a.1)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }

    let start = (a.0 + t0 * dx, a.1 + t0 * dy);
    let end = (a.0 + t1 * dx, a.1 + t1 * dy);
    Some((
        (start.0.floor() as i64, start.1.floor() as i64),
        (end.0.floor() as i64, end.1.floor() as i64),
    ))
}

fn bresenham(x0: i64, y0: i64, x1: i64, y1: i64) -> Vec<(i64, i64)> {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);

    let mut points = Vec::with_capacity((dx - dy + 1) as usize);
    loop {
        points.push((x, y));
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    points
}
