//! Paint chart layouts onto an RGBA canvas and encode them as PNG.
//!
//! Text uses the public-domain 8x8 bitmap font, scaled per glyph and sampled
//! through the inverse of the label transform, so rotated labels need no
//! separate code path.

use std::io::Cursor;

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use super::layout::{
    Align, BalanceLayout, IntensityLayout, LegendEntry, Line, Point, Rect, TextSpec,
};
use super::palette::Rgb;
use super::ChartError;

/// Horizontal advance per glyph as a fraction of the font size.
const GLYPH_ASPECT: f64 = 0.75;

pub struct Canvas {
    img: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgb) -> Self {
        let mut canvas = Self {
            img: RgbaImage::new(width, height),
        };
        canvas.fill(background);
        canvas
    }

    pub fn width(&self) -> u32 {
        self.img.width()
    }

    pub fn height(&self) -> u32 {
        self.img.height()
    }

    pub fn fill(&mut self, color: Rgb) {
        let px = rgba(color);
        for p in self.img.pixels_mut() {
            *p = px;
        }
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb) {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return;
        }
        self.img.put_pixel(x as u32, y as u32, rgba(color));
    }

    /// Fill a rectangle. A non-empty rect always covers at least one pixel
    /// on each axis.
    pub fn fill_rect(&mut self, rect: &Rect, color: Rgb) {
        let span = |start: f64, len: f64| -> (i64, i64) {
            let a = start.round() as i64;
            let mut b = (start + len).round() as i64;
            if len > 0.0 && b <= a {
                b = a + 1;
            }
            (a, b)
        };
        let (x0, x1) = span(rect.x, rect.width);
        let (y0, y1) = span(rect.y, rect.height);
        for y in y0..y1 {
            for x in x0..x1 {
                self.put(x, y, color);
            }
        }
    }

    pub fn stroke_line(&mut self, line: &Line) {
        let dx = line.to.x - line.from.x;
        let dy = line.to.y - line.from.y;
        let length = dx.hypot(dy);
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as i64;
        let step_len = length / steps as f64;

        for i in 0..=steps {
            if let Some((on, off)) = line.dash {
                let travelled = i as f64 * step_len;
                if travelled % (on + off) >= on {
                    continue;
                }
            }
            let t = i as f64 / steps as f64;
            let x = line.from.x + dx * t;
            let y = line.from.y + dy * t;
            self.put(x.floor() as i64, y.floor() as i64, line.color);
        }
    }

    pub fn fill_circle(&mut self, center: Point, radius: f64, color: Rgb) {
        let r2 = radius * radius;
        let x0 = (center.x - radius).floor() as i64;
        let x1 = (center.x + radius).ceil() as i64;
        let y0 = (center.y - radius).floor() as i64;
        let y1 = (center.y + radius).ceil() as i64;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let px = x as f64 + 0.5 - center.x;
                let py = y as f64 + 0.5 - center.y;
                if px * px + py * py <= r2 {
                    self.put(x, y, color);
                }
            }
        }
    }

    pub fn draw_text(&mut self, spec: &TextSpec) {
        self.draw_text_rotated(spec, Point::new(0.0, 0.0), 0.0);
    }

    /// Draw `spec` in a frame rotated by `angle` radians around `origin`.
    ///
    /// `spec.x`/`spec.y` are interpreted inside that frame.
    pub fn draw_text_rotated(&mut self, spec: &TextSpec, origin: Point, angle: f64) {
        let glyphs: Vec<[u8; 8]> = spec.text.chars().map(glyph).collect();
        if glyphs.is_empty() || spec.size <= 0.0 {
            return;
        }

        let advance = spec.size * GLYPH_ASPECT;
        let text_width = advance * glyphs.len() as f64;
        let left = match spec.align {
            Align::Left => spec.x,
            Align::Center => spec.x - text_width / 2.0,
            Align::Right => spec.x - text_width,
        };
        let top = spec.y - spec.size;
        let (sin, cos) = angle.sin_cos();

        let to_world = |lx: f64, ly: f64| -> (f64, f64) {
            (
                origin.x + lx * cos - ly * sin,
                origin.y + lx * sin + ly * cos,
            )
        };
        let corners = [
            to_world(left - 1.0, top),
            to_world(left + text_width + 1.0, top),
            to_world(left - 1.0, top + spec.size),
            to_world(left + text_width + 1.0, top + spec.size),
        ];
        let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min).floor() as i64;
        let max_x = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max).ceil() as i64;
        let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min).floor() as i64;
        let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max).ceil() as i64;

        let min_x = min_x.max(0);
        let min_y = min_y.max(0);
        let max_x = max_x.min(self.width() as i64 - 1);
        let max_y = max_y.min(self.height() as i64 - 1);

        let cell_w = advance / 8.0;
        let cell_h = spec.size / 8.0;
        let inked = |u: f64, v: f64| -> bool {
            if u < 0.0 || v < 0.0 || u >= text_width || v >= spec.size {
                return false;
            }
            let index = (u / advance) as usize;
            let col = ((u - index as f64 * advance) / cell_w) as u32;
            let row = (v / cell_h) as usize;
            match glyphs.get(index) {
                Some(rows) if row < 8 && col < 8 => rows[row] & (1 << col) != 0,
                _ => false,
            }
        };

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f64 + 0.5 - origin.x;
                let dy = y as f64 + 0.5 - origin.y;
                let lx = dx * cos + dy * sin;
                let ly = -dx * sin + dy * cos;
                let (u, v) = (lx - left, ly - top);
                if inked(u, v) || (spec.bold && inked(u - 1.0, v)) {
                    self.put(x, y, spec.color);
                }
            }
        }
    }

    pub fn into_png(self) -> Result<Vec<u8>, ChartError> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(self.img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| ChartError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

fn rgba(c: Rgb) -> Rgba<u8> {
    Rgba([c.0, c.1, c.2, 255])
}

fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

fn draw_legend(canvas: &mut Canvas, legend: &[LegendEntry]) {
    for entry in legend {
        canvas.fill_circle(entry.swatch_center, entry.swatch_radius, entry.color);
        canvas.draw_text(&entry.label);
    }
}

// =============================================================================
// Chart painters
// =============================================================================

pub fn paint_balance(layout: &BalanceLayout) -> Result<Vec<u8>, ChartError> {
    let mut canvas = Canvas::new(layout.canvas.width, layout.canvas.height, Rgb::WHITE);

    canvas.draw_text(&layout.title);
    draw_legend(&mut canvas, &layout.legend);

    for band in &layout.bands {
        canvas.fill_rect(&band.frame, band.background);
        canvas.stroke_line(&band.center_line);
        for line in &band.label_lines {
            canvas.draw_text(line);
        }
        for bar in &band.bars {
            canvas.fill_rect(&bar.against, bar.color);
            canvas.fill_rect(&bar.for_, bar.color);
            canvas.draw_text(&bar.against_label);
            canvas.draw_text(&bar.for_label);
        }
    }

    for label in &layout.axis_labels {
        canvas.draw_text(label);
    }

    canvas.into_png()
}

pub fn paint_intensity(layout: &IntensityLayout) -> Result<Vec<u8>, ChartError> {
    let mut canvas = Canvas::new(layout.canvas.width, layout.canvas.height, Rgb::WHITE);

    canvas.draw_text(&layout.title);

    for grid in &layout.gridlines {
        canvas.stroke_line(&grid.line);
        canvas.draw_text(&grid.label);
    }

    for group in &layout.groups {
        canvas.stroke_line(&group.guide);
        for line in &group.label.lines {
            canvas.draw_text_rotated(line, group.label.anchor, group.label.angle);
        }
        for bar in &group.bars {
            canvas.fill_rect(&bar.rect, bar.color);
        }
    }

    draw_legend(&mut canvas, &layout.legend);

    canvas.into_png()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ScoreTable;
    use crate::chart::layout::{balance_layout, intensity_layout, CanvasSize, Metric};
    use crate::chart::palette::Palette;
    use crate::types::{AnalysisRun, PersonalityExplanation, ScoredBias};

    fn pixel(png: &[u8], x: f64, y: f64) -> [u8; 4] {
        let img = image::load_from_memory(png).unwrap().to_rgba8();
        img.get_pixel(x as u32, y as u32).0
    }

    fn table(f: f64, a: f64) -> ScoreTable {
        let run = AnalysisRun {
            explanations: vec![
                PersonalityExplanation {
                    personality: "Ada".into(),
                    scored_biases: vec![ScoredBias {
                        bias_type: "Anchoring".into(),
                        for_score: f,
                        against_score: a,
                        detailed_explanation: "x".into(),
                    }],
                },
                PersonalityExplanation {
                    personality: "Grace".into(),
                    scored_biases: vec![ScoredBias {
                        bias_type: "Anchoring".into(),
                        for_score: f,
                        against_score: a,
                        detailed_explanation: "x".into(),
                    }],
                },
            ],
        };
        ScoreTable::aggregate(&run)
    }

    #[test]
    fn tiny_rects_still_cover_a_pixel() {
        let mut c = Canvas::new(4, 4, Rgb::WHITE);
        c.fill_rect(&Rect::new(1.2, 1.2, 0.1, 0.1), Rgb::BLACK);
        let png = c.into_png().unwrap();
        assert_eq!(pixel(&png, 1.0, 1.0), [0, 0, 0, 255]);
        assert_eq!(pixel(&png, 2.0, 2.0), [255, 255, 255, 255]);
    }

    #[test]
    fn dashed_lines_leave_gaps() {
        let mut c = Canvas::new(20, 3, Rgb::WHITE);
        c.stroke_line(&Line {
            from: Point::new(0.0, 1.0),
            to: Point::new(19.0, 1.0),
            color: Rgb::BLACK,
            dash: Some((5.0, 5.0)),
        });
        let png = c.into_png().unwrap();
        assert_eq!(pixel(&png, 2.0, 1.0), [0, 0, 0, 255]);
        assert_eq!(pixel(&png, 7.0, 1.0), [255, 255, 255, 255]);
        assert_eq!(pixel(&png, 12.0, 1.0), [0, 0, 0, 255]);
    }

    #[test]
    fn text_leaves_ink_inside_its_box() {
        let mut c = Canvas::new(64, 32, Rgb::WHITE);
        c.draw_text(&TextSpec {
            text: "HH".into(),
            x: 4.0,
            y: 20.0,
            size: 16.0,
            align: Align::Left,
            bold: false,
            color: Rgb::BLACK,
        });
        let img = image::load_from_memory(&c.into_png().unwrap()).unwrap().to_rgba8();
        let inked = img.pixels().filter(|p| p.0 == [0, 0, 0, 255]).count();
        assert!(inked > 0);
        for (x, y, p) in img.enumerate_pixels() {
            if p.0 == [0, 0, 0, 255] {
                assert!((4..28).contains(&x) && (4..20).contains(&y), "ink at {x},{y}");
            }
        }
    }

    #[test]
    fn balance_bars_are_painted_in_personality_colors() {
        let palette = Palette::default();
        let layout = balance_layout(&table(6.0, 3.0), &palette, CanvasSize::new(1200, 1200)).unwrap();
        let png = paint_balance(&layout).unwrap();

        let bar = &layout.bands[0].bars[1];
        let c = bar.color;
        let r = bar.for_;
        assert_eq!(
            pixel(&png, r.x + r.width / 2.0, r.y + r.height / 2.0),
            [c.0, c.1, c.2, 255]
        );
        let r = bar.against;
        assert_eq!(
            pixel(&png, r.x + r.width / 2.0, r.y + r.height / 2.0),
            [c.0, c.1, c.2, 255]
        );
    }

    #[test]
    fn zero_score_intensity_bar_is_visible() {
        let palette = Palette::default();
        let layout = intensity_layout(
            &table(0.0, 0.0),
            &palette,
            CanvasSize::new(1200, 720),
            Metric::For,
        )
        .unwrap();
        let png = paint_intensity(&layout).unwrap();
        let bar = &layout.groups[0].bars[0];
        let c = bar.color;
        assert_eq!(
            pixel(&png, bar.rect.x + bar.rect.width / 2.0, bar.rect.bottom() - 1.0),
            [c.0, c.1, c.2, 255]
        );
    }
}
