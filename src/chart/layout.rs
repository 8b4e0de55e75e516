//! Chart geometry.
//!
//! Every function here is pure: `(score table, palette, canvas size)` in,
//! pixel positions out. The rasterizer only paints what these layouts say.

use std::f64::consts::PI;

use crate::aggregate::ScoreTable;
use crate::types::{format_number, ScoredBias};

use super::palette::{Palette, Rgb};
use super::ChartError;

// =============================================================================
// Primitives
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn w(&self) -> f64 {
        self.width as f64
    }

    fn h(&self) -> f64 {
        self.height as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub from: Point,
    pub to: Point,
    pub color: Rgb,
    /// `(on, off)` dash lengths in pixels; solid when `None`.
    pub dash: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// A line of text anchored at its baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpec {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub align: Align,
    pub bold: bool,
    pub color: Rgb,
}

impl TextSpec {
    fn new(text: impl Into<String>, x: f64, y: f64, size: f64, align: Align) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            size,
            align,
            bold: false,
            color: Rgb::BLACK,
        }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// Multi-line text drawn around `anchor` after rotating by `angle` radians.
///
/// Line positions are in the rotated frame, relative to the anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct RotatedLabel {
    pub anchor: Point,
    pub angle: f64,
    pub lines: Vec<TextSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub name: String,
    pub color: Rgb,
    pub swatch_center: Point,
    pub swatch_radius: f64,
    pub label: TextSpec,
}

/// Split a label into lines of at most two words.
pub fn wrap_two_words(label: &str) -> Vec<String> {
    let words: Vec<&str> = label.split(' ').collect();
    words.chunks(2).map(|pair| pair.join(" ")).collect()
}

#[allow(clippy::too_many_arguments)]
fn legend(
    names: &[String],
    palette: &Palette,
    canvas: CanvasSize,
    left_offset: f64,
    y: f64,
    radius: f64,
    text_dx: f64,
    font: f64,
) -> Vec<LegendEntry> {
    let spacing = (canvas.w() / (names.len() + 1) as f64).floor();
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let x = left_offset + spacing * (i + 1) as f64;
            LegendEntry {
                name: name.clone(),
                color: palette.color_for(i),
                swatch_center: Point::new(x - 40.0, y),
                swatch_radius: radius,
                label: TextSpec::new(name.clone(), x + text_dx, y + 5.0, font, Align::Left),
            }
        })
        .collect()
}

fn ensure_drawable(table: &ScoreTable) -> Result<(), ChartError> {
    if table.bias_count() == 0 {
        return Err(ChartError::EmptyData("no bias types to chart".into()));
    }
    if table.personality_count() == 0 {
        return Err(ChartError::EmptyData("no personalities to chart".into()));
    }
    Ok(())
}

// =============================================================================
// Balance chart
// =============================================================================

pub const BALANCE_TITLE: &str = "Bias Score Distribution";

/// Diverging bars for one personality inside a band.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceBar {
    pub personality_index: usize,
    pub color: Rgb,
    /// Extends left from the center line.
    pub against: Rect,
    /// Extends right from the center line.
    pub for_: Rect,
    pub against_label: TextSpec,
    pub for_label: TextSpec,
}

/// One horizontal band per bias type.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceBand {
    pub bias_type: String,
    pub frame: Rect,
    pub background: Rgb,
    pub center_line: Line,
    pub label_lines: Vec<TextSpec>,
    pub bars: Vec<BalanceBar>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceLayout {
    pub canvas: CanvasSize,
    pub title: TextSpec,
    pub legend: Vec<LegendEntry>,
    pub bands: Vec<BalanceBand>,
    pub axis_labels: Vec<TextSpec>,
    pub frame_height: f64,
    pub bar_height: f64,
    pub max_bar_width: f64,
}

pub fn balance_layout(
    table: &ScoreTable,
    palette: &Palette,
    canvas: CanvasSize,
) -> Result<BalanceLayout, ChartError> {
    ensure_drawable(table)?;
    let (w, h) = (canvas.w(), canvas.h());
    let n_personalities = table.personality_count();

    let top_padding = (h * 0.005).floor();
    let bottom_padding = (h * 0.005).floor();
    let left_padding = (w * 0.01).floor();

    let title_font = (h * 0.02).floor();
    let bias_name_font = (h * 0.015).floor();
    let scores_font = (h * 0.02).floor();
    let legend_font = (h * 0.02).floor();

    let title = TextSpec::new(
        BALANCE_TITLE,
        w / 2.0,
        top_padding + title_font,
        title_font,
        Align::Center,
    );

    let legend_y = top_padding + title_font + legend_font + 5.0;
    let legend = legend(
        &table.personalities,
        palette,
        canvas,
        left_padding,
        legend_y,
        (h * 0.01).floor(),
        0.0,
        legend_font,
    );

    let header_height = legend_y + legend_font + 10.0;
    let footer_height = legend_font + bottom_padding;
    let available_height = h - header_height - footer_height;
    let frame_height = available_height / table.bias_count() as f64;

    let center_x = w / 2.0;
    let bias_label_width = (w * 0.2).floor();
    let max_bar_width = center_x - left_padding - bias_label_width - (h * 0.01).floor();
    let bar_height = (frame_height * 0.2).floor();

    let total_bar_space = bar_height * n_personalities as f64;
    let gap = (frame_height - total_bar_space) / (n_personalities + 1) as f64;

    let bands = table
        .bias_types
        .iter()
        .enumerate()
        .map(|(index, bias_type)| {
            let frame_y = header_height + index as f64 * frame_height;

            let lines = wrap_two_words(bias_type);
            let line_height = bias_name_font * 1.2;
            let text_block = line_height * lines.len() as f64;
            let text_start_y = frame_y + (frame_height - text_block) / 2.0 + bias_name_font;
            let label_lines = lines
                .into_iter()
                .enumerate()
                .map(|(i, line)| {
                    TextSpec::new(
                        line,
                        left_padding,
                        text_start_y + i as f64 * line_height,
                        bias_name_font,
                        Align::Left,
                    )
                })
                .collect();

            let bars = (0..n_personalities)
                .filter_map(|p| table.get(bias_type, p).map(|score| (p, score)))
                .map(|(p, score)| {
                    let bar_y = frame_y + gap + p as f64 * (bar_height + gap);
                    let against_w = score.against_score / 10.0 * max_bar_width;
                    let for_w = score.for_score / 10.0 * max_bar_width;
                    let label_y = bar_y + bar_height / 2.0 + scores_font / 3.0;
                    BalanceBar {
                        personality_index: p,
                        color: palette.color_for(p),
                        against: Rect::new(center_x - against_w, bar_y, against_w, bar_height),
                        for_: Rect::new(center_x, bar_y, for_w, bar_height),
                        against_label: TextSpec::new(
                            format_number(-score.against_score),
                            center_x - against_w - 5.0,
                            label_y,
                            scores_font,
                            Align::Right,
                        ),
                        for_label: TextSpec::new(
                            format_number(score.for_score),
                            center_x + for_w + 5.0,
                            label_y,
                            scores_font,
                            Align::Left,
                        ),
                    }
                })
                .collect();

            BalanceBand {
                bias_type: bias_type.clone(),
                frame: Rect::new(0.0, frame_y, w, frame_height),
                background: if index % 2 == 0 {
                    Rgb::BAND_SHADE
                } else {
                    Rgb::WHITE
                },
                center_line: Line {
                    from: Point::new(center_x, frame_y),
                    to: Point::new(center_x, frame_y + frame_height),
                    color: Rgb::BLACK,
                    dash: None,
                },
                label_lines,
                bars,
            }
        })
        .collect();

    let axis_y = h - bottom_padding;
    let axis_labels = vec![
        TextSpec::new("Against Score", w * 0.25, axis_y, legend_font, Align::Center),
        TextSpec::new("For Score", w * 0.75, axis_y, legend_font, Align::Center),
    ];

    Ok(BalanceLayout {
        canvas,
        title,
        legend,
        bands,
        axis_labels,
        frame_height,
        bar_height,
        max_bar_width,
    })
}

// =============================================================================
// Intensity charts
// =============================================================================

/// Which score an intensity chart plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    For,
    Against,
}

impl Metric {
    pub fn score(&self, bias: &ScoredBias) -> f64 {
        match self {
            Metric::For => bias.for_score,
            Metric::Against => bias.against_score,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Metric::For => "For Biases Multi-Personality Bias Intensity Analysis",
            Metric::Against => "Against Biases Multi-Personality Bias Intensity Analysis",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gridline {
    pub value: u32,
    pub line: Line,
    pub label: TextSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntensityBar {
    pub personality_index: usize,
    pub color: Rgb,
    pub score: f64,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntensityGroup {
    pub bias_type: String,
    /// Group position on the x axis; the dotted guide runs here.
    pub x: f64,
    pub guide: Line,
    pub label: RotatedLabel,
    pub bars: Vec<IntensityBar>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntensityLayout {
    pub canvas: CanvasSize,
    pub metric: Metric,
    pub title: TextSpec,
    pub legend: Vec<LegendEntry>,
    pub gridlines: Vec<Gridline>,
    pub groups: Vec<IntensityGroup>,
    pub padding: f64,
    pub chart_width: f64,
    pub chart_height: f64,
    pub bar_width: f64,
}

const GRID_DASH: Option<(f64, f64)> = Some((5.0, 5.0));

/// Bar height for a score; zero scores keep a 1% sliver so they stay visible.
pub fn intensity_bar_height(score: f64, chart_height: f64) -> f64 {
    if score == 0.0 {
        (chart_height * 0.01).floor().max(0.0)
    } else {
        score / 10.0 * chart_height
    }
}

pub fn intensity_layout(
    table: &ScoreTable,
    palette: &Palette,
    canvas: CanvasSize,
    metric: Metric,
) -> Result<IntensityLayout, ChartError> {
    ensure_drawable(table)?;
    let (w, h) = (canvas.w(), canvas.h());
    let n_personalities = table.personality_count();
    let n = n_personalities as f64;

    let padding = (h * 0.1).floor();
    let bias_name_distance = (h * 0.08).floor();
    let axis_font = (h * 0.03).floor();

    let title = TextSpec::new(metric.title(), w / 2.0, (h * 0.09).floor(), axis_font, Align::Center)
        .bold();

    let chart_width = w - padding * 2.0;
    let chart_height = h - padding * 3.0;
    let bar_width = (chart_width / (table.bias_count() * 2) as f64).floor();
    let baseline = padding + chart_height;

    let gridlines = (0..=10u32)
        .map(|i| {
            let y = baseline - i as f64 * chart_height / 10.0;
            Gridline {
                value: i,
                line: Line {
                    from: Point::new(padding, y),
                    to: Point::new(w - padding, y),
                    color: Rgb::GRID,
                    dash: GRID_DASH,
                },
                label: TextSpec::new(i.to_string(), padding - 5.0, y + 5.0, axis_font, Align::Right),
            }
        })
        .collect();

    // Center the label under the personality bars of its group.
    let center_offset = if n_personalities == 1 {
        0.0
    } else {
        let single = bar_width / n;
        (single * n - single) / 2.0
    };
    let label_font = (h * 0.01875).floor();
    let label_line_height = (h * 0.02).floor();

    let groups = table
        .bias_types
        .iter()
        .enumerate()
        .map(|(type_index, bias_type)| {
            let x = padding + type_index as f64 * bar_width * 2.0 + bar_width / 2.0;

            let lines = wrap_two_words(bias_type);
            let start_y = -(label_line_height * (lines.len() as f64 - 1.0)) / 2.0;
            let label = RotatedLabel {
                anchor: Point::new(
                    x - bar_width / 4.0 + center_offset,
                    baseline + bias_name_distance,
                ),
                angle: -PI / 4.0,
                lines: lines
                    .into_iter()
                    .enumerate()
                    .map(|(i, line)| {
                        TextSpec::new(
                            line,
                            0.0,
                            start_y + i as f64 * label_line_height,
                            label_font,
                            Align::Center,
                        )
                    })
                    .collect(),
            };

            let bars = (0..n_personalities)
                .filter_map(|p| table.get(bias_type, p).map(|score| (p, score)))
                .map(|(p, score)| {
                    let value = metric.score(score);
                    let bar_h = intensity_bar_height(value, chart_height);
                    IntensityBar {
                        personality_index: p,
                        color: palette.color_for(p),
                        score: value,
                        rect: Rect::new(
                            x + p as f64 * bar_width / n - bar_width / 4.0,
                            baseline - bar_h,
                            bar_width / n,
                            bar_h,
                        ),
                    }
                })
                .collect();

            IntensityGroup {
                bias_type: bias_type.clone(),
                x,
                guide: Line {
                    from: Point::new(x, padding),
                    to: Point::new(x, baseline),
                    color: Rgb::GRID,
                    dash: GRID_DASH,
                },
                label,
                bars,
            }
        })
        .collect();

    let legend = legend(
        &table.personalities,
        palette,
        canvas,
        0.0,
        (h * 0.03).floor(),
        (h * 0.015).floor(),
        -20.0,
        axis_font,
    );

    Ok(IntensityLayout {
        canvas,
        metric,
        title,
        legend,
        gridlines,
        groups,
        padding,
        chart_width,
        chart_height,
        bar_width,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalysisRun, PersonalityExplanation};

    fn table(personalities: usize, biases: &[&str], f: f64, a: f64) -> ScoreTable {
        let explanations = (0..personalities)
            .map(|p| PersonalityExplanation {
                personality: format!("P{p}"),
                scored_biases: biases
                    .iter()
                    .map(|b| ScoredBias {
                        bias_type: b.to_string(),
                        for_score: f,
                        against_score: a,
                        detailed_explanation: "x".into(),
                    })
                    .collect(),
            })
            .collect();
        ScoreTable::aggregate(&AnalysisRun { explanations })
    }

    const BALANCE: CanvasSize = CanvasSize::new(1200, 1200);
    const INTENSITY: CanvasSize = CanvasSize::new(1200, 720);

    #[test]
    fn wraps_labels_two_words_per_line() {
        assert_eq!(wrap_two_words("Confirmation Bias"), vec!["Confirmation Bias"]);
        assert_eq!(
            wrap_two_words("Fundamental Attribution Error Bias Extra"),
            vec!["Fundamental Attribution", "Error Bias", "Extra"]
        );
        assert_eq!(wrap_two_words("Anchoring"), vec!["Anchoring"]);
    }

    #[test]
    fn balance_two_personalities_three_biases() {
        let t = table(2, &["Anchoring", "Framing Effect", "Halo"], 6.0, 3.0);
        let l = balance_layout(&t, &Palette::default(), BALANCE).unwrap();

        assert_eq!(l.bands.len(), 3);
        assert!(l.bands.iter().all(|b| b.bars.len() == 2));

        // header: 6 + 24 + 24 + 5 = 59 legend y, +24 +10 = 93; footer 24 + 6 = 30.
        assert_eq!(l.frame_height, (1200.0 - 93.0 - 30.0) / 3.0);
        assert_eq!(l.max_bar_width, 600.0 - 12.0 - 240.0 - 12.0);

        let bar = &l.bands[0].bars[0];
        assert_eq!(bar.for_.x, 600.0);
        assert!((bar.for_.width - 0.6 * l.max_bar_width).abs() < 1e-9);
        assert!((bar.against.right() - 600.0).abs() < 1e-9);
        assert!((bar.against.width - 0.3 * l.max_bar_width).abs() < 1e-9);
        assert_eq!(bar.against_label.text, "-3");
        assert_eq!(bar.for_label.text, "6");

        // Bars in a band never overlap.
        let b0 = &l.bands[1].bars[0].for_;
        let b1 = &l.bands[1].bars[1].for_;
        assert!(b0.bottom() <= b1.y);

        // Center lines tile the full chart height.
        let first = l.bands.first().unwrap().center_line.from.y;
        let last = l.bands.last().unwrap().center_line.to.y;
        assert!((last - first - l.frame_height * 3.0).abs() < 1e-9);

        assert_eq!(l.bands[0].background, Rgb::BAND_SHADE);
        assert_eq!(l.bands[1].background, Rgb::WHITE);
        assert_eq!(l.legend.len(), 2);
        assert_eq!(l.legend[1].color, Palette::default().color_for(1));
    }

    #[test]
    fn zero_against_label_has_no_negative_zero() {
        let t = table(1, &["Anchoring"], 4.5, 0.0);
        let l = balance_layout(&t, &Palette::default(), BALANCE).unwrap();
        assert_eq!(l.bands[0].bars[0].against_label.text, "0");
        assert_eq!(l.bands[0].bars[0].for_label.text, "4.5");
        assert_eq!(l.bands[0].bars[0].against.width, 0.0);
    }

    #[test]
    fn intensity_grouping_and_geometry() {
        let t = table(2, &["Anchoring", "Framing", "Halo"], 6.0, 3.0);
        let l = intensity_layout(&t, &Palette::default(), INTENSITY, Metric::Against).unwrap();

        assert_eq!(l.padding, 72.0);
        assert_eq!(l.chart_height, 720.0 - 216.0);
        assert_eq!(l.bar_width, ((1200.0 - 144.0) / 6.0_f64).floor());
        assert_eq!(l.gridlines.len(), 11);
        assert_eq!(l.gridlines[0].line.from.y, 72.0 + l.chart_height);
        assert_eq!(l.gridlines[10].line.from.y, 72.0);

        let bars: usize = l.groups.iter().map(|g| g.bars.len()).sum();
        assert_eq!(bars, 6);

        let bar = &l.groups[0].bars[0];
        assert!((bar.rect.height - 0.3 * l.chart_height).abs() < 1e-9);
        assert!((bar.rect.bottom() - (72.0 + l.chart_height)).abs() < 1e-9);
        assert_eq!(bar.rect.width, l.bar_width / 2.0);

        let next = &l.groups[0].bars[1];
        assert!((next.rect.x - bar.rect.right()).abs() < 1e-9);

        assert_eq!(l.groups[0].label.angle, -PI / 4.0);
        assert_eq!(l.title.text, Metric::Against.title());
        assert!(l.title.bold);
    }

    #[test]
    fn zero_scores_keep_a_visible_sliver() {
        let t = table(2, &["Anchoring"], 0.0, 0.0);
        let l = intensity_layout(&t, &Palette::default(), INTENSITY, Metric::For).unwrap();
        let expected = (l.chart_height * 0.01).floor();
        assert!(expected > 0.0);
        for bar in &l.groups[0].bars {
            assert_eq!(bar.rect.height, expected);
        }
    }

    #[test]
    fn multi_line_labels_are_vertically_centered() {
        let t = table(1, &["Fundamental Attribution Error"], 5.0, 5.0);
        let l = intensity_layout(&t, &Palette::default(), INTENSITY, Metric::For).unwrap();
        let lines = &l.groups[0].label.lines;
        assert_eq!(lines.len(), 2);
        assert!((lines[0].y + lines[1].y).abs() < 1e-9);
    }

    #[test]
    fn single_personality_label_not_offset() {
        let t = table(1, &["Anchoring"], 5.0, 5.0);
        let l = intensity_layout(&t, &Palette::default(), INTENSITY, Metric::For).unwrap();
        let g = &l.groups[0];
        assert_eq!(g.label.anchor.x, g.x - l.bar_width / 4.0);
    }

    #[test]
    fn empty_table_is_rejected() {
        let t = ScoreTable::default();
        assert!(matches!(
            balance_layout(&t, &Palette::default(), BALANCE),
            Err(ChartError::EmptyData(_))
        ));
        assert!(intensity_layout(&t, &Palette::default(), INTENSITY, Metric::For).is_err());
    }
}
