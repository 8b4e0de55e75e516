//! Chart rendering for a scored run.
//!
//! Three fixed chart kinds are produced from one [`ScoreTable`]:
//!
//! - **Balance**: diverging bars around a zero line, one band per bias type.
//! - **Against** / **For** intensity: grouped vertical bars for one metric.
//!
//! Geometry lives in [`layout`] and is pure. [`raster`] paints a layout onto
//! an RGBA canvas and encodes it as PNG.

pub mod layout;
pub mod palette;
pub mod raster;

use tracing::debug;

use crate::aggregate::ScoreTable;

pub use layout::{
    balance_layout, intensity_layout, BalanceLayout, CanvasSize, IntensityLayout, Metric,
};
pub use palette::{Palette, Rgb};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("Nothing to chart: {0}")]
    EmptyData(String),
    #[error("Color palette is empty")]
    EmptyPalette,
    #[error("Invalid color: {0}")]
    InvalidColor(String),
    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

// =============================================================================
// Kinds and config
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Balance,
    Against,
    For,
}

impl ChartKind {
    /// Render order used by the report.
    pub const ALL: [ChartKind; 3] = [ChartKind::Balance, ChartKind::Against, ChartKind::For];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Balance => "balance",
            ChartKind::Against => "against",
            ChartKind::For => "for",
        }
    }

    /// Caption of the report paragraph that embeds this chart.
    pub fn caption(&self) -> &'static str {
        match self {
            ChartKind::Balance => "Comparison of total bias strength:",
            ChartKind::Against => "Against biases intensity analysis:",
            ChartKind::For => "For biases intensity analysis:",
        }
    }
}

impl std::fmt::Display for ChartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    pub balance_canvas: CanvasSize,
    pub intensity_canvas: CanvasSize,
    pub palette: Palette,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            balance_canvas: CanvasSize::new(1200, 1200),
            intensity_canvas: CanvasSize::new(1200, 720),
            palette: Palette::default(),
        }
    }
}

/// A fully encoded chart image.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChart {
    pub kind: ChartKind,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

// =============================================================================
// Rendering
// =============================================================================

pub fn render_chart(
    kind: ChartKind,
    table: &ScoreTable,
    config: &ChartConfig,
) -> Result<RenderedChart, ChartError> {
    let (canvas, png) = match kind {
        ChartKind::Balance => {
            let layout = balance_layout(table, &config.palette, config.balance_canvas)?;
            (config.balance_canvas, raster::paint_balance(&layout)?)
        }
        ChartKind::Against | ChartKind::For => {
            let metric = if kind == ChartKind::For {
                Metric::For
            } else {
                Metric::Against
            };
            let layout = intensity_layout(table, &config.palette, config.intensity_canvas, metric)?;
            (config.intensity_canvas, raster::paint_intensity(&layout)?)
        }
    };

    debug!(
        chart = %kind,
        width = canvas.width,
        height = canvas.height,
        bytes = png.len(),
        "Chart rendered"
    );

    Ok(RenderedChart {
        kind,
        width: canvas.width,
        height: canvas.height,
        png,
    })
}

pub fn render_balance_chart(
    table: &ScoreTable,
    config: &ChartConfig,
) -> Result<RenderedChart, ChartError> {
    render_chart(ChartKind::Balance, table, config)
}

pub fn render_intensity_chart(
    table: &ScoreTable,
    metric: Metric,
    config: &ChartConfig,
) -> Result<RenderedChart, ChartError> {
    let kind = match metric {
        Metric::For => ChartKind::For,
        Metric::Against => ChartKind::Against,
    };
    render_chart(kind, table, config)
}
