//! Personality colors.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ChartError;

static CSS_RGB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^rgb\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*\)$")
        .expect("Invalid rgb() regex")
});

static CSS_HEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})$").expect("Invalid hex regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const BAND_SHADE: Rgb = Rgb(0xf0, 0xf0, 0xf0);
    pub const GRID: Rgb = Rgb(0xdd, 0xdd, 0xdd);

    /// Parse `rgb(r, g, b)` or `#rrggbb`.
    pub fn parse_css(s: &str) -> Result<Self, ChartError> {
        let s = s.trim();
        if let Some(caps) = CSS_RGB.captures(s) {
            let channel = |i: usize| -> Result<u8, ChartError> {
                caps[i]
                    .parse::<u8>()
                    .map_err(|_| ChartError::InvalidColor(s.to_string()))
            };
            return Ok(Rgb(channel(1)?, channel(2)?, channel(3)?));
        }
        if let Some(caps) = CSS_HEX.captures(s) {
            let channel = |i: usize| -> Result<u8, ChartError> {
                u8::from_str_radix(&caps[i], 16).map_err(|_| ChartError::InvalidColor(s.to_string()))
            };
            return Ok(Rgb(channel(1)?, channel(2)?, channel(3)?));
        }
        Err(ChartError::InvalidColor(s.to_string()))
    }
}

/// Ordered colors assigned to personalities by index, wrapping around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: vec![
                Rgb(54, 162, 235),  // blue
                Rgb(255, 99, 132),  // red
                Rgb(75, 192, 192),  // teal
                Rgb(153, 102, 255), // purple
                Rgb(255, 159, 64),  // orange
                Rgb(255, 205, 86),  // yellow
                Rgb(201, 203, 207), // gray
                Rgb(0, 128, 0),     // green
                Rgb(128, 0, 128),   // dark purple
                Rgb(0, 0, 128),     // navy
            ],
        }
    }
}

impl Palette {
    pub fn new(colors: Vec<Rgb>) -> Result<Self, ChartError> {
        if colors.is_empty() {
            return Err(ChartError::EmptyPalette);
        }
        Ok(Self { colors })
    }

    /// Parse a `;`-separated list of CSS colors.
    pub fn parse(spec: &str) -> Result<Self, ChartError> {
        let colors = spec
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Rgb::parse_css)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(colors)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn color_for(&self, personality_index: usize) -> Rgb {
        self.colors[personality_index % self.colors.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_wrap_modulo_palette_length() {
        let p = Palette::new(vec![Rgb(1, 1, 1), Rgb(2, 2, 2), Rgb(3, 3, 3)]).unwrap();
        assert_eq!(p.color_for(0), Rgb(1, 1, 1));
        assert_eq!(p.color_for(4), Rgb(2, 2, 2));
        assert_eq!(Palette::default().color_for(10), Palette::default().color_for(0));
    }

    #[test]
    fn parse_css_forms() {
        assert_eq!(Rgb::parse_css("rgb(54, 162, 235)").unwrap(), Rgb(54, 162, 235));
        assert_eq!(Rgb::parse_css("#ff0080").unwrap(), Rgb(255, 0, 128));
        assert!(Rgb::parse_css("rgb(300, 0, 0)").is_err());
        assert!(Rgb::parse_css("blue").is_err());
    }

    #[test]
    fn parse_palette_list() {
        let p = Palette::parse("rgb(0, 0, 0); #ffffff;").unwrap();
        assert_eq!(p.len(), 2);
        assert!(matches!(Palette::parse(" ; "), Err(ChartError::EmptyPalette)));
    }
}
