use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

pub const BLACK: Color = Color::rgb(0, 0, 0);
pub const WHITE: Color = Color::rgb(255, 255, 255);
pub const RED: Color = Color::rgb(255, 0, 0);
pub const BLUE: Color = Color::rgb(0, 0, 255);
pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0.0);
/// Default series color (the matplotlib "C0" blue).
pub const DEFAULT_BLUE: Color = Color::rgb(31, 119, 180);

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Grey level in [0, 1], 0 being black.
    pub fn grey(level: f64) -> Self {
        let v = (level.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::rgb(v, v, v)
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    pub fn to_svg_fill(&self) -> String {
        if (self.a - 1.0).abs() < 1e-6 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("rgba({},{},{},{:.3})", self.r, self.g, self.b, self.a)
        }
    }

    /// Linear interpolation between two colors.
    pub fn lerp(a: Color, b: Color, t: f64) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |x: u8, y: u8| (x as f64 * (1.0 - t) + y as f64 * t).round() as u8;
        Color {
            r: mix(a.r, b.r),
            g: mix(a.g, b.g),
            b: mix(a.b, b.b),
            a: a.a * (1.0 - t) + b.a * t,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_svg_fill())
    }
}

/// Piecewise-linear colormap quantized to a fixed number of levels, with
/// separate colors for values below the range and for missing values.
#[derive(Debug, Clone, PartialEq)]
pub struct Colormap {
    stops: Vec<Color>,
    levels: usize,
    under: Color,
    bad: Color,
}

impl Colormap {
    pub fn new(stops: Vec<Color>, levels: usize) -> Self {
        let under = stops.first().copied().unwrap_or(TRANSPARENT);
        Self {
            stops,
            levels: levels.max(2),
            under,
            bad: TRANSPARENT,
        }
    }

    /// ColorBrewer yellow-orange-red in 256 levels; values under the range
    /// and missing values are transparent.
    pub fn yl_or_rd() -> Self {
        let stops = vec![
            Color::rgb(255, 255, 204),
            Color::rgb(255, 237, 160),
            Color::rgb(254, 217, 118),
            Color::rgb(254, 178, 76),
            Color::rgb(253, 141, 60),
            Color::rgb(252, 78, 42),
            Color::rgb(227, 26, 28),
            Color::rgb(189, 0, 38),
            Color::rgb(128, 0, 38),
        ];
        Self::new(stops, 256)
            .with_under(TRANSPARENT)
            .with_bad(TRANSPARENT)
    }

    pub fn with_under(mut self, color: Color) -> Self {
        self.under = color;
        self
    }

    pub fn with_bad(mut self, color: Color) -> Self {
        self.bad = color;
        self
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Color at fraction `t` of the map, snapped to the nearest level below.
    pub fn at(&self, t: f64) -> Color {
        if self.stops.is_empty() {
            return self.bad;
        }
        if self.stops.len() == 1 {
            return self.stops[0];
        }
        let level = ((t.clamp(0.0, 1.0) * self.levels as f64) as usize).min(self.levels - 1);
        let t = level as f64 / (self.levels - 1) as f64;
        let pos = t * (self.stops.len() - 1) as f64;
        let i = (pos.floor() as usize).min(self.stops.len() - 2);
        Color::lerp(self.stops[i], self.stops[i + 1], pos - i as f64)
    }

    /// Color of `value` on the range `[vmin, vmax]`.
    pub fn map(&self, value: f64, vmin: f64, vmax: f64) -> Color {
        if value.is_nan() {
            return self.bad;
        }
        if value < vmin {
            return self.under;
        }
        let span = vmax - vmin;
        let t = if span > 0.0 { (value - vmin) / span } else { 1.0 };
        self.at(t)
    }
}
