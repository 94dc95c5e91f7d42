//! ASCII plotting for terminal output.
//!
//! Fixed-size grid, deterministic output. The x axis is the step position
//! (training rows first, then the forecast horizon).
//!
//! Plot elements:
//! - observed values: `o`
//! - point forecast: `-` line continuing from the last observed value
//! - confidence bounds: `.` lines

use crate::domain::ForecastResult;

/// Render the observed series followed by a forecast with its bounds.
///
/// Only the last `window` observations are drawn when `window` is set.
pub fn render_forecast_plot(
    observed: &[Option<f64>],
    forecast: Option<&ForecastResult>,
    window: Option<usize>,
    width: usize,
    height: usize,
) -> String {
    let skip = window.map(|w| observed.len().saturating_sub(w)).unwrap_or(0);
    let observed = &observed[skip..];

    let points: Vec<(f64, f64)> = observed
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
        .collect();

    let start = observed.len() as f64;
    let mut line = Vec::new();
    let mut lower = Vec::new();
    let mut upper = Vec::new();
    if let Some(fc) = forecast {
        if let Some(&last) = points.last() {
            line.push(last);
        }
        for (h, p) in fc.points.iter().enumerate() {
            let x = start + h as f64;
            line.push((x, p.forecast));
            lower.push((x, p.lower_bound));
            upper.push((x, p.upper_bound));
        }
    }

    let x_max = (start + forecast.map(|f| f.horizon()).unwrap_or(0) as f64 - 1.0).max(1.0);
    render_plot(&points, &line, &[&lower, &upper], 0.0, x_max, width, height)
}

fn render_plot(
    points: &[(f64, f64)],
    line: &[(f64, f64)],
    bands: &[&[(f64, f64)]],
    x_min: f64,
    x_max: f64,
    width: usize,
    height: usize,
) -> String {
    let all = points.iter().chain(line).chain(bands.iter().flat_map(|b| b.iter()));
    let (y_lo, y_hi) = value_span(all.map(|p| p.1));
    let pad = ((y_hi - y_lo) * 0.05).max(1e-12);

    let mut canvas = Canvas::new(width.max(10), height.max(5), (x_min, x_max), (y_lo - pad, y_hi + pad));
    // Bands first, then the forecast, then observations on top.
    for band in bands {
        canvas.polyline(band, '.');
    }
    canvas.polyline(line, '-');
    for &(x, y) in points {
        canvas.mark(x, y, 'o');
    }
    canvas.render()
}

/// Finite min/max of `values`; a unit span around a constant series.
fn value_span(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    match (lo.is_finite(), hi > lo) {
        (true, true) => (lo, hi),
        (true, false) => (lo - 0.5, lo + 0.5),
        _ => (0.0, 1.0),
    }
}

/// Character grid over a data window; row 0 holds the largest y.
struct Canvas {
    cells: Vec<Vec<char>>,
    x: (f64, f64),
    y: (f64, f64),
}

impl Canvas {
    fn new(width: usize, height: usize, x: (f64, f64), y: (f64, f64)) -> Self {
        Self {
            cells: vec![vec![' '; width]; height],
            x,
            y,
        }
    }

    fn width(&self) -> usize {
        self.cells[0].len()
    }

    fn height(&self) -> usize {
        self.cells.len()
    }

    fn cell(&self, x: f64, y: f64) -> (isize, isize) {
        let fx = ((x - self.x.0) / (self.x.1 - self.x.0)).clamp(0.0, 1.0);
        let fy = ((y - self.y.0) / (self.y.1 - self.y.0)).clamp(0.0, 1.0);
        let col = (fx * (self.width() - 1) as f64).round() as isize;
        let row = ((1.0 - fy) * (self.height() - 1) as f64).round() as isize;
        (col, row)
    }

    fn put(&mut self, col: isize, row: isize, ch: char) {
        if let (Ok(c), Ok(r)) = (usize::try_from(col), usize::try_from(row)) {
            if let Some(cell) = self.cells.get_mut(r).and_then(|line| line.get_mut(c)) {
                *cell = ch;
            }
        }
    }

    fn mark(&mut self, x: f64, y: f64, ch: char) {
        let (col, row) = self.cell(x, y);
        self.put(col, row, ch);
    }

    /// Connect consecutive finite points; a non-finite value breaks the line.
    fn polyline(&mut self, pts: &[(f64, f64)], ch: char) {
        let mut prev = None;
        for &(x, y) in pts {
            if !y.is_finite() {
                prev = None;
                continue;
            }
            let here = self.cell(x, y);
            match prev {
                Some(from) => self.segment(from, here, ch),
                None => self.put(here.0, here.1, ch),
            }
            prev = Some(here);
        }
    }

    /// Bresenham segment between two cells (inclusive).
    fn segment(&mut self, (mut c, mut r): (isize, isize), (c1, r1): (isize, isize), ch: char) {
        let dc = (c1 - c).abs();
        let dr = -(r1 - r).abs();
        let step_c = if c < c1 { 1 } else { -1 };
        let step_r = if r < r1 { 1 } else { -1 };
        let mut err = dc + dr;
        loop {
            self.put(c, r, ch);
            if c == c1 && r == r1 {
                break;
            }
            let twice = 2 * err;
            if twice >= dr {
                err += dr;
                c += step_c;
            }
            if twice <= dc {
                err += dc;
                r += step_r;
            }
        }
    }

    fn render(&self) -> String {
        let mut out = format!(
            "Plot: steps=[{:.0}, {:.0}] | y=[{:.2}, {:.2}]\n",
            self.x.0, self.x.1, self.y.0, self.y.1
        );
        for line in &self.cells {
            out.push_str(line.iter().collect::<String>().trim_end());
            out.push('\n');
        }
        out
    }
}
