// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Level-of-detail waveform rendering.
//!
//! The samples between two positions are treated as a piecewise linear signal. Each segment is
//! clipped against the output columns it crosses and contributes to their minimum, maximum,
//! mean and deviation in proportion to the width it covers, whatever the zoom ratio.

use tracing::debug;

/// Vertical scale of a full-range 16 bit sample, top to bottom.
const FULL_SCALE: f64 = 65536.0;

/// Alpha of the horizontal grid lines.
const GRID_ALPHA: f64 = 40.0 / 255.0;

/// Colors of the waveform image, as opaque ARGB.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveColors {
    pub background: u32,
    pub grid: u32,
    pub wave: u32,
}

impl Default for WaveColors {
    fn default() -> Self {
        WaveColors {
            background: 0xFF1E1E1E,
            grid: 0xFFE0E0E0,
            wave: 0xFF3D8FD1,
        }
    }
}

/// Per-column aggregates, in sample units.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WaveColumns {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub mean: Vec<f64>,
    pub deviation: Vec<f64>,
}

impl WaveColumns {
    pub fn width(&self) -> usize {
        self.mean.len()
    }
}

/// An ARGB image, row major.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveImage {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl WaveImage {
    fn filled(width: usize, height: usize, color: u32) -> WaveImage {
        WaveImage {
            width,
            height,
            pixels: vec![color; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[x + y * self.width]
    }

    fn blend(&mut self, x: usize, y: usize, color: u32, amount: f64) {
        let index = x + y * self.width;
        self.pixels[index] = merge_rgb(self.pixels[index], color, amount);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct View {
    start: usize,
    end: usize,
    zoom_y: f64,
    width: usize,
    height: usize,
}

impl View {
    fn coefficient(&self) -> f64 {
        -self.zoom_y * self.height as f64 / FULL_SCALE
    }

    fn offset(&self) -> f64 {
        0.5 * self.height as f64
    }
}

/// Renders 16 bit samples into a cached image.
pub struct WavePainter {
    colors: WaveColors,
    samples: Vec<i16>,
    view: Option<View>,
    image: Option<WaveImage>,
}

impl WavePainter {
    pub fn new(colors: WaveColors) -> WavePainter {
        WavePainter {
            colors,
            samples: Vec::new(),
            view: None,
            image: None,
        }
    }

    /// Replaces the samples with little endian 16 bit data. A trailing odd byte is ignored.
    pub fn set_data(&mut self, data: &[u8]) {
        self.set_samples(
            data.chunks_exact(2)
                .map(|bytes| i16::from_le_bytes([bytes[0], bytes[1]]))
                .collect(),
        );
    }

    pub fn set_samples(&mut self, samples: Vec<i16>) {
        debug!(samples = samples.len(), "Wave data changed.");
        self.samples = samples;
        self.image = None;
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Computes the column aggregates of the samples between `start` and `end` over `width`
    /// columns. Positions are clamped to the last sample. Returns None if the range is empty.
    pub fn columns(&self, start: usize, end: usize, width: usize) -> Option<WaveColumns> {
        let (start, end) = self.clamp_range(start, end)?;
        if width == 0 {
            return None;
        }

        let mut min = vec![f64::INFINITY; width];
        let mut max = vec![f64::NEG_INFINITY; width];
        let mut sum = vec![0.0; width];
        let mut square_sum = vec![0.0; width];
        let mut weight = vec![0.0; width];

        let point_space = width as f64 / (end - start) as f64;
        let mut previous_position: f64 = 0.0;
        let mut previous_value = self.samples[start] as f64;
        for i in 1..=(end - start) {
            let current_value = self.samples[start + i] as f64;
            let current_position = point_space * i as f64;
            let slope = (current_value - previous_value) / point_space;

            let first_column = previous_position.floor() as usize;
            let last_column = (current_position.ceil() as usize).min(width);
            for column in first_column..last_column {
                // Part of the segment crossing this column.
                let x1 = previous_position.max(column as f64);
                let x2 = current_position.min(column as f64 + 1.0);
                let y1 = previous_value + (x1 - previous_position) * slope;
                let y2 = previous_value + (x2 - previous_position) * slope;

                min[column] = min[column].min(y1.min(y2));
                max[column] = max[column].max(y1.max(y2));

                let segment_weight = x2 - x1;
                let middle = 0.5 * (y1 + y2);
                sum[column] += middle * segment_weight;
                square_sum[column] += middle * middle * segment_weight;
                weight[column] += segment_weight;
            }

            previous_position = current_position;
            previous_value = current_value;
        }

        let mut columns = WaveColumns {
            min,
            max,
            mean: vec![0.0; width],
            deviation: vec![0.0; width],
        };
        for column in 0..width {
            if weight[column] <= 0.0 {
                columns.min[column] = 0.0;
                columns.max[column] = 0.0;
                continue;
            }
            let mean = sum[column] / weight[column];
            let variance = square_sum[column] / weight[column] - mean * mean;
            columns.mean[column] = mean;
            columns.deviation[column] = variance.max(0.0).sqrt();
        }
        Some(columns)
    }

    /// Renders the samples between `start` and `end` into a `width` by `height` image. The
    /// image is reused while the parameters and the data stay the same. Returns None if the
    /// range is empty.
    pub fn paint(
        &mut self,
        start: usize,
        end: usize,
        zoom_y: f64,
        width: usize,
        height: usize,
    ) -> Option<&WaveImage> {
        let (start, end) = self.clamp_range(start, end)?;
        let view = View {
            start,
            end,
            zoom_y,
            width,
            height,
        };

        if self.image.is_none() || self.view != Some(view) {
            let columns = self.columns(start, end, width)?;
            debug!(start, end, width, height, zoom_y, "Rendering wave image.");
            self.image = Some(self.render(&view, &columns));
            self.view = Some(view);
        }
        self.image.as_ref()
    }

    /// Returns the samples around a position as (index, y) points scaled like the last painted
    /// image, for a zoomed-in polyline. Returns None if nothing was painted yet or the range
    /// holds a single sample.
    pub fn data_around(&self, position: usize, desired_length: usize) -> Option<Vec<(f64, f64)>> {
        let view = self.view?;
        if self.samples.is_empty() {
            return None;
        }

        let left = position.saturating_sub(desired_length);
        let right = position
            .saturating_add(desired_length)
            .min(self.samples.len() - 1);
        if right <= left {
            return None;
        }

        let coefficient = view.coefficient();
        let offset = view.offset();
        Some(
            (left..=right)
                .map(|index| {
                    (
                        index as f64,
                        coefficient * self.samples[index] as f64 + offset,
                    )
                })
                .collect(),
        )
    }

    fn clamp_range(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let last = self.samples.len().checked_sub(1)?;
        let (start, end) = (start.min(last), end.min(last));
        if start >= end {
            return None;
        }
        Some((start, end))
    }

    fn render(&self, view: &View, columns: &WaveColumns) -> WaveImage {
        let mut image = WaveImage::filled(view.width, view.height, self.colors.background);
        self.draw_grid(&mut image);

        let coefficient = view.coefficient();
        let offset = view.offset();
        for column in 0..view.width {
            let mean = coefficient * columns.mean[column] + offset;
            let deviation = coefficient.abs() * columns.deviation[column];
            let top = coefficient * columns.max[column] + offset;
            let bottom = coefficient * columns.min[column] + offset;

            for row in 0..view.height {
                let y = row as f64;
                let amount = if y < mean {
                    value_x(top, 0.0, mean - deviation, 1.0, y)
                } else {
                    value_x(mean + deviation, 1.0, bottom, 0.0, y)
                };
                if amount > 0.0 {
                    image.blend(column, row, self.colors.wave, amount);
                }
            }
        }
        image
    }

    fn draw_grid(&self, image: &mut WaveImage) {
        let height = image.height as f64;
        for eighth in 1..8 {
            let row = (eighth as f64 * 0.125 * height) as usize;
            if row >= image.height {
                continue;
            }
            // Solid center line, dotted elsewhere.
            let dotted = eighth != 4;
            for x in 0..image.width {
                if !dotted || x % 3 == 0 {
                    image.blend(x, row, self.colors.grid, GRID_ALPHA);
                }
            }
        }
    }
}

impl Default for WavePainter {
    fn default() -> Self {
        WavePainter::new(WaveColors::default())
    }
}

/// Linear interpolation of a value between two positions, constant outside of them.
fn value_x(position1: f64, value1: f64, position2: f64, value2: f64, x: f64) -> f64 {
    if x <= position1 {
        return value1;
    }
    if x >= position2 {
        return value2;
    }
    ((x - position1) * value2 + (position2 - x) * value1) / (position2 - position1)
}

/// Blends `color2` over `color1`. The result is opaque.
fn merge_rgb(color1: u32, color2: u32, amount: f64) -> u32 {
    if amount >= 1.0 {
        return color2;
    }
    let channel = |shift: u32| {
        let c1 = ((color1 >> shift) & 0xFF) as f64;
        let c2 = ((color2 >> shift) & 0xFF) as f64;
        (((1.0 - amount) * c1 + amount * c2) as u32 & 0xFF) << shift
    };
    0xFF000000 | channel(16) | channel(8) | channel(0)
}

#[cfg(test)]
mod test {
    use super::*;

    fn triangle(len: usize, amplitude: i16) -> Vec<i16> {
        (0..len)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    fn square(len: usize, amplitude: i16) -> Vec<i16> {
        (0..len)
            .map(|i| if i % 4 < 2 { amplitude } else { -amplitude })
            .collect()
    }

    #[test]
    fn test_constant_signal() {
        let mut painter = WavePainter::default();
        painter.set_samples(vec![1000; 501]);

        // Sub-sampled, super-sampled and a ratio that is not an integer.
        for width in [50, 2000, 333] {
            let columns = painter.columns(0, 500, width).expect("columns");
            assert_eq!(width, columns.width());
            for column in 0..width {
                assert_eq!(1000.0, columns.min[column]);
                assert_eq!(1000.0, columns.max[column]);
                assert!((columns.mean[column] - 1000.0).abs() < 1e-9);
                assert!(columns.deviation[column] < 1e-3);
            }
        }
    }

    #[test]
    fn test_ramp_columns() {
        let mut painter = WavePainter::default();
        painter.set_samples((0..=100).map(|i| i * 10).collect());

        let columns = painter.columns(0, 100, 10).expect("columns");
        for column in 0..10 {
            let low = column as f64 * 100.0;
            assert!((columns.min[column] - low).abs() < 1e-6);
            assert!((columns.max[column] - (low + 100.0)).abs() < 1e-6);
            assert!((columns.mean[column] - (low + 50.0)).abs() < 1e-6);
            // A linear ramp over 100 units has a deviation of 100 / sqrt(12).
            assert!((columns.deviation[column] - 100.0 / 12f64.sqrt()).abs() < 1.0);
        }
    }

    #[test]
    fn test_empty_ranges() {
        let mut painter = WavePainter::default();
        assert!(painter.paint(0, 10, 1.0, 10, 10).is_none());

        painter.set_samples(vec![0; 10]);
        assert!(painter.paint(4, 4, 1.0, 10, 10).is_none());
        assert!(painter.paint(5, 2, 1.0, 10, 10).is_none());
        // Both ends clamp to the last sample.
        assert!(painter.paint(20, 30, 1.0, 10, 10).is_none());
        assert!(painter.columns(0, 9, 0).is_none());
        assert!(painter.paint(0, 30, 1.0, 10, 10).is_some());
    }

    #[test]
    fn test_set_data_little_endian() {
        let mut painter = WavePainter::default();
        painter.set_data(&[0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80, 0x7F]);
        assert_eq!(3, painter.sample_count());
        let columns = painter.columns(0, 2, 2).expect("columns");
        assert_eq!(-1.0, columns.min[0]);
        assert_eq!(1.0, columns.max[0]);
        assert_eq!(-32768.0, columns.min[1]);
    }

    #[test]
    fn test_image() {
        let colors = WaveColors::default();
        let mut painter = WavePainter::new(colors);
        painter.set_samples(square(4001, 16384));

        let image = painter.paint(0, 4000, 1.0, 100, 64).expect("image");
        assert_eq!(100, image.width());
        assert_eq!(64, image.height());
        assert_eq!(100 * 64, image.pixels().len());
        for x in [0, 37, 99] {
            // Outside of the envelope.
            assert_eq!(colors.background, image.pixel(x, 2));
            assert_eq!(colors.background, image.pixel(x, 60));
            // Within one deviation of the mean.
            assert_eq!(colors.wave, image.pixel(x, 24));
            assert_eq!(colors.wave, image.pixel(x, 40));
        }
        // Grid lines are blended over the background.
        let grid = image.pixel(3, 56);
        assert_ne!(colors.background, grid);
        assert_ne!(colors.grid, grid);
    }

    #[test]
    fn test_cache() {
        let mut painter = WavePainter::default();
        painter.set_samples(vec![0; 101]);
        let flat = painter.paint(0, 100, 1.0, 20, 16).expect("image").clone();
        assert_eq!(Some(&flat), painter.paint(0, 100, 1.0, 20, 16));

        painter.set_samples(triangle(101, 30000));
        let wave = painter.paint(0, 100, 1.0, 20, 16).expect("image").clone();
        assert_ne!(flat, wave);

        let taller = painter.paint(0, 100, 1.0, 20, 32).expect("image");
        assert_eq!(32, taller.height());
    }

    #[test]
    fn test_data_around() {
        let mut painter = WavePainter::default();
        painter.set_samples((0..100).map(|i| i * 100).collect());
        assert!(painter.data_around(10, 5).is_none());

        painter.paint(0, 99, 1.0, 50, 64);
        let points = painter.data_around(10, 5).expect("points");
        assert_eq!(11, points.len());
        assert_eq!((5.0, 32.0 - 500.0 * 64.0 / 65536.0), points[0]);
        assert_eq!(15.0, points[10].0);

        let points = painter.data_around(98, 5).expect("points");
        assert_eq!((93.0, 99.0), (points[0].0, points[points.len() - 1].0));
        assert!(painter.data_around(200, 5).is_none());
    }

    #[test]
    fn test_merge_rgb() {
        assert_eq!(0xFF102030, merge_rgb(0xFF000000, 0xFF102030, 1.0));
        assert_eq!(0xFF081018, merge_rgb(0xFF000000, 0xFF102030, 0.5));
        assert_eq!(0.5, value_x(0.0, 0.0, 10.0, 1.0, 5.0));
        assert_eq!(1.0, value_x(0.0, 0.0, 10.0, 1.0, 12.0));
    }
}
