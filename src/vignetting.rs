//! Vignetting maps: temperature deviation from the optical
//! center.
//!
//! The mean raw counts of a flat-field sequence convert
//! linearly to temperature. Vignetting shows up as the
//! positional falloff of that temperature relative to the
//! central pixel.
use std::io::Write;

use anyhow::{ensure, Result};
use itertools::iproduct;
use ndarray::Array2;
use serde_derive::*;

/// Linear conversion from raw counts to degrees Celsius:
/// `t = counts / counts_per_degree + offset_celsius`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RadiometricScale {
    pub counts_per_degree: f64,
    pub offset_celsius: f64,
}

impl Default for RadiometricScale {
    /// Radiometric TIFF exports at 0.025 °C per count,
    /// starting at -100 °C.
    fn default() -> Self {
        RadiometricScale {
            counts_per_degree: 40.,
            offset_celsius: -100.,
        }
    }
}

impl RadiometricScale {
    pub fn temperature(&self, counts: f64) -> f64 {
        counts / self.counts_per_degree + self.offset_celsius
    }

    pub fn temperature_map(&self, counts: &Array2<f64>) -> Array2<f64> {
        counts.mapv(|c| self.temperature(c))
    }
}

/// Temperature map with the central pixel subtracted.
#[derive(Debug)]
pub struct VignettingMap {
    pub center_celsius: f64,
    pub deviation: Array2<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MapSummary {
    pub center_celsius: f64,
    pub min_deviation: f64,
    pub max_deviation: f64,
}

impl VignettingMap {
    /// The center is pixel `[h / 2, w / 2]`.
    pub fn from_temperatures(temperatures: &Array2<f64>) -> Result<Self> {
        let (ht, wid) = temperatures.dim();
        ensure!(ht > 0 && wid > 0, "empty temperature map");

        let center_celsius = temperatures[(ht / 2, wid / 2)];
        Ok(VignettingMap {
            center_celsius,
            deviation: temperatures.mapv(|t| t - center_celsius),
        })
    }

    pub fn summary(&self) -> MapSummary {
        let (min_deviation, max_deviation) = self
            .deviation
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &d| {
                (lo.min(d), hi.max(d))
            });
        MapSummary {
            center_celsius: self.center_celsius,
            min_deviation,
            max_deviation,
        }
    }

    /// Write `row,col,deviation` lines with a header.
    pub fn write_csv<W: Write>(&self, mut out: W) -> Result<()> {
        let (ht, wid) = self.deviation.dim();
        writeln!(out, "row,col,deviation")?;
        for (row, col) in iproduct!(0..ht, 0..wid) {
            writeln!(out, "{},{},{}", row, col, self.deviation[(row, col)])?;
        }
        out.flush()?;
        Ok(())
    }
}
