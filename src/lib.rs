//! Build vignetting correction images from thermal
//! calibration sequences.
//!
//! A vignetting correction image captures the positional
//! intensity falloff of a sensor. It is obtained by
//! averaging many frames of a uniform target, optionally
//! restricted to a time window of the sequence (for
//! instance, once the camera has reached thermal
//! equilibrium).
//!
//! # Usage
//!
//! The [pipeline] runs the whole job: it [scans][catalog]
//! a folder, reads the [capture time](metadata) of every
//! image, keeps those inside a [`TimeWindow`] measured from
//! the first frame, [averages](stack) them pixel-wise and
//! writes a 16-bit image named after the window.
//!
//! ```rust
//! # fn test_compile() -> anyhow::Result<()> {
//! use indicatif::ProgressBar;
//! use thermic::{pipeline, AveragerConfig, TimeWindow};
//!
//! let mut config = AveragerConfig::new("calibration/run-3");
//! config.window = TimeWindow::parse(Some("00:10:00"), Some("00:20:00"))?;
//! let report = pipeline::run(&config, &ProgressBar::hidden())?;
//! println!("averaged {} frames into {}", report.averaged, report.output.display());
//! # Ok(())
//! # }
//! ```
//!
//! The stages are usable on their own. Capture times come
//! from EXIF blocks of JPEG/PNG files, from the `DateTime`
//! tag of TIFF files, or from radiometric file names such
//! as `14-25-28-269-radiometric.tiff`:
//!
//! ```rust
//! # fn test_compile() -> anyhow::Result<()> {
//! use std::path::Path;
//! use thermic::metadata::read_capture_time;
//!
//! let time = read_capture_time(Path::new("14-25-28-269-radiometric.tiff"))?;
//! println!("{} (from {:?})", time.time, time.source);
//! # Ok(())
//! # }
//! ```
//!
//! Averaging is a fold over equally-shaped frames:
//!
//! ```rust
//! # fn test_compile() -> anyhow::Result<()> {
//! use ndarray::Array2;
//! use thermic::stack::{average, to_u16};
//!
//! let frames = vec![Array2::<u16>::zeros((512, 640)); 4];
//! let mean: Array2<u16> = to_u16(&average(&frames)?);
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod parse;

pub mod exif;
pub mod metadata;

pub mod catalog;
pub mod window;

pub mod output;
pub mod stack;
pub mod vignetting;

pub mod pipeline;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(test)]
mod testutil;

pub use crate::catalog::{Catalog, ImageRecord};
pub use crate::pipeline::{AveragerConfig, AveragingReport};
pub use crate::window::{TimeOffset, TimeWindow};
