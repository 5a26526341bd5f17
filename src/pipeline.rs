//! The vignetting averager: scan a folder, timestamp the
//! images, keep those inside a time window, average them
//! and write the result next to the inputs.
use std::{fs, path::PathBuf};

use anyhow::{ensure, Context, Result};
use chrono::NaiveDateTime;
use indicatif::ProgressBar;
use itertools::Itertools;
use log::{info, warn};
use serde_derive::*;

use crate::{
    catalog::{scan_folder, Catalog, SkippedImage},
    metadata::supported_extensions,
    output::{output_file_name, write_gray16, OutputFormat},
    stack::{load_gray16, to_u16, StackAccumulator},
    vignetting::{MapSummary, RadiometricScale, VignettingMap},
    window::TimeWindow,
};

#[derive(Clone, Debug)]
pub struct AveragerConfig {
    pub folder: PathBuf,
    pub window: TimeWindow,
    /// Defaults to `folder`; created if missing.
    pub output_dir: Option<PathBuf>,
    pub format: OutputFormat,
    /// Where to write the deviation map as CSV, if at all.
    pub map_csv: Option<PathBuf>,
    pub scale: RadiometricScale,
}

impl AveragerConfig {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        AveragerConfig {
            folder: folder.into(),
            window: TimeWindow::all(),
            output_dir: None,
            format: OutputFormat::default(),
            map_csv: None,
            scale: RadiometricScale::default(),
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .as_ref()
            .unwrap_or(&self.folder)
            .join(output_file_name(&self.window, self.format))
    }
}

#[derive(Debug, Serialize)]
pub struct AveragingReport {
    pub folder: PathBuf,
    pub window: TimeWindow,
    pub scanned: usize,
    pub timestamped: usize,
    /// Capture time that elapsed times are measured from.
    pub first_capture: Option<NaiveDateTime>,
    pub selected: usize,
    pub averaged: usize,
    pub skipped: Vec<SkippedImage>,
    pub width: usize,
    pub height: usize,
    pub output: PathBuf,
    pub map: Option<MapSummary>,
}

/// Run the whole pipeline. Per-image problems are logged
/// and reported as skipped; an empty selection, an empty
/// stack or frames of different sizes abort the run.
pub fn run(config: &AveragerConfig, bar: &ProgressBar) -> Result<AveragingReport> {
    let paths = scan_folder(&config.folder)?;
    ensure!(
        !paths.is_empty(),
        "no images ({}) found in {}",
        supported_extensions().join(", "),
        config.folder.display()
    );
    let scanned = paths.len();
    info!("found {} images in {}", scanned, config.folder.display());

    bar.set_length(scanned as u64);
    bar.set_message("reading timestamps");
    let (catalog, mut skipped) = Catalog::read(paths, bar);
    let timestamped = catalog.timestamped().count();
    ensure!(
        timestamped > 0,
        "none of the {} images in {} has a readable capture time",
        scanned,
        config.folder.display()
    );

    let selected = catalog.select(&config.window);
    ensure!(
        !selected.is_empty(),
        "no images in the time window ({}); the sequence spans {}",
        config.window,
        catalog
            .timestamped()
            .filter_map(|r| r.elapsed())
            .max()
            .map(|last| format!("00:00:00 to {}", last))
            .unwrap_or_default()
    );
    let first_capture = catalog.first_capture_time();
    info!(
        "averaging {} of {} timestamped images ({}, measured from {})",
        selected.len(),
        timestamped,
        config.window,
        first_capture.map(|t| t.to_string()).unwrap_or_default()
    );

    bar.set_position(0);
    bar.set_length(selected.len() as u64);
    bar.set_message("averaging");
    let mut stack = StackAccumulator::new();
    for record in selected.iter() {
        match load_gray16(&record.path) {
            Ok(frame) => stack
                .add(&frame)
                .with_context(|| format!("stacking {}", record.path.display()))?,
            Err(e) => {
                warn!("skipping {}: {:#}", record.path.display(), e);
                skipped.push(SkippedImage {
                    path: record.path.clone(),
                    reason: format!("{:#}", e),
                });
            }
        }
        bar.inc(1);
    }
    ensure!(
        !stack.is_empty(),
        "none of the {} selected images could be loaded",
        selected.len()
    );

    let mean = stack.mean()?;
    let (height, width) = mean.dim();

    let output = config.output_path();
    if let Some(dir) = &config.output_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    write_gray16(&to_u16(&mean), &output, config.format)?;
    info!("wrote {}x{} mean of {} frames to {}", width, height, stack.len(), output.display());

    let map = match &config.map_csv {
        Some(csv_path) => {
            let map = VignettingMap::from_temperatures(&config.scale.temperature_map(&mean))?;
            let file = fs::File::create(csv_path)
                .with_context(|| format!("creating {}", csv_path.display()))?;
            map.write_csv(std::io::BufWriter::new(file))?;
            info!("wrote vignetting map to {}", csv_path.display());
            Some(map.summary())
        }
        None => None,
    };

    Ok(AveragingReport {
        folder: config.folder.clone(),
        window: config.window,
        scanned,
        timestamped,
        first_capture,
        selected: selected.len(),
        averaged: stack.len(),
        skipped,
        width,
        height,
        output,
        map,
    })
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use anyhow::Result;
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::testutil::{flat, write_tiff};

    /// Three 4x2 frames, 30 s apart, with flat values
    /// 100, 200 and 300.
    fn sequence() -> Result<TempDir> {
        let dir = tempdir()?;
        for (idx, secs) in [0u32, 30, 60].iter().enumerate() {
            let stamp = format!("2023:05:01 10:{:02}:{:02}", secs / 60, secs % 60);
            let value = 100 * (idx as u16 + 1);
            write_tiff(
                &dir.path().join(format!("frame_{}.tif", idx)),
                4,
                2,
                &flat(4, 2, value),
                Some(&stamp),
            )?;
        }
        Ok(dir)
    }

    fn run_quiet(config: &AveragerConfig) -> Result<AveragingReport> {
        run(config, &ProgressBar::hidden())
    }

    fn flat_value(path: &Path) -> Result<u16> {
        let image = load_gray16(path)?;
        assert_eq!(image.dim(), (2, 4));
        let first = image[(0, 0)];
        assert!(image.iter().all(|&v| v == first));
        Ok(first)
    }

    #[test]
    fn averages_every_image_by_default() -> Result<()> {
        let dir = sequence()?;
        let report = run_quiet(&AveragerConfig::new(dir.path()))?;

        assert_eq!(report.scanned, 3);
        assert_eq!(report.selected, 3);
        assert_eq!(report.averaged, 3);
        assert_eq!((report.width, report.height), (4, 2));
        assert_eq!(report.output, dir.path().join("vignetting_all.tif"));
        assert_eq!(flat_value(&report.output)?, 200);
        Ok(())
    }

    #[test]
    fn averages_inside_window() -> Result<()> {
        let dir = sequence()?;
        let mut config = AveragerConfig::new(dir.path());
        config.window = TimeWindow::parse(Some("00:00:00"), Some("00:00:30"))?;
        config.format = OutputFormat::Png;

        let report = run_quiet(&config)?;
        assert_eq!(report.selected, 2);
        assert_eq!(
            report.output,
            dir.path().join("vignetting_00-00-00_to_00-00-30.png")
        );
        assert_eq!(flat_value(&report.output)?, 150);
        Ok(())
    }

    #[test]
    fn empty_window_fails() -> Result<()> {
        let dir = sequence()?;
        let mut config = AveragerConfig::new(dir.path());
        config.window = TimeWindow::parse(Some("00:05:00"), None)?;
        let err = run_quiet(&config).unwrap_err();
        assert!(err.to_string().contains("no images in the time window"));
        Ok(())
    }

    #[test]
    fn empty_folder_fails() -> Result<()> {
        let dir = tempdir()?;
        assert!(run_quiet(&AveragerConfig::new(dir.path())).is_err());
        Ok(())
    }

    #[test]
    fn skips_unreadable_images() -> Result<()> {
        let dir = sequence()?;
        fs::write(dir.path().join("corrupt.tif"), b"truncated transfer")?;
        // named like a radiometric export but not decodable
        fs::write(dir.path().join("10-00-10-000-radiometric.tiff"), b"junk")?;

        let report = run_quiet(&AveragerConfig::new(dir.path()))?;
        assert_eq!(report.scanned, 5);
        assert_eq!(report.averaged, 3);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(flat_value(&report.output)?, 200);
        Ok(())
    }

    #[test]
    fn file_name_timed_frames_join_the_window() -> Result<()> {
        let dir = sequence()?;
        fs::write(dir.path().join("10-00-10-000-radiometric.tiff"), b"junk")?;
        write_tiff(
            &dir.path().join("10-00-15-000-radiometric.tiff"),
            4,
            2,
            &flat(4, 2, 200),
            None,
        )?;

        let mut config = AveragerConfig::new(dir.path());
        config.window = TimeWindow::parse(Some("00:00:00"), Some("00:00:30"))?;
        let report = run_quiet(&config)?;
        assert_eq!(report.scanned, 5);
        assert_eq!(report.selected, 3);
        assert_eq!(report.averaged, 3);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].path.ends_with("10-00-10-000-radiometric.tiff"));
        assert_eq!(
            report.first_capture.map(|t| t.to_string()),
            Some("2023-05-01 10:00:00".to_string())
        );
        // (100 + 200 + 200) / 3
        assert_eq!(flat_value(&report.output)?, 167);
        Ok(())
    }

    #[test]
    fn mismatched_frames_abort() -> Result<()> {
        let dir = sequence()?;
        write_tiff(
            &dir.path().join("odd.tif"),
            3,
            3,
            &flat(3, 3, 100),
            Some("2023:05:01 10:00:45"),
        )?;
        let err = run_quiet(&AveragerConfig::new(dir.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("odd.tif"));
        Ok(())
    }

    #[test]
    fn writes_map_and_output_dir() -> Result<()> {
        let dir = sequence()?;
        let out = dir.path().join("results");
        let mut config = AveragerConfig::new(dir.path());
        config.output_dir = Some(out.clone());
        config.map_csv = Some(out.join("map.csv"));

        let report = run_quiet(&config)?;
        assert!(report.output.starts_with(&out));
        let summary = report.map.expect("map summary");
        // 200 counts at 40 counts/°C, offset -100 °C
        assert_eq!(summary.center_celsius, -95.);
        assert_eq!((summary.min_deviation, summary.max_deviation), (0., 0.));

        let csv = fs::read_to_string(out.join("map.csv"))?;
        assert_eq!(csv.lines().count(), 1 + 8);
        Ok(())
    }

    #[test]
    fn report_serializes() -> Result<()> {
        let dir = sequence()?;
        let report = run_quiet(&AveragerConfig::new(dir.path()))?;
        let json = serde_json::to_value(&report)?;
        assert_eq!(json["averaged"], 3);
        assert!(json["output"].as_str().unwrap().ends_with("vignetting_all.tif"));
        Ok(())
    }
}
