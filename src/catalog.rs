//! The table of images in a calibration folder.
use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use chrono::NaiveDateTime;
use indicatif::ProgressBar;
use log::{debug, warn};
use serde_derive::*;

use crate::{
    metadata::{read_capture_time, CaptureTime, ImageFormat, TimestampSource},
    output::OUTPUT_PREFIX,
    window::{TimeOffset, TimeWindow},
};

/// Regular files in `folder` with a supported image
/// extension, sorted by path. Averages written by earlier
/// runs are left out.
pub fn scan_folder(folder: &Path) -> Result<Vec<PathBuf>> {
    ensure!(folder.is_dir(), "not a directory: {}", folder.display());

    let mut paths = vec![];
    for entry in fs::read_dir(folder).with_context(|| format!("listing {}", folder.display()))? {
        let path = entry?.path();
        if !path.is_file() || ImageFormat::from_path(&path).is_none() {
            continue;
        }
        if is_previous_output(&path) {
            debug!("ignoring earlier output {}", path.display());
            continue;
        }
        paths.push(path);
    }
    paths.sort();
    debug!("{} images in {}", paths.len(), folder.display());
    Ok(paths)
}

#[derive(Clone, Debug, Serialize)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub capture_time: Option<CaptureTime>,
    pub elapsed_seconds: Option<u64>,
}

impl ImageRecord {
    pub fn elapsed(&self) -> Option<TimeOffset> {
        self.elapsed_seconds.map(TimeOffset::from_seconds)
    }
}

/// An image left out of the average, and why.
#[derive(Clone, Debug, Serialize)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: String,
}

/// Image records sorted by capture time; records without
/// one come last.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Catalog {
    records: Vec<ImageRecord>,
}

impl Catalog {
    /// Read the capture time of every path. Unreadable
    /// images stay in the table without a timestamp and
    /// are returned as skipped.
    pub fn read(paths: Vec<PathBuf>, bar: &ProgressBar) -> (Self, Vec<SkippedImage>) {
        let mut skipped = vec![];
        let entries = paths
            .into_iter()
            .map(|path| {
                let time = match read_capture_time(&path) {
                    Ok(time) => Some(time),
                    Err(e) => {
                        warn!("skipping {}: {:#}", path.display(), e);
                        skipped.push(SkippedImage {
                            path: path.clone(),
                            reason: format!("{:#}", e),
                        });
                        None
                    }
                };
                bar.inc(1);
                (path, time)
            })
            .collect();
        (Catalog::from_capture_times(entries), skipped)
    }

    /// Build the table, computing elapsed time relative to
    /// the earliest valid timestamp.
    ///
    /// File names only give a time of day. When the folder
    /// also holds dated frames, those times are moved onto
    /// the date of the earliest dated frame.
    pub fn from_capture_times(entries: Vec<(PathBuf, Option<CaptureTime>)>) -> Self {
        let entries = anchor_file_name_times(entries);
        let first = entries.iter().filter_map(|(_, t)| t.map(|t| t.time)).min();

        let mut records: Vec<_> = entries
            .into_iter()
            .map(|(path, capture_time)| {
                let elapsed_seconds = capture_time
                    .zip(first)
                    .map(|(t, first)| (t.time - first).num_seconds().max(0) as u64);
                ImageRecord {
                    path,
                    capture_time,
                    elapsed_seconds,
                }
            })
            .collect();

        records.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        Catalog { records }
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records with a capture time.
    pub fn timestamped(&self) -> impl Iterator<Item = &ImageRecord> {
        self.records.iter().filter(|r| r.capture_time.is_some())
    }

    pub fn first_capture_time(&self) -> Option<NaiveDateTime> {
        self.timestamped().next().and_then(|r| r.capture_time).map(|t| t.time)
    }

    /// Records whose elapsed time lies in `window`, in
    /// capture order.
    pub fn select(&self, window: &TimeWindow) -> Vec<&ImageRecord> {
        self.records
            .iter()
            .filter(|r| r.elapsed_seconds.map_or(false, |e| window.contains(e)))
            .collect()
    }
}

fn anchor_file_name_times(
    mut entries: Vec<(PathBuf, Option<CaptureTime>)>,
) -> Vec<(PathBuf, Option<CaptureTime>)> {
    let date = entries
        .iter()
        .filter_map(|(_, t)| *t)
        .filter(|t| t.source != TimestampSource::FileName)
        .map(|t| t.time.date())
        .min();
    let date = match date {
        Some(date) => date,
        None => return entries,
    };

    let mut anchored = 0;
    for time in entries.iter_mut().filter_map(|(_, t)| t.as_mut()) {
        if time.source == TimestampSource::FileName {
            time.time = date.and_time(time.time.time());
            anchored += 1;
        }
    }
    if anchored > 0 {
        warn!(
            "{} images are timed by file name only; assuming they were taken on {}",
            anchored, date
        );
    }
    entries
}

fn is_previous_output(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| name.starts_with(OUTPUT_PREFIX))
}

fn sort_key(record: &ImageRecord) -> (bool, Option<NaiveDateTime>, &Path) {
    let time = record.capture_time.map(|t| t.time);
    (time.is_none(), time, record.path.as_path())
}
