mod args;

use std::{
    io::{self, Write},
    path::Path,
};

use anyhow::{bail, Result};
use log::warn;
use serde_derive::*;
use thermic::{
    exif::ExifData,
    metadata::{read_capture_time, read_exif, CaptureTime},
};

use args::Args;

#[derive(Serialize)]
struct ImageTags<'a> {
    path: &'a Path,
    capture_time: Option<CaptureTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    capture_time_error: Option<String>,
    tags: Option<ExifData>,
}

fn print_text<W: Write>(out: &mut W, image: &ImageTags) -> Result<()> {
    writeln!(out, "{}:", image.path.display())?;
    match &image.capture_time {
        Some(time) => writeln!(out, "  capture time: {} ({:?})", time.time, time.source)?,
        None => writeln!(
            out,
            "  capture time: none ({})",
            image.capture_time_error.as_deref().unwrap_or("unknown")
        )?,
    }
    let exif = match &image.tags {
        Some(exif) => exif,
        None => {
            writeln!(out, "  no EXIF tags")?;
            return Ok(());
        }
    };
    for entry in exif.entries() {
        writeln!(
            out,
            "  {:<5} {:#06x} {:<28} {}",
            entry.directory.to_string(),
            entry.tag,
            entry.name.unwrap_or("?"),
            entry.value
        )?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let Args { paths, json } = Args::from_cmd_line()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut failures = 0;
    for path in paths.iter() {
        let tags = match read_exif(path) {
            Ok(tags) => tags,
            Err(e) => {
                warn!("{}: {:#}", path.display(), e);
                failures += 1;
                continue;
            }
        };
        let (capture_time, capture_time_error) = match read_capture_time(path) {
            Ok(time) => (Some(time), None),
            Err(e) => {
                warn!("{}: no capture time: {:#}", path.display(), e);
                (None, Some(format!("{:#}", e)))
            }
        };
        let image = ImageTags {
            path,
            capture_time,
            capture_time_error,
            tags,
        };

        if json {
            serde_json::to_writer(&mut out, &image)?;
            writeln!(out)?;
        } else {
            print_text(&mut out, &image)?;
        }
    }

    if failures == paths.len() {
        bail!("could not read tags from any of the {} images", failures);
    }
    Ok(())
}
