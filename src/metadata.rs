//! Capture times of calibration images.
//!
//! Where the time is stored depends on the format:
//!
//! - JPEG and PNG carry an EXIF block in a container
//!   segment (`APP1`, `eXIf`). It is extracted with
//!   [`img_parts`] and decoded by [`ExifData`].
//! - TIFF stores the baseline `DateTime` tag next to the
//!   raster data, and is read with the [`tiff`] decoder.
//!
//! Radiometric TIFF exports usually carry no date at all
//! but are named after the capture time of day
//! (`14-25-28-269-radiometric.tiff`); that name is used
//! when the metadata has nothing.
use std::{
    fs::{read, File},
    io::BufReader,
    path::Path,
};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use img_parts::{jpeg::Jpeg, png::Png, ImageEXIF};
use lazy_static::lazy_static;
use regex::Regex;
use serde_derive::*;
use tiff::{
    decoder::{ifd::Value, Decoder},
    tags::Tag,
};

use crate::exif::{parse_exif_datetime, ExifData};

static EXTENSIONS: [(&str, ImageFormat); 5] = [
    ("png", ImageFormat::Png),
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
];

/// File extensions (lower case) considered by the
/// averager.
pub fn supported_extensions() -> impl Iterator<Item = &'static str> {
    EXTENSIONS.iter().map(|(ext, _)| *ext)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Tiff,
}

impl ImageFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        EXTENSIONS
            .iter()
            .find(|(known, _)| ext.eq_ignore_ascii_case(known))
            .map(|(_, format)| *format)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampSource {
    Exif,
    TiffTag,
    FileName,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CaptureTime {
    pub time: NaiveDateTime,
    pub source: TimestampSource,
}

/// Capture time of the image at `path`.
///
/// Embedded metadata wins over the file name, which is
/// only consulted when the file carries no date at all. A
/// file that cannot be decoded, or holds a malformed date,
/// is an error whatever its name.
pub fn read_capture_time(path: &Path) -> Result<CaptureTime> {
    let format = ImageFormat::from_path(path)
        .ok_or_else(|| anyhow!("unsupported image extension: {}", path.display()))?;

    let embedded = match format {
        ImageFormat::Jpeg | ImageFormat::Png => container_capture_time(path),
        ImageFormat::Tiff => raster_capture_time(path),
    };
    match embedded.context("reading embedded capture time")? {
        Some(time) => Ok(time),
        None => file_name_capture_time(path)
            .ok_or_else(|| anyhow!("no capture time in metadata or file name")),
    }
}

/// All EXIF/TIFF tags of the image at `path`, or `None`
/// for a JPEG/PNG without an EXIF block.
pub fn read_exif(path: &Path) -> Result<Option<ExifData>> {
    let format = ImageFormat::from_path(path)
        .ok_or_else(|| anyhow!("unsupported image extension: {}", path.display()))?;
    let bytes = read(path)?;

    let exif = match format {
        ImageFormat::Jpeg => Jpeg::from_bytes(bytes.into())?.exif(),
        ImageFormat::Png => Png::from_bytes(bytes.into())?.exif(),
        ImageFormat::Tiff => return ExifData::parse(&bytes).map(Some),
    };
    exif.map(|block| ExifData::parse(&block).context("parsing EXIF block"))
        .transpose()
}

fn container_capture_time(path: &Path) -> Result<Option<CaptureTime>> {
    let exif = match read_exif(path)? {
        Some(exif) => exif,
        None => return Ok(None),
    };
    Ok(exif.capture_time()?.map(|time| CaptureTime {
        time,
        source: TimestampSource::Exif,
    }))
}

fn raster_capture_time(path: &Path) -> Result<Option<CaptureTime>> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    let time = match decoder.find_tag(Tag::DateTime)? {
        Some(Value::Ascii(text)) => parse_exif_datetime(&text)?,
        Some(other) => bail!("unexpected DateTime tag value: {:?}", other),
        None => return Ok(None),
    };
    Ok(Some(CaptureTime {
        time,
        source: TimestampSource::TiffTag,
    }))
}

/// Time of day from a leading `H-M-S-ms` file name
/// pattern, anchored on 1970-01-01.
pub fn file_name_capture_time(path: &Path) -> Option<CaptureTime> {
    lazy_static! {
        static ref RE: Regex = Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d{1,2})-(\d{1,3})").unwrap();
    }

    let name = path.file_name()?.to_str()?;
    let caps = RE.captures(name)?;
    let field = |idx: usize| caps[idx].parse::<u32>().ok();
    let time = NaiveTime::from_hms_milli_opt(field(1)?, field(2)?, field(3)?, field(4)?)?;
    Some(CaptureTime {
        time: NaiveDate::from_ymd_opt(1970, 1, 1)?.and_time(time),
        source: TimestampSource::FileName,
    })
}
