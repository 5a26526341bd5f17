//! Read tags from TIFF-structured metadata.
//!
//! EXIF blocks embedded in JPEG `APP1` segments and PNG
//! `eXIf` chunks are laid out as a small TIFF file: a
//! byte-order mark (`II` or `MM`), the magic number 42, and
//! a chain of image file directories (IFDs) of 12-byte
//! entries. Capture times live in the EXIF sub-directory
//! that IFD0 points to with tag `0x8769`.
//!
//! The same reader also works on a whole TIFF file, which
//! is how the `thermic-exif` tool dumps tags of radiometric
//! TIFF exports.
use std::fmt;

use anyhow::{anyhow, bail, ensure, Context, Result};
use byteordered::{ByteOrdered, Endianness};
use chrono::{Duration, NaiveDateTime};
use itertools::Itertools;
use log::debug;
use serde_derive::*;

use crate::parse::{parse_many, Parseable};

/// Tag numbers used by the crate.
pub mod tags {
    pub const DATE_TIME: u16 = 0x0132;
    pub const EXIF_IFD: u16 = 0x8769;
    pub const DATE_TIME_ORIGINAL: u16 = 0x9003;
    pub const DATE_TIME_DIGITIZED: u16 = 0x9004;
    pub const SUB_SEC_TIME: u16 = 0x9290;
    pub const SUB_SEC_TIME_ORIGINAL: u16 = 0x9291;
    pub const SUB_SEC_TIME_DIGITIZED: u16 = 0x9292;
}

const EXIF_PREFIX: &[u8] = b"Exif\0\0";
const TIFF_MAGIC: u16 = 42;
const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Date/time tags in order of preference, with their
/// sub-second companions.
const CAPTURE_TIME_TAGS: [(u16, u16); 3] = [
    (tags::DATE_TIME_ORIGINAL, tags::SUB_SEC_TIME_ORIGINAL),
    (tags::DATE_TIME_DIGITIZED, tags::SUB_SEC_TIME_DIGITIZED),
    (tags::DATE_TIME, tags::SUB_SEC_TIME),
];

declare_parseable_struct! {
    struct TiffHeader {
        magic => u16,
        ifd_offset => u32,
    }
}

declare_parseable_struct! {
    struct RawEntry {
        tag => u16,
        field_type => u16,
        count => u32,
        value => [u8; 4],
    }
}

/// The directory an entry was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Directory {
    /// Position in the main IFD chain (`0` is the primary
    /// image, `1` usually the thumbnail).
    Image(usize),
    Exif,
}

impl fmt::Display for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directory::Image(idx) => write!(f, "IFD{}", idx),
            Directory::Exif => write!(f, "EXIF"),
        }
    }
}

/// Decoded value of a tag.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    Byte(Vec<u8>),
    Ascii(String),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
    SByte(Vec<i8>),
    Undefined(Vec<u8>),
    SShort(Vec<i16>),
    SLong(Vec<i32>),
    SRational(Vec<(i32, i32)>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl TagValue {
    /// Size in bytes of one value of a TIFF field type.
    fn unit_size(field_type: u16) -> Option<usize> {
        Some(match field_type {
            1 | 2 | 6 | 7 => 1,
            3 | 8 => 2,
            4 | 9 | 11 => 4,
            5 | 10 | 12 => 8,
            _ => return None,
        })
    }

    pub fn as_ascii(&self) -> Option<&str> {
        match self {
            TagValue::Ascii(text) => Some(text),
            _ => None,
        }
    }

    /// First value as an unsigned offset, for pointer tags.
    pub fn as_offset(&self) -> Option<u32> {
        match self {
            TagValue::Long(vals) => vals.first().copied(),
            TagValue::Short(vals) => vals.first().map(|&v| v.into()),
            _ => None,
        }
    }
}

const DISPLAY_LIMIT: usize = 16;

fn fmt_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, vals: &[T]) -> fmt::Result {
    write!(f, "{}", vals.iter().take(DISPLAY_LIMIT).join(" "))?;
    if vals.len() > DISPLAY_LIMIT {
        write!(f, " ... ({} values)", vals.len())?;
    }
    Ok(())
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Ascii(text) => write!(f, "{}", text),
            TagValue::Byte(vals) | TagValue::Undefined(vals) => fmt_list(f, vals),
            TagValue::Short(vals) => fmt_list(f, vals),
            TagValue::Long(vals) => fmt_list(f, vals),
            TagValue::SByte(vals) => fmt_list(f, vals),
            TagValue::SShort(vals) => fmt_list(f, vals),
            TagValue::SLong(vals) => fmt_list(f, vals),
            TagValue::Float(vals) => fmt_list(f, vals),
            TagValue::Double(vals) => fmt_list(f, vals),
            TagValue::Rational(vals) => {
                let vals: Vec<_> = vals.iter().map(|(n, d)| format!("{}/{}", n, d)).collect();
                fmt_list(f, &vals)
            }
            TagValue::SRational(vals) => {
                let vals: Vec<_> = vals.iter().map(|(n, d)| format!("{}/{}", n, d)).collect();
                fmt_list(f, &vals)
            }
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ExifEntry {
    pub directory: Directory,
    pub tag: u16,
    pub name: Option<&'static str>,
    pub value: TagValue,
}

/// All tags decoded from a TIFF-structured block.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ExifData {
    entries: Vec<ExifEntry>,
}

impl ExifData {
    /// Parse an EXIF block (the `Exif\0\0` prefix is
    /// optional) or a complete TIFF file.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.strip_prefix(EXIF_PREFIX).unwrap_or(bytes);
        ensure!(
            bytes.len() >= 8,
            "metadata too short for a TIFF header: {} bytes",
            bytes.len()
        );

        let endianness = match &bytes[..2] {
            b"II" => Endianness::Little,
            b"MM" => Endianness::Big,
            other => bail!("unexpected byte order mark: {:02x?}", other),
        };
        let header = TiffHeader::parse(&mut ByteOrdered::runtime(&bytes[2..], endianness))?;
        ensure!(
            header.magic == TIFF_MAGIC,
            "unexpected TIFF magic number: {}",
            header.magic
        );

        let reader = IfdReader {
            data: bytes,
            endianness,
        };
        let mut visited = vec![];
        let mut entries = vec![];
        let mut next = header.ifd_offset;
        let mut idx = 0;
        while next != 0 {
            ensure!(
                !visited.contains(&next),
                "IFD chain loops back to offset {}",
                next
            );
            visited.push(next);

            let (dir_entries, following) = reader
                .read_directory(next, Directory::Image(idx))
                .with_context(|| format!("reading IFD{} at offset {}", idx, next))?;

            let exif_offset = dir_entries
                .iter()
                .find(|e| e.tag == tags::EXIF_IFD)
                .and_then(|e| e.value.as_offset());
            entries.extend(dir_entries);

            if let Some(offset) = exif_offset {
                ensure!(
                    !visited.contains(&offset),
                    "EXIF IFD pointer loops back to offset {}",
                    offset
                );
                visited.push(offset);
                let (exif_entries, _) = reader
                    .read_directory(offset, Directory::Exif)
                    .with_context(|| format!("reading EXIF IFD at offset {}", offset))?;
                entries.extend(exif_entries);
            }

            next = following;
            idx += 1;
        }

        Ok(ExifData { entries })
    }

    pub fn entries(&self) -> &[ExifEntry] {
        &self.entries
    }

    /// First value found for `tag` in any directory.
    pub fn get(&self, tag: u16) -> Option<&TagValue> {
        self.entries.iter().find(|e| e.tag == tag).map(|e| &e.value)
    }

    pub fn ascii(&self, tag: u16) -> Option<&str> {
        self.get(tag).and_then(TagValue::as_ascii)
    }

    /// Capture time from `DateTimeOriginal`, falling back to
    /// `DateTimeDigitized` and then `DateTime`. Blank date
    /// strings count as absent; malformed ones are errors.
    pub fn capture_time(&self) -> Result<Option<NaiveDateTime>> {
        for &(tag, sub_sec_tag) in CAPTURE_TIME_TAGS.iter() {
            let text = match self.ascii(tag) {
                Some(text) if !is_blank_date(text) => text,
                _ => continue,
            };
            let stamp = parse_exif_datetime(text)?;
            return Ok(Some(with_sub_seconds(stamp, self.ascii(sub_sec_tag))));
        }
        Ok(None)
    }
}

struct IfdReader<'a> {
    data: &'a [u8],
    endianness: Endianness,
}

impl<'a> IfdReader<'a> {
    fn reader_at(&self, offset: usize) -> Result<ByteOrdered<&'a [u8], Endianness>> {
        let slice = self.data.get(offset..).ok_or_else(|| {
            anyhow!(
                "offset {} out of bounds ({} bytes)",
                offset,
                self.data.len()
            )
        })?;
        Ok(ByteOrdered::runtime(slice, self.endianness))
    }

    /// Read the directory at `offset`; returns its entries
    /// and the offset of the next directory (0 if none).
    fn read_directory(&self, offset: u32, directory: Directory) -> Result<(Vec<ExifEntry>, u32)> {
        let mut rdr = self.reader_at(offset as usize)?;
        let count = u16::parse(&mut rdr).context("reading entry count")?;
        let raw: Vec<RawEntry> = parse_many(&mut rdr, count as usize)?;
        // Some writers drop the trailing next-IFD pointer.
        let next = u32::parse(&mut rdr).unwrap_or(0);

        let entries = raw
            .into_iter()
            .filter_map(|raw| match self.decode(&raw) {
                Ok(value) => Some(ExifEntry {
                    directory,
                    tag: raw.tag,
                    name: tag_name(raw.tag),
                    value,
                }),
                Err(e) => {
                    debug!("skipping tag {:#06x} in {}: {:#}", raw.tag, directory, e);
                    None
                }
            })
            .collect();
        Ok((entries, next))
    }

    fn decode(&self, raw: &RawEntry) -> Result<TagValue> {
        let unit = TagValue::unit_size(raw.field_type)
            .ok_or_else(|| anyhow!("unknown field type {}", raw.field_type))?;
        let count = raw.count as usize;
        let len = unit
            .checked_mul(count)
            .ok_or_else(|| anyhow!("value count overflows: {}", count))?;

        let data: &[u8] = if len <= 4 {
            &raw.value[..len]
        } else {
            let offset =
                u32::parse(&mut ByteOrdered::runtime(&raw.value[..], self.endianness))? as usize;
            self.data
                .get(offset..offset.saturating_add(len))
                .ok_or_else(|| anyhow!("value at offset {} ({} bytes) out of bounds", offset, len))?
        };

        let mut rdr = ByteOrdered::runtime(data, self.endianness);
        Ok(match raw.field_type {
            1 => TagValue::Byte(data.to_vec()),
            2 => TagValue::Ascii(ascii_value(data)),
            3 => TagValue::Short(parse_many(&mut rdr, count)?),
            4 => TagValue::Long(parse_many(&mut rdr, count)?),
            5 => TagValue::Rational(
                parse_many::<u32, _, _>(&mut rdr, 2 * count)?
                    .chunks(2)
                    .map(|c| (c[0], c[1]))
                    .collect(),
            ),
            6 => TagValue::SByte(data.iter().map(|&b| b as i8).collect()),
            7 => TagValue::Undefined(data.to_vec()),
            8 => TagValue::SShort(parse_many(&mut rdr, count)?),
            9 => TagValue::SLong(parse_many(&mut rdr, count)?),
            10 => TagValue::SRational(
                parse_many::<i32, _, _>(&mut rdr, 2 * count)?
                    .chunks(2)
                    .map(|c| (c[0], c[1]))
                    .collect(),
            ),
            11 => TagValue::Float(parse_many(&mut rdr, count)?),
            12 => TagValue::Double(parse_many(&mut rdr, count)?),
            ty => unreachable!("unit size known for field type {}", ty),
        })
    }
}

/// ASCII values are NUL terminated; anything after the
/// first NUL is padding.
fn ascii_value(data: &[u8]) -> String {
    let text = data.split(|&b| b == 0).next().unwrap_or_default();
    String::from_utf8_lossy(text).trim_end().to_string()
}

fn is_blank_date(text: &str) -> bool {
    text.trim_matches(|c: char| c == ' ' || c == ':').is_empty()
}

/// Parse an EXIF `YYYY:MM:DD HH:MM:SS` date/time string.
pub fn parse_exif_datetime(text: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), EXIF_DATE_FORMAT)
        .with_context(|| format!("malformed EXIF date/time: {:?}", text))
}

/// Apply a `SubSecTime*` value: the digits are a decimal
/// fraction of a second (`"269"` is 0.269 s).
fn with_sub_seconds(stamp: NaiveDateTime, sub_sec: Option<&str>) -> NaiveDateTime {
    let digits: String = sub_sec
        .unwrap_or_default()
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .take(9)
        .collect();
    match digits.parse::<i64>() {
        Ok(frac) => stamp + Duration::nanoseconds(frac * 10i64.pow(9 - digits.len() as u32)),
        Err(_) => stamp,
    }
}

/// Names of commonly found tags.
pub fn tag_name(tag: u16) -> Option<&'static str> {
    Some(match tag {
        0x00fe => "NewSubfileType",
        0x0100 => "ImageWidth",
        0x0101 => "ImageLength",
        0x0102 => "BitsPerSample",
        0x0103 => "Compression",
        0x0106 => "PhotometricInterpretation",
        0x010e => "ImageDescription",
        0x010f => "Make",
        0x0110 => "Model",
        0x0111 => "StripOffsets",
        0x0112 => "Orientation",
        0x0115 => "SamplesPerPixel",
        0x0116 => "RowsPerStrip",
        0x0117 => "StripByteCounts",
        0x011a => "XResolution",
        0x011b => "YResolution",
        0x011c => "PlanarConfiguration",
        0x0128 => "ResolutionUnit",
        0x0131 => "Software",
        0x0132 => "DateTime",
        0x013b => "Artist",
        0x0153 => "SampleFormat",
        0x0201 => "JPEGInterchangeFormat",
        0x0202 => "JPEGInterchangeFormatLength",
        0x0213 => "YCbCrPositioning",
        0x8298 => "Copyright",
        0x8769 => "ExifIFDPointer",
        0x8825 => "GPSInfoIFDPointer",
        0x829a => "ExposureTime",
        0x829d => "FNumber",
        0x9000 => "ExifVersion",
        0x9003 => "DateTimeOriginal",
        0x9004 => "DateTimeDigitized",
        0x9010 => "OffsetTime",
        0x9011 => "OffsetTimeOriginal",
        0x9101 => "ComponentsConfiguration",
        0x920a => "FocalLength",
        0x927c => "MakerNote",
        0x9286 => "UserComment",
        0x9290 => "SubSecTime",
        0x9291 => "SubSecTimeOriginal",
        0x9292 => "SubSecTimeDigitized",
        0xa000 => "FlashpixVersion",
        0xa001 => "ColorSpace",
        0xa002 => "PixelXDimension",
        0xa003 => "PixelYDimension",
        0xa005 => "InteroperabilityIFDPointer",
        0xa433 => "LensMake",
        0xa434 => "LensModel",
        _ => return None,
    })
}
