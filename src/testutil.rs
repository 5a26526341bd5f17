//! Fixtures shared by the unit tests.
use std::{
    fs::{self, File},
    io::BufWriter,
    path::Path,
};

use anyhow::Result;
use image::{DynamicImage, GrayImage, ImageBuffer, ImageOutputFormat, Luma};
use img_parts::{jpeg::Jpeg, png::Png, ImageEXIF};
use tiff::{
    encoder::{colortype, TiffEncoder},
    tags::Tag,
};

use crate::exif::tags;

/// Builds a minimal EXIF block holding ASCII tags in IFD0
/// and in the EXIF sub-directory.
pub struct ExifBuilder {
    big_endian: bool,
    primary: Vec<(u16, String)>,
    exif: Vec<(u16, String)>,
}

impl ExifBuilder {
    pub fn new(big_endian: bool) -> Self {
        ExifBuilder {
            big_endian,
            primary: vec![],
            exif: vec![],
        }
    }

    pub fn date_time(mut self, text: &str) -> Self {
        self.primary.push((tags::DATE_TIME, text.into()));
        self
    }

    pub fn date_time_original(mut self, text: &str) -> Self {
        self.exif.push((tags::DATE_TIME_ORIGINAL, text.into()));
        self
    }

    pub fn sub_sec_original(mut self, text: &str) -> Self {
        self.exif.push((tags::SUB_SEC_TIME_ORIGINAL, text.into()));
        self
    }

    fn put_u16(&self, out: &mut Vec<u8>, val: u16) {
        if self.big_endian {
            out.extend_from_slice(&val.to_be_bytes());
        } else {
            out.extend_from_slice(&val.to_le_bytes());
        }
    }

    fn put_u32(&self, out: &mut Vec<u8>, val: u32) {
        if self.big_endian {
            out.extend_from_slice(&val.to_be_bytes());
        } else {
            out.extend_from_slice(&val.to_le_bytes());
        }
    }

    fn put_ascii(&self, out: &mut Vec<u8>, data: &mut Vec<u8>, data_base: usize, tag: u16, text: &str) {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);

        self.put_u16(out, tag);
        self.put_u16(out, 2);
        self.put_u32(out, bytes.len() as u32);
        if bytes.len() <= 4 {
            bytes.resize(4, 0);
            out.extend_from_slice(&bytes);
        } else {
            self.put_u32(out, (data_base + data.len()) as u32);
            data.extend_from_slice(&bytes);
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let has_exif = !self.exif.is_empty();
        let primary_count = self.primary.len() + has_exif as usize;
        let exif_offset = 8 + 2 + 12 * primary_count + 4;
        let exif_size = if has_exif {
            2 + 12 * self.exif.len() + 4
        } else {
            0
        };
        let data_base = exif_offset + exif_size;

        let mut out = vec![];
        let mut data = vec![];
        out.extend_from_slice(if self.big_endian { b"MM" } else { b"II" });
        self.put_u16(&mut out, 42);
        self.put_u32(&mut out, 8);

        self.put_u16(&mut out, primary_count as u16);
        for (tag, text) in self.primary.iter() {
            self.put_ascii(&mut out, &mut data, data_base, *tag, text);
        }
        if has_exif {
            self.put_u16(&mut out, tags::EXIF_IFD);
            self.put_u16(&mut out, 4);
            self.put_u32(&mut out, 1);
            self.put_u32(&mut out, exif_offset as u32);
        }
        self.put_u32(&mut out, 0);

        if has_exif {
            self.put_u16(&mut out, self.exif.len() as u16);
            for (tag, text) in self.exif.iter() {
                self.put_ascii(&mut out, &mut data, data_base, *tag, text);
            }
            self.put_u32(&mut out, 0);
        }

        out.extend(data);
        out
    }
}

pub fn flat(width: u32, height: u32, value: u16) -> Vec<u16> {
    vec![value; (width * height) as usize]
}

/// Write a 16-bit grayscale TIFF, optionally with a
/// baseline `DateTime` tag.
pub fn write_tiff(
    path: &Path,
    width: u32,
    height: u32,
    data: &[u16],
    date_time: Option<&str>,
) -> Result<()> {
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
    let mut image = encoder.new_image::<colortype::Gray16>(width, height)?;
    if let Some(text) = date_time {
        image.encoder().write_tag(Tag::DateTime, text)?;
    }
    image.write_data(data)?;
    Ok(())
}

/// Write a small 8-bit JPEG carrying the given EXIF block.
pub fn write_jpeg_with_exif(path: &Path, exif: Vec<u8>) -> Result<()> {
    let mut encoded = vec![];
    DynamicImage::ImageLuma8(GrayImage::new(8, 8))
        .write_to(&mut encoded, ImageOutputFormat::Jpeg(90))?;

    let mut jpeg = Jpeg::from_bytes(encoded.into())?;
    jpeg.set_exif(Some(exif.into()));
    let mut out = vec![];
    jpeg.encoder().write_to(&mut out)?;
    fs::write(path, out)?;
    Ok(())
}

/// Write a 16-bit grayscale PNG carrying the given EXIF
/// block in an `eXIf` chunk.
pub fn write_png_with_exif(
    path: &Path,
    width: u32,
    height: u32,
    data: &[u16],
    exif: Vec<u8>,
) -> Result<()> {
    let buffer = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(width, height, data.to_vec())
        .expect("buffer matches dimensions");
    let mut encoded = vec![];
    DynamicImage::ImageLuma16(buffer).write_to(&mut encoded, ImageOutputFormat::Png)?;

    let mut png = Png::from_bytes(encoded.into())?;
    png.set_exif(Some(exif.into()));
    let mut out = vec![];
    png.encoder().write_to(&mut out)?;
    fs::write(path, out)?;
    Ok(())
}
