//! Writing the averaged 16-bit image.
use std::{
    fs::File,
    io::{BufWriter, Seek, Write},
    path::Path,
    str::FromStr,
};

use anyhow::{anyhow, bail, Context, Error, Result};
use byteordered::ByteOrdered;
use image::{tiff::TiffEncoder, ColorType};
use ndarray::Array2;
use serde_derive::*;
use zerocopy::AsBytes;

use crate::window::TimeWindow;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Tiff,
    Png,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Tiff
    }
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Tiff => "tif",
            OutputFormat::Png => "png",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "tif" | "tiff" => OutputFormat::Tiff,
            "png" => OutputFormat::Png,
            other => bail!("unsupported output format {:?}: expected tif or png", other),
        })
    }
}

/// File name prefix of averaged images.
pub const OUTPUT_PREFIX: &str = "vignetting_";

/// `vignetting_<window suffix>.<ext>`
pub fn output_file_name(window: &TimeWindow, format: OutputFormat) -> String {
    format!("{}{}.{}", OUTPUT_PREFIX, window.suffix(), format.extension())
}

pub fn write_gray16(image: &Array2<u16>, path: &Path, format: OutputFormat) -> Result<()> {
    let writer = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    let written = match format {
        OutputFormat::Tiff => write_tiff(image, writer),
        OutputFormat::Png => write_png(image, writer),
    };
    written.with_context(|| format!("writing {}", path.display()))
}

fn write_tiff<W: Write + Seek>(image: &Array2<u16>, writer: W) -> Result<()> {
    let (ht, wid) = image.dim();
    let pixels = image.as_standard_layout();
    let pixels = pixels
        .as_slice()
        .ok_or_else(|| anyhow!("image is not contiguous"))?;

    TiffEncoder::new(writer).encode(pixels.as_bytes(), wid as u32, ht as u32, ColorType::L16)?;
    Ok(())
}

fn write_png<W: Write>(image: &Array2<u16>, writer: W) -> Result<()> {
    let mut png_writer = {
        let (ht, wid) = image.dim();
        let mut encoder = png::Encoder::new(writer, wid as u32, ht as u32);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::Sixteen);
        encoder.write_header()?
    };
    let mut png_streamer = ByteOrdered::be(png_writer.stream_writer());

    for &val in image.iter() {
        png_streamer.write_u16(val)?;
    }
    png_streamer.into_inner().finish()?;
    Ok(())
}
