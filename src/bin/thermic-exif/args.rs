use std::path::PathBuf;

use anyhow::Result;
use thermic::{arg, args_parser, cli::init_logging, opt};

pub struct Args {
    pub paths: Vec<PathBuf>,
    pub json: bool,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("thermic-exif")
            .about("Print the EXIF / TIFF tags and capture time of images.")
            .arg(
                opt!("json")
                    .short("j")
                    .takes_value(false)
                    .help("Print one JSON object per image instead of text"),
            )
            .arg(
                arg!("paths")
                    .required(true)
                    .multiple(true)
                    .help("Image paths (jpg, png, tif)"),
            )
            .get_matches();

        init_logging(&matches);

        let paths = matches
            .values_of("paths")
            .into_iter()
            .flatten()
            .map(PathBuf::from)
            .collect();
        let json = matches.is_present("json");

        Ok(Args { paths, json })
    }
}
