use std::path::PathBuf;

use anyhow::Result;
use clap::value_t_or_exit;
use thermic::{arg, args_parser, cli::init_logging, opt, output::OutputFormat, TimeWindow};

pub struct Args {
    pub folder: PathBuf,
    pub window: TimeWindow,
    pub format: OutputFormat,
    pub output_dir: Option<PathBuf>,
    pub map: Option<PathBuf>,
    pub list: bool,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("thermic-vignetting")
            .about("Average a calibration sequence into a vignetting correction image.")
            .arg(
                opt!("start")
                    .short("s")
                    .help("Start of the time window (HH:MM:SS after the first image)"),
            )
            .arg(
                opt!("end")
                    .short("e")
                    .requires("start")
                    .help("End of the time window, inclusive (HH:MM:SS; needs --start)"),
            )
            .arg(
                opt!("format")
                    .short("f")
                    .default_value("tif")
                    .possible_values(&["tif", "tiff", "png"])
                    .help("Format of the averaged image"),
            )
            .arg(
                opt!("output dir")
                    .short("o")
                    .help("Directory for the averaged image (default: the input folder)"),
            )
            .arg(
                opt!("map")
                    .short("m")
                    .help("Also write the temperature deviation from the center pixel as CSV"),
            )
            .arg(
                opt!("list")
                    .short("l")
                    .takes_value(false)
                    .help("Print the timestamped image table as JSON and exit"),
            )
            .arg(
                arg!("folder")
                    .required(true)
                    .help("Folder with the calibration images"),
            )
            .get_matches();

        init_logging(&matches);

        let folder = value_t_or_exit!(matches, "folder", PathBuf);
        let window = TimeWindow::parse(matches.value_of("start"), matches.value_of("end"))?;
        let format = matches
            .value_of("format")
            .unwrap_or("tif")
            .parse::<OutputFormat>()?;
        let output_dir = matches.value_of("output dir").map(PathBuf::from);
        let map = matches.value_of("map").map(PathBuf::from);
        let list = matches.is_present("list");

        Ok(Args {
            folder,
            window,
            format,
            output_dir,
            map,
            list,
        })
    }
}
