mod args;

use anyhow::Result;
use log::info;
use thermic::{
    catalog::{scan_folder, Catalog},
    cli::progress_bar,
    pipeline::{self, AveragerConfig},
};

use args::Args;

fn main() -> Result<()> {
    let Args {
        folder,
        window,
        format,
        output_dir,
        map,
        list,
    } = Args::from_cmd_line()?;

    if list {
        let paths = scan_folder(&folder)?;
        let bar = progress_bar(paths.len());
        let (catalog, skipped) = Catalog::read(paths, &bar);
        bar.finish_and_clear();
        info!(
            "{} images, {} without a capture time",
            catalog.len(),
            skipped.len()
        );
        serde_json::to_writer_pretty(std::io::stdout().lock(), &catalog)?;
        println!();
        return Ok(());
    }

    let config = AveragerConfig {
        window,
        format,
        output_dir,
        map_csv: map,
        ..AveragerConfig::new(folder)
    };

    let bar = progress_bar(0);
    let report = pipeline::run(&config, &bar)?;
    bar.finish_and_clear();

    if !report.skipped.is_empty() {
        info!("skipped {} images", report.skipped.len());
    }
    info!(
        "averaged {} of {} images ({}) into {}",
        report.averaged,
        report.scanned,
        report.window,
        report.output.display()
    );

    serde_json::to_writer(std::io::stdout().lock(), &report)?;
    println!();
    Ok(())
}
