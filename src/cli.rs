//! Helpers shared by the accompanying binaries: argument
//! parser macros, logging setup and progress bars.
//!
//! APIs here shouldn't be considered stable / used as a
//! library.

pub use clap::{App, Arg};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
pub use inflector::Inflector;

#[macro_export]
macro_rules! args_parser {
    ($name:expr) => {{
        $crate::cli::App::new($name)
            .version(clap::crate_version!())
            .arg(
                $crate::opt!("verbose")
                    .short("v")
                    .multiple(true)
                    .takes_value(false)
                    .help("Log more detail (repeat for trace output)"),
            )
            .arg(
                $crate::opt!("quiet")
                    .short("q")
                    .takes_value(false)
                    .conflicts_with("verbose")
                    .help("Only log warnings and errors"),
            )
    }};
}

#[macro_export]
macro_rules! arg {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name).value_name(&$name.to_screaming_snake_case())
    }};
}

#[macro_export]
macro_rules! opt {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name)
            .long(&$name.to_kebab_case())
            .value_name(&$name.to_screaming_snake_case())
    }};
}

/// Default log filter for the `-v`/`-q` flags added by
/// [`args_parser!`].
pub fn log_filter(verbose: u64, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    }
}

/// Initialise `env_logger`; `RUST_LOG` overrides the
/// command-line level.
pub fn init_logging(matches: &clap::ArgMatches) {
    let filter = log_filter(matches.occurrences_of("verbose"), matches.is_present("quiet"));
    env_logger::Builder::from_env(Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .init();
}

pub fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {wide_bar:cyan/blue} {pos:>7}/{len:7} {msg}"),
    );
    bar
}
