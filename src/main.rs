use clap::Parser;
use env_logger::Builder;
use log::{debug, LevelFilter};

use netops::cli::{self, Args};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    let (netops_level, other_level) = match args.verbose {
        0 => (LevelFilter::Info, LevelFilter::Warn),
        1 => (LevelFilter::Debug, LevelFilter::Warn),
        2 => (LevelFilter::Trace, LevelFilter::Warn),
        _ => (LevelFilter::Trace, LevelFilter::Trace),
    };
    Builder::new()
        .filter(Some("netops"), netops_level)
        .filter(None, other_level)
        .init();
    debug!("Logging at levels {}/{}", netops_level, other_level);

    std::process::exit(cli::run(&args).await);
}
