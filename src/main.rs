use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;
use osm_pbf_stream::{Decoder, Element};
use tracing::Level;

#[derive(clap::Parser)]
struct ClArgs {
    /// Input .osm.pbf file
    #[arg()]
    input: PathBuf,

    /// Decode worker threads (0 = one per CPU core)
    #[arg(short, long, default_value_t = 0)]
    workers: usize,

    /// Verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbosity: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClArgs::parse();

    let level = match args.verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let workers = if args.workers == 0 {
        std::thread::available_parallelism().map_or(1, |n| n.get())
    } else {
        args.workers
    };

    let file = BufReader::new(File::open(&args.input)?);
    let mut decoder = Decoder::new(file);
    decoder.start(workers)?;

    let (mut nodes, mut ways, mut relations) = (0u64, 0u64, 0u64);
    for entity in &mut decoder {
        match entity?.0 {
            Element::Node(_) => nodes += 1,
            Element::Way(_) => ways += 1,
            Element::Relation(_) => relations += 1,
        }
    }

    println!("{}: {nodes} nodes, {ways} ways, {relations} relations", args.input.display());
    Ok(())
}
