use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use log::{error, info};

use bciprep::{
    ExportReader, NormalizeStrategy, Pipeline, Precision, PreprocConfig, SaveConfig, SaveFormat,
    DEFAULT_PATTERN,
};

#[derive(Parser, Debug)]
#[command(name = "prep", about = "Prepare BCI IV-2a recordings into train/eval epoch datasets")]
struct Args {
    /// Directory holding the recordings (and their safetensors exports)
    #[arg(long, default_value = "data/BCICIV_2a_gdf")]
    data_root: PathBuf,

    /// Glob pattern relative to the data root
    #[arg(long, default_value = DEFAULT_PATTERN)]
    pattern: String,

    /// JSON file overriding PreprocConfig defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write epoched train/eval datasets here; without it only load + normalise
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Output container
    #[arg(long, value_enum, default_value_t = FormatArg::Npz)]
    format: FormatArg,

    /// Stored signal precision
    #[arg(long, value_enum, default_value_t = DtypeArg::Float32)]
    dtype: DtypeArg,

    /// Normalisation tag recorded for the consumer
    #[arg(long, value_enum, default_value_t = NormalizeArg::PerChannelZ)]
    normalize: NormalizeArg,

    /// Store one-hot labels instead of event codes
    #[arg(long)]
    one_hot: bool,

    /// Abort the whole batch on the first file that fails to load
    #[arg(long)]
    strict: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Npz,
    Safetensors,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DtypeArg {
    Float32,
    Float64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum NormalizeArg {
    None,
    PerChannelZ,
    PerEpochZ,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    let cfg = match &args.config {
        Some(path) => PreprocConfig::from_json_file(path)?,
        None => PreprocConfig::default(),
    };

    let dataset = Pipeline::new(cfg, &args.data_root)
        .pattern(&args.pattern)
        .strict(args.strict)
        .run(&ExportReader)?;

    println!(
        "{} file(s): train={} eval={}",
        dataset.files.len(),
        dataset.labels.counts.train,
        dataset.labels.counts.eval
    );
    println!("loaded {} recording(s)", dataset.recordings.len());
    for (path, err) in &dataset.failures {
        error!("{}: {err}", path.display());
    }

    if let Some(out_dir) = args.out_dir {
        let save = SaveConfig {
            out_dir,
            format: match args.format {
                FormatArg::Npz => SaveFormat::Npz,
                FormatArg::Safetensors => SaveFormat::Safetensors,
            },
            normalize: match args.normalize {
                NormalizeArg::None => NormalizeStrategy::None,
                NormalizeArg::PerChannelZ => NormalizeStrategy::PerChannelZ,
                NormalizeArg::PerEpochZ => NormalizeStrategy::PerEpochZ,
            },
            dtype: match args.dtype {
                DtypeArg::Float32 => Precision::Float32,
                DtypeArg::Float64 => Precision::Float64,
            },
            one_hot: args.one_hot,
        };
        for path in dataset.export(&save)? {
            info!("written {}", path.display());
            println!("Written → {}", path.display());
        }
    }

    if !dataset.failures.is_empty() {
        bail!(
            "{} of {} file(s) failed to load",
            dataset.failures.len(),
            dataset.files.len()
        );
    }
    Ok(())
}
