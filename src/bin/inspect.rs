//! inspect: load one recording and print its channels, rate, duration and
//! event counts, after channel normalisation.
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use bciprep::{load_recording, split, ChannelNormalizer, ExportReader, Split};

#[derive(Parser, Debug)]
#[command(name = "inspect")]
struct Args {
    /// Recording (or its safetensors export).
    path: PathBuf,

    /// Montage attached during normalisation.
    #[arg(long, default_value = "standard_1020")]
    montage: String,

    /// Print the raw channel names, skipping normalisation.
    #[arg(long)]
    raw_names: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let split = Split::from_flag(split::is_eval(&args.path));
    let mut rec = load_recording(&ExportReader, &args.path, split)?;
    if !args.raw_names {
        ChannelNormalizer::bci_iv_2a(&args.montage)?.apply(&mut rec.raw)?;
    }
    let raw = &rec.raw;

    println!("{} ({split})", args.path.display());
    println!(
        "  {} ch × {} samples @ {} Hz  ({:.1} s)",
        raw.n_channels(),
        raw.n_times(),
        raw.sfreq,
        raw.duration_secs()
    );
    println!("  montage: {}", raw.montage.as_deref().unwrap_or("-"));
    for ch in &raw.channels {
        match ch.pos {
            Some([x, y, z]) => println!(
                "    {:<12} {:<4} ({:+.3}, {:+.3}, {:+.3})",
                ch.name, ch.kind, x, y, z
            ),
            None => println!("    {:<12} {:<4}", ch.name, ch.kind),
        }
    }

    println!("  {} annotation(s), {} event(s)", raw.annotations.len(), rec.events.len());
    for (label, code) in &rec.event_id {
        let n = rec.events.iter().filter(|e| e.code == *code).count();
        println!("    {label:>6} → {code:<3} × {n}");
    }
    Ok(())
}
