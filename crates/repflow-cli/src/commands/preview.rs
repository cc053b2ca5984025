use std::path::PathBuf;

use clap::Args;
use repflow_core::routine::sequence::{generate, total_duration_secs};
use repflow_core::{Measurement, Routine};

use super::format_secs;

#[derive(Args)]
pub struct PreviewArgs {
    /// Routine file (TOML)
    routine: PathBuf,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: PreviewArgs) -> Result<(), Box<dyn std::error::Error>> {
    let routine = Routine::load(&args.routine)?;
    routine.validate()?;
    let sequence = generate(&routine);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&sequence)?);
        return Ok(());
    }

    println!("{}", routine.name);
    for entry in &sequence {
        let block = &routine.blocks[entry.block_index];
        let amount = match entry.activity.measurement {
            Measurement::Time { duration_secs } => format_secs(u64::from(duration_secs)),
            Measurement::Reps { count } => format!("x{count}"),
        };
        let name = if entry.is_inter_repetition_rest {
            "(rest)"
        } else {
            entry.activity.name.as_str()
        };
        println!(
            "{:>3}  {:<16} {}/{}  {:<24} {}",
            entry.sequence_index,
            block.name,
            entry.block_repetition_number,
            block.repetitions,
            name,
            amount,
        );
    }
    println!(
        "{} activities, {} timed",
        routine.total_positions(),
        format_secs(total_duration_secs(&sequence)),
    );
    Ok(())
}
