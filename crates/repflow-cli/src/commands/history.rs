use clap::Subcommand;
use repflow_core::storage::Database;

use super::format_secs;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Most recent workouts
    List {
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Per-activity timeline of one workout
    Show {
        /// History id as printed by `list`
        id: i64,
    },
    /// All-time totals
    Stats,
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        HistoryAction::List { limit, json } => {
            let sessions = db.list_sessions(limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
                return Ok(());
            }
            if sessions.is_empty() {
                println!("no workouts recorded yet");
            }
            for s in sessions {
                println!(
                    "{:>4}  {}  {:<24} {}/{} done  {}",
                    s.id,
                    s.completed_at.format("%Y-%m-%d %H:%M"),
                    s.routine_name,
                    s.completed_activities,
                    s.total_activities,
                    format_secs(s.duration_secs),
                );
            }
        }
        HistoryAction::Show { id } => {
            let timeline = db.session_timeline(id)?;
            if timeline.is_empty() {
                return Err(format!("no workout with id {id}").into());
            }
            println!("{}", serde_json::to_string_pretty(&timeline)?);
        }
        HistoryAction::Stats => {
            let stats = db.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
