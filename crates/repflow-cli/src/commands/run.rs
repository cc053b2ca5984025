//! Interactive workout run in the terminal.
//!
//! Commands are read line by line from stdin. The terminal also stands in
//! for the two platform services: `say <text>` plays the speech recognizer
//! and a status line on stderr plays the ongoing-workout notification.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use clap::Args;
use repflow_core::workout::voice::SessionId;
use repflow_core::{
    Config, Database, Event, Measurement, MeasurementKind, NotificationPayload, NotificationSurface,
    NotificationSync, NotifyError, Routine, SessionCommand, SessionOutcome, SpeechRecognizer,
    SystemClock, VoiceController, VoiceError, VoiceMessage, WorkoutEngine, WorkoutSession,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use super::format_secs;

const HELP: &str = "commands: p pause/resume, c complete, s skip, bg, fg, say <text>, q quit";

#[derive(Args)]
pub struct RunArgs {
    /// Routine file (TOML)
    routine: PathBuf,
    /// Start at this entry of `repflow preview`
    #[arg(long, default_value = "0")]
    start: usize,
    /// Complete reps-based activities manually only
    #[arg(long)]
    no_voice: bool,
}

type LiveListener = Arc<Mutex<Option<(SessionId, mpsc::UnboundedSender<VoiceMessage>)>>>;

/// Speech recognizer fed from typed `say` lines.
#[derive(Default)]
struct TerminalSpeech {
    live: LiveListener,
}

impl SpeechRecognizer for TerminalSpeech {
    fn start_listening(
        &mut self,
        _locale: &str,
        session: SessionId,
        results: mpsc::UnboundedSender<VoiceMessage>,
    ) -> Result<(), VoiceError> {
        let mut live = self.live.lock().map_err(|e| VoiceError::Platform(e.to_string()))?;
        *live = Some((session, results));
        Ok(())
    }

    fn stop_listening(&mut self) {
        if let Ok(mut live) = self.live.lock() {
            *live = None;
        }
    }
}

/// Single status line on stderr, redrawn in place.
#[derive(Default)]
struct TerminalSurface {
    last: String,
}

impl TerminalSurface {
    fn draw(&mut self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let amount = match payload.measurement {
            MeasurementKind::Time => format_secs(u64::from(payload.remaining_or_reps)),
            MeasurementKind::Reps => format!("x{}", payload.remaining_or_reps),
        };
        let line = format!(
            "[{:>3.0}%] {} {}{}{}",
            payload.progress * 100.0,
            payload.activity_name,
            amount,
            if payload.draining { " (postponed)" } else { "" },
            if payload.paused { " PAUSED" } else { "" },
        );
        if line == self.last {
            return Ok(());
        }
        let mut err = std::io::stderr().lock();
        write!(err, "\r\x1b[2K{line}")
            .and_then(|()| err.flush())
            .map_err(|e| NotifyError::UpdateFailed(e.to_string()))?;
        self.last = line;
        Ok(())
    }
}

impl NotificationSurface for TerminalSurface {
    fn start(&mut self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        self.draw(payload)
    }

    fn update(&mut self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        self.draw(payload)
    }

    fn stop(&mut self) -> Result<(), NotifyError> {
        self.last.clear();
        eprint!("\r\x1b[2K");
        Ok(())
    }
}

enum Input {
    Command(SessionCommand),
    Say(String),
    Help,
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if let Some(text) = line.strip_prefix("say ") {
        return Some(Input::Say(text.to_string()));
    }
    let cmd = match line {
        "" => return None,
        "p" => SessionCommand::TogglePause,
        "c" => SessionCommand::MarkComplete,
        "s" => SessionCommand::Skip,
        "d" => SessionCommand::Defer,
        "bg" => SessionCommand::Background,
        "fg" => SessionCommand::Foreground,
        "q" => SessionCommand::Stop,
        _ => return Some(Input::Help),
    };
    Some(Input::Command(cmd))
}

/// One output line per event. Postponing is only advertised where it is offered.
fn describe(event: &Event) -> Option<String> {
    let line = match event {
        Event::WorkoutStarted {
            routine_name,
            total_activities,
            ..
        } => format!("{routine_name}: {total_activities} activities"),
        Event::ActivityStarted {
            activity_name,
            measurement,
            repetition,
            draining,
            can_defer,
            ..
        } => {
            let amount = match measurement {
                Measurement::Time { duration_secs } => format_secs(u64::from(*duration_secs)),
                Measurement::Reps { count } => format!("x{count}"),
            };
            let note = if *draining { ", postponed" } else { "" };
            let hint = if *can_defer { "  [d postpone]" } else { "" };
            format!("-> {activity_name} {amount} (round {repetition}{note}){hint}")
        }
        Event::ActivityFinished {
            activity_name,
            outcome,
            ..
        } => format!("   {activity_name}: {}", outcome.as_str()),
        Event::DrainStarted { queued, .. } => format!("{queued} postponed left"),
        Event::WorkoutPaused { .. } => "paused".to_string(),
        Event::WorkoutResumed { .. } => "resumed".to_string(),
        Event::WorkoutCompleted {
            completed_activities,
            total_activities,
            ..
        } => format!("finished {completed_activities}/{total_activities}"),
        Event::WorkoutAbandoned { .. } => "abandoned".to_string(),
        Event::StateSnapshot { .. } => return None,
    };
    Some(line)
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let routine = Routine::load(&args.routine)?;
    let engine = WorkoutEngine::start_at(routine, args.start, Arc::new(SystemClock))?;
    let deferrable = Arc::new(AtomicBool::new(engine.can_defer()));
    let history = Database::open()?;

    let live = LiveListener::default();
    let voice = if config.voice.enabled && !args.no_voice {
        let speech = TerminalSpeech { live: live.clone() };
        VoiceController::new(Box::new(speech), &config.voice.locale, config.keyword_matcher())
    } else {
        VoiceController::disabled()
    };
    let notifications = if config.notifications.enabled {
        NotificationSync::new(TerminalSurface::default())
    } else {
        NotificationSync::disabled(TerminalSurface::default())
    };

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async move {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let session = WorkoutSession::new(engine, voice, notifications, history)
            .with_tick_interval(config.tick_interval())
            .with_events(event_tx);

        let offered = deferrable.clone();
        let printer = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                match &event {
                    Event::ActivityStarted { can_defer, .. } => {
                        offered.store(*can_defer, Ordering::Relaxed)
                    }
                    Event::WorkoutCompleted { .. } => offered.store(false, Ordering::Relaxed),
                    _ => {}
                }
                if let Some(line) = describe(&event) {
                    println!("\r{line}");
                }
            }
        });
        let session = tokio::spawn(session.run(cmd_rx));

        eprintln!("{HELP}");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                match parse_input(&line) {
                    Some(Input::Command(SessionCommand::Defer))
                        if !deferrable.load(Ordering::Relaxed) =>
                    {
                        eprintln!("\r(nothing comes after this activity, it can't be postponed)");
                    }
                    Some(Input::Command(cmd)) => {
                        if cmd_tx.send(cmd).await.is_err() {
                            break;
                        }
                    }
                    Some(Input::Say(text)) => {
                        let listener = live.lock().ok().and_then(|l| l.clone());
                        match listener {
                            Some((session, tx)) => {
                                debug!(session, "transcript typed");
                                let _ = tx.send(VoiceMessage::Transcript { session, text });
                            }
                            None => eprintln!("\r(not listening)"),
                        }
                    }
                    Some(Input::Help) => eprintln!("\r{HELP}"),
                    None => {}
                }
            }
        });

        let outcome = session.await?;
        let _ = printer.await;
        outcome.map_err(Box::<dyn std::error::Error>::from)
    });
    // The stdin reader may still be blocked on a read.
    rt.shutdown_background();

    match outcome? {
        SessionOutcome::Completed {
            session,
            history_id,
        } => println!(
            "saved workout #{history_id}: {}/{} completed, {} active",
            session.completed_activities,
            session.total_activities,
            format_secs(session.active_secs()),
        ),
        SessionOutcome::Abandoned => println!("nothing recorded"),
    }
    Ok(())
}
