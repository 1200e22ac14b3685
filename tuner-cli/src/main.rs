//! # Tuner CLI
//!
//! Terminal front end for the tuner core: listens on the microphone and
//! renders live readings, plays reference tones, and lists the built-in
//! instrument tunings. Preferences (instrument, auto-detect, manual note)
//! persist across runs in a small settings file.

mod display;
mod prefs;
mod update_check;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tuner_core::session::AcquisitionSession;
use tuner_core::synth::{TONE_DURATION_SECS, ToneSynth};
use tuner_core::{TuningTarget, catalog};
use update_check::UpdateChecker;

#[derive(Parser)]
#[command(name = "tuner", about = "Microphone instrument tuner", version)]
struct Cli {
    /// Preferences file (defaults to tuner_settings.json in the working
    /// directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen on the microphone and show live tuning readings (default)
    Listen(ListenArgs),
    /// Play the reference tone for a note of the current instrument
    Play(PlayArgs),
    /// List the built-in instruments and their tunings
    Instruments,
}

#[derive(Args, Default)]
struct ListenArgs {
    /// Instrument key (see `tuner instruments`)
    #[arg(long)]
    instrument: Option<String>,

    /// Match the nearest string automatically
    #[arg(long, conflicts_with = "note")]
    auto: bool,

    /// Tune against this specific note label instead of auto-detecting
    #[arg(long)]
    note: Option<String>,

    /// Stop after this many seconds instead of running until interrupted
    #[arg(long)]
    duration: Option<u64>,

    /// Version-marker URL to poll for update notifications
    #[arg(long)]
    version_url: Option<String>,
}

#[derive(Args)]
struct PlayArgs {
    /// Note label to play (e.g. E2, A4)
    note: String,

    /// Instrument key; defaults to the saved preference
    #[arg(long)]
    instrument: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let settings_path = cli.settings.unwrap_or_else(prefs::default_path);

    match cli.command.unwrap_or(Command::Listen(ListenArgs::default())) {
        Command::Listen(args) => listen(&settings_path, args),
        Command::Play(args) => play(&settings_path, args),
        Command::Instruments => {
            instruments();
            Ok(())
        }
    }
}

fn listen(settings_path: &Path, args: ListenArgs) -> Result<()> {
    let mut preferences = prefs::load(settings_path);

    if let Some(instrument) = args.instrument {
        if catalog::get(&instrument).is_none() {
            bail!("unknown instrument `{instrument}`; run `tuner instruments`");
        }
        if instrument != preferences.tuning {
            preferences.selected_note = None;
        }
        preferences.tuning = instrument;
    }
    let tuning = catalog::get(&preferences.tuning)
        .context("selected instrument missing from catalog")?;

    if args.auto {
        preferences.auto_detect = true;
        preferences.selected_note = None;
    }
    if let Some(label) = &args.note {
        let note = tuning
            .note(label)
            .ok_or_else(|| anyhow!("no note `{label}` in {}", tuning.name))?;
        preferences.auto_detect = false;
        preferences.selected_note = Some(note.clone());
    }
    // Manual mode with nothing picked targets the first string, and that
    // default persists like an explicit choice.
    if !preferences.auto_detect && preferences.selected_note.is_none() {
        preferences.selected_note = tuning.notes.first().cloned();
    }
    if let Err(e) = prefs::save(settings_path, &preferences) {
        log::warn!("could not save preferences: {e}");
    }

    let target = if preferences.auto_detect {
        println!("{} - auto-detect", tuning.name);
        TuningTarget::AutoDetect(tuning.notes.clone())
    } else {
        let label = preferences
            .selected_note
            .as_ref()
            .map(|note| note.label.clone())
            .unwrap_or_default();
        println!("{} - target {label}", tuning.name);
        TuningTarget::Manual(preferences.selected_note.clone())
    };

    let mut update_checker = args.version_url.map(UpdateChecker::spawn);

    let (mut session, readings) =
        AcquisitionSession::start(target).map_err(|e| anyhow!("listening unavailable: {e}"))?;

    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    display::show(&tuner_core::TuningReading::default());
    let outcome = loop {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                break Ok(());
            }
        }
        if let Some((_, updates)) = &update_checker {
            if let Ok(update) = updates.try_recv() {
                println!("\nUpdate available: build {}", update.build_id);
            }
        }

        match readings.recv_timeout(Duration::from_millis(250)) {
            Ok(reading) => display::show(&reading),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => match session.fault() {
                Some(fault) => break Err(anyhow!("listening unavailable: {fault}")),
                None => break Ok(()),
            },
        }
    };
    println!();

    session.close();
    if let Some((checker, _)) = update_checker.as_mut() {
        checker.stop();
    }
    outcome
}

fn play(settings_path: &Path, args: PlayArgs) -> Result<()> {
    let preferences = prefs::load(settings_path);
    let key = args.instrument.unwrap_or(preferences.tuning);
    let tuning = catalog::get(&key).ok_or_else(|| anyhow!("unknown instrument `{key}`"))?;
    let note = tuning
        .note(&args.note)
        .ok_or_else(|| anyhow!("no note `{}` in {}", args.note, tuning.name))?;

    println!("{} - {} at {:.2} Hz", tuning.name, note.label, note.frequency);

    let mut synth = ToneSynth::new();
    synth.play(note.frequency, tuning.timbre)?;
    // Hold the output stream open for the full tone before releasing it.
    std::thread::sleep(Duration::from_secs_f32(TONE_DURATION_SECS + 0.1));
    synth.close();
    Ok(())
}

fn instruments() {
    for key in catalog::keys() {
        let Some(tuning) = catalog::get(key) else { continue };
        let notes = tuning
            .notes
            .iter()
            .map(|note| format!("{} ({:.2} Hz)", note.label, note.frequency))
            .collect::<Vec<_>>()
            .join("  ");
        println!("{key:<18} {}", tuning.name);
        println!("{:<18} {notes}", "");
    }
}
