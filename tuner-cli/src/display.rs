//! # Terminal Display
//!
//! Renders readings as a single rewritten line: detected note, smoothed
//! frequency, a needle meter, and the tuning directive.

use std::io::{self, Write};
use tuner_core::{Directive, TuningReading};

const METER_CELLS: usize = 21;

/// Rewrites the current terminal line with the latest reading.
pub fn show(reading: &TuningReading) {
    print!("\r{}", render_line(reading));
    let _ = io::stdout().flush();
}

/// Formats one reading as a fixed-width status line.
pub fn render_line(reading: &TuningReading) -> String {
    let label = reading
        .detected_note
        .as_ref()
        .map(|note| note.label.as_str())
        .unwrap_or("--");
    let frequency = match reading.frequency {
        Some(freq) => format!("{freq:7.1} Hz"),
        None => "   --.- Hz".to_string(),
    };
    let meter = match reading.deviation {
        Some(deviation) => meter(deviation),
        None => idle_meter(),
    };
    format!(
        "{label:>6} {frequency} [{meter}] {:<10}",
        directive_word(reading.directive)
    )
}

/// Builds the needle meter. The deviation is scaled and clamped the same
/// way the needle widget positions itself: ±5 Hz spans the full meter.
fn meter(deviation: f32) -> String {
    let clamped = (deviation * 10.0).clamp(-50.0, 50.0);
    let marker = (((clamped + 50.0) / 100.0) * (METER_CELLS - 1) as f32).round() as usize;
    (0..METER_CELLS)
        .map(|cell| {
            if cell == marker {
                '*'
            } else if cell == METER_CELLS / 2 {
                '|'
            } else {
                '-'
            }
        })
        .collect()
}

fn idle_meter() -> String {
    (0..METER_CELLS)
        .map(|cell| if cell == METER_CELLS / 2 { '|' } else { '-' })
        .collect()
}

fn directive_word(directive: Directive) -> &'static str {
    match directive {
        Directive::InTune => "Perfect",
        Directive::TooLow => "Tune Up",
        Directive::TooHigh => "Tune Down",
        Directive::Unknown => "Listening",
    }
}
