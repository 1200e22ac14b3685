//! # Note Matching & Tuning Decision Module
//!
//! Turns a smoothed frequency into a [`TuningReading`]: which note is being
//! tuned, how far off it is, and which way to turn the peg.
//!
//! ## Features
//! - Manual mode against a caller-selected target note
//! - Auto-detect mode matching the nearest note of the current tuning
//! - Deterministic tie-breaking (earlier list entry wins)
//! - A three-way directive derived from a fixed in-tune window

use crate::catalog::Note;
use crate::{Directive, TuningReading};

/// Absolute deviation (Hz) below which a note counts as in tune.
pub const IN_TUNE_WINDOW_HZ: f32 = 1.5;

/// What the sensed frequency is compared against.
#[derive(Debug, Clone)]
pub enum TuningTarget {
    /// A caller-selected note, or `None` when no target has been chosen
    /// yet (the reading stays [`Directive::Unknown`]).
    Manual(Option<Note>),
    /// The candidate notes of the current tuning; the nearest one becomes
    /// the reference.
    AutoDetect(Vec<Note>),
}

/// Computes the reading for one smoothed frequency against a target.
///
/// In auto-detect mode the nearest candidate (by absolute frequency
/// distance) is selected and reported as the detected note. With no usable
/// reference (manual mode without a note, or an empty candidate list) the
/// frequency is still reported but the directive stays `Unknown`.
pub fn decide(smoothed: f32, target: &TuningTarget) -> TuningReading {
    match target {
        TuningTarget::Manual(Some(note)) => against_reference(smoothed, note.frequency, None),
        TuningTarget::Manual(None) => TuningReading {
            frequency: Some(smoothed),
            detected_note: None,
            deviation: None,
            directive: Directive::Unknown,
        },
        TuningTarget::AutoDetect(notes) => match nearest_note(smoothed, notes) {
            Some(note) => against_reference(smoothed, note.frequency, Some(note.clone())),
            None => TuningReading {
                frequency: Some(smoothed),
                detected_note: None,
                deviation: None,
                directive: Directive::Unknown,
            },
        },
    }
}

fn against_reference(smoothed: f32, reference: f32, detected_note: Option<Note>) -> TuningReading {
    let deviation = smoothed - reference;
    TuningReading {
        frequency: Some(smoothed),
        detected_note,
        deviation: Some(deviation),
        directive: directive_for(deviation),
    }
}

/// Finds the candidate note closest to `frequency`.
///
/// Ties resolve to the earlier entry in list order, so the fold below keeps
/// the current best unless a candidate is strictly closer. (`Iterator::min_by`
/// returns the *last* of equal minima and would flip that rule.)
fn nearest_note<'a>(frequency: f32, notes: &'a [Note]) -> Option<&'a Note> {
    let mut best: Option<&Note> = None;
    for note in notes {
        match best {
            Some(current) if (note.frequency - frequency).abs() >= (current.frequency - frequency).abs() => {}
            _ => best = Some(note),
        }
    }
    best
}

fn directive_for(deviation: f32) -> Directive {
    if deviation.abs() < IN_TUNE_WINDOW_HZ {
        Directive::InTune
    } else if deviation > 0.0 {
        Directive::TooHigh
    } else {
        Directive::TooLow
    }
}

#[cfg(test)]
mod test_decision {
    use super::*;

    fn notes(frequencies: &[f32]) -> Vec<Note> {
        frequencies
            .iter()
            .enumerate()
            .map(|(i, &frequency)| Note::new(&format!("N{i}"), frequency))
            .collect()
    }

    #[test]
    fn in_tune_window_is_exclusive_at_the_edge() {
        let target = TuningTarget::Manual(Some(Note::new("A4", 440.0)));
        assert_eq!(decide(441.49, &target).directive, Directive::InTune);
        assert_eq!(decide(441.5, &target).directive, Directive::TooHigh);
        assert_eq!(decide(438.51, &target).directive, Directive::InTune);
        assert_eq!(decide(438.5, &target).directive, Directive::TooLow);
    }

    #[test]
    fn manual_deviation_is_signed() {
        let target = TuningTarget::Manual(Some(Note::new("E2", 82.41)));
        let reading = decide(80.5, &target);
        assert_eq!(reading.frequency, Some(80.5));
        let deviation = reading.deviation.unwrap();
        assert!((deviation - (80.5 - 82.41)).abs() < 1e-4);
        assert_eq!(reading.directive, Directive::TooLow);
        // Manual mode never reports a detected note.
        assert!(reading.detected_note.is_none());
    }

    #[test]
    fn manual_without_target_stays_unknown() {
        let reading = decide(440.0, &TuningTarget::Manual(None));
        assert_eq!(reading.directive, Directive::Unknown);
        assert_eq!(reading.deviation, None);
        assert_eq!(reading.frequency, Some(440.0));
    }

    #[test]
    fn auto_detect_selects_minimal_distance() {
        let target = TuningTarget::AutoDetect(notes(&[440.0, 220.0, 330.0]));
        let reading = decide(325.0, &target);
        assert_eq!(reading.detected_note.unwrap().frequency, 330.0);
    }

    #[test]
    fn auto_detect_tie_resolves_to_earlier_entry() {
        // 325 is equidistant from 320 and 330.
        let target = TuningTarget::AutoDetect(notes(&[320.0, 330.0]));
        let reading = decide(325.0, &target);
        assert_eq!(reading.detected_note.unwrap().label, "N0");
    }

    #[test]
    fn auto_detect_with_empty_candidates_stays_unknown() {
        let target = TuningTarget::AutoDetect(Vec::new());
        let reading = decide(440.0, &target);
        assert_eq!(reading.directive, Directive::Unknown);
        assert!(reading.detected_note.is_none());
        assert!(reading.deviation.is_none());
    }

    #[test]
    fn ukulele_string_near_g4_reads_in_tune() {
        let target = TuningTarget::AutoDetect(vec![
            Note::new("A4", 440.0),
            Note::new("E4", 329.63),
            Note::new("C4", 261.63),
            Note::new("G4", 392.0),
        ]);
        let reading = decide(391.0, &target);
        assert_eq!(reading.detected_note.unwrap().label, "G4");
        assert!((reading.deviation.unwrap() + 1.0).abs() < 1e-4);
        assert_eq!(reading.directive, Directive::InTune);
    }
}
