//! # Tuning Catalog Module
//!
//! This module holds the static tuning tables for every supported
//! instrument. Each tuning maps an instrument key to a display name, a
//! playback timbre, and an ordered list of open-string notes with their
//! equal-temperament frequencies.
//!
//! ## Features
//! - 17 built-in instrument tunings (guitars, basses, bowed and folk strings)
//! - Read-only access; entries are computed once at startup
//! - Timbre tag per instrument for reference-tone playback
//!
//! The catalog is data, not behavior: consumers look entries up and never
//! mutate them.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The instrument key selected when no preference is stored.
pub const DEFAULT_TUNING: &str = "standard";

/// Oscillator shape used when playing a reference tone for an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timbre {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

/// A single target note: a display label and its frequency in Hz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Note label (e.g. "E2", "A4", "G3/G4" for paired courses)
    pub label: String,
    /// Frequency in Hz
    pub frequency: f32,
}

impl Note {
    pub fn new(label: &str, frequency: f32) -> Note {
        Note {
            label: label.to_string(),
            frequency,
        }
    }
}

/// One instrument tuning: display name, playback timbre, and the ordered
/// open-string notes from highest-numbered string to lowest.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Display name (e.g. "Standard Guitar")
    pub name: String,
    /// Oscillator shape for reference-tone playback
    pub timbre: Timbre,
    /// Ordered notes; never empty for a catalog entry
    pub notes: Vec<Note>,
}

impl Tuning {
    fn build(name: &str, timbre: Timbre, notes: &[(&str, f32)]) -> Tuning {
        Tuning {
            name: name.to_string(),
            timbre,
            notes: notes
                .iter()
                .map(|(label, frequency)| Note::new(label, *frequency))
                .collect(),
        }
    }

    /// Looks up a note of this tuning by its label.
    pub fn note(&self, label: &str) -> Option<&Note> {
        self.notes.iter().find(|note| note.label == label)
    }
}

/// Statically computed tuning tables, keyed by instrument identifier.
///
/// Plucked and strummed instruments default to a sine timbre; basses play
/// square, ukuleles triangle, and bowed strings sawtooth.
static TUNINGS: Lazy<BTreeMap<&'static str, Tuning>> = Lazy::new(|| {
    use Timbre::*;

    let mut tunings = BTreeMap::new();
    tunings.insert(
        "standard",
        Tuning::build(
            "Standard Guitar",
            Sine,
            &[
                ("E4", 329.63),
                ("B3", 246.94),
                ("G3", 196.0),
                ("D3", 146.83),
                ("A2", 110.0),
                ("E2", 82.41),
            ],
        ),
    );
    tunings.insert(
        "dropD",
        Tuning::build(
            "Drop D Guitar",
            Sine,
            &[
                ("E4", 329.63),
                ("B3", 246.94),
                ("G3", 196.0),
                ("D3", 146.83),
                ("A2", 110.0),
                ("D2", 73.42),
            ],
        ),
    );
    tunings.insert(
        "halfStepDown",
        Tuning::build(
            "Half Step Down Guitar",
            Sine,
            &[
                ("D#4", 311.13),
                ("A#3", 233.08),
                ("F#3", 185.0),
                ("C#3", 138.59),
                ("G#2", 103.83),
                ("D#2", 77.78),
            ],
        ),
    );
    tunings.insert(
        "dadgad",
        Tuning::build(
            "DADGAD Guitar",
            Sine,
            &[
                ("D4", 293.66),
                ("A3", 220.0),
                ("G3", 196.0),
                ("D3", 146.83),
                ("A2", 110.0),
                ("D2", 73.42),
            ],
        ),
    );
    tunings.insert(
        "sevenString",
        Tuning::build(
            "7-String Guitar",
            Sine,
            &[
                ("E4", 329.63),
                ("B3", 246.94),
                ("G3", 196.0),
                ("D3", 146.83),
                ("A2", 110.0),
                ("E2", 82.41),
                ("B1", 61.74),
            ],
        ),
    );
    tunings.insert(
        "twelveString",
        Tuning::build(
            "12-String Guitar",
            Sine,
            &[
                // paired courses shown as their sounding average
                ("E4/E3", 329.63),
                ("B3", 246.94),
                ("G3/G4", 392.0),
                ("D3/D4", 293.66),
                ("A2/A3", 220.0),
                ("E2/E3", 164.81),
            ],
        ),
    );
    tunings.insert(
        "bass",
        Tuning::build(
            "Bass Guitar",
            Square,
            &[("G2", 98.0), ("D2", 73.42), ("A1", 55.0), ("E1", 41.2)],
        ),
    );
    tunings.insert(
        "doubleBass",
        Tuning::build(
            "Double Bass",
            Square,
            &[("G2", 98.0), ("D2", 73.42), ("A1", 55.0), ("E1", 41.2)],
        ),
    );
    tunings.insert(
        "ukulele",
        Tuning::build(
            "Ukulele",
            Triangle,
            &[
                ("A4", 440.0),
                ("E4", 329.63),
                ("C4", 261.63),
                ("G4", 392.0),
            ],
        ),
    );
    tunings.insert(
        "baritoneUkulele",
        Tuning::build(
            "Baritone Ukulele",
            Triangle,
            &[
                ("E3", 164.81),
                ("B3", 246.94),
                ("G3", 196.0),
                ("D3", 146.83),
            ],
        ),
    );
    tunings.insert(
        "violin",
        Tuning::build(
            "Violin",
            Sawtooth,
            &[
                ("E5", 659.25),
                ("A4", 440.0),
                ("D4", 293.66),
                ("G3", 196.0),
            ],
        ),
    );
    tunings.insert(
        "viola",
        Tuning::build(
            "Viola",
            Sawtooth,
            &[
                ("A4", 440.0),
                ("D4", 293.66),
                ("G3", 196.0),
                ("C3", 130.81),
            ],
        ),
    );
    tunings.insert(
        "cello",
        Tuning::build(
            "Cello",
            Sawtooth,
            &[("A3", 220.0), ("D3", 146.83), ("G2", 98.0), ("C2", 65.41)],
        ),
    );
    tunings.insert(
        "mandolin",
        Tuning::build(
            "Mandolin",
            Sine,
            &[
                ("E4", 329.63),
                ("A3", 220.0),
                ("D3", 146.83),
                ("G3", 196.0),
            ],
        ),
    );
    tunings.insert(
        "banjo",
        Tuning::build(
            "Banjo (5-string)",
            Sine,
            &[
                ("G4", 392.0),
                ("D3", 146.83),
                ("G3", 196.0),
                ("B3", 246.94),
                ("D4", 293.66),
            ],
        ),
    );
    tunings.insert(
        "charango",
        Tuning::build(
            "Charango",
            Sine,
            &[
                ("E4", 329.63),
                ("A4", 440.0),
                ("E5", 659.25),
                ("C5", 523.25),
                ("G4", 392.0),
            ],
        ),
    );
    tunings.insert(
        "balalaika",
        Tuning::build(
            "Balalaika",
            Sine,
            &[("E4", 329.63), ("E4", 329.63), ("A4", 440.0)],
        ),
    );
    tunings.insert(
        "sitar",
        Tuning::build(
            "Sitar",
            Sine,
            &[
                ("C3", 130.81),
                ("C4", 261.63),
                ("G3", 196.0),
                ("C5", 523.25),
                ("G4", 392.0),
                ("C6", 1046.5),
                ("G5", 783.99),
            ],
        ),
    );
    tunings
});

/// Looks up a tuning by its instrument key.
pub fn get(key: &str) -> Option<&'static Tuning> {
    TUNINGS.get(key)
}

/// Iterates over all instrument keys in catalog order.
pub fn keys() -> impl Iterator<Item = &'static str> {
    TUNINGS.keys().copied()
}

#[cfg(test)]
mod test_catalog {
    use super::*;

    #[test]
    fn default_tuning_exists() {
        let tuning = get(DEFAULT_TUNING).expect("default tuning missing");
        assert_eq!(tuning.name, "Standard Guitar");
        assert_eq!(tuning.notes.len(), 6);
    }

    #[test]
    fn every_entry_has_notes() {
        for key in keys() {
            let tuning = get(key).unwrap();
            assert!(!tuning.notes.is_empty(), "tuning `{key}` has no notes");
            assert!(!tuning.name.is_empty(), "tuning `{key}` has no name");
            for note in &tuning.notes {
                assert!(note.frequency > 0.0, "note `{}` in `{key}` has a non-positive frequency", note.label);
            }
        }
    }

    #[test]
    fn timbres_follow_instrument_family() {
        assert_eq!(get("ukulele").unwrap().timbre, Timbre::Triangle);
        assert_eq!(get("bass").unwrap().timbre, Timbre::Square);
        assert_eq!(get("violin").unwrap().timbre, Timbre::Sawtooth);
        assert_eq!(get("standard").unwrap().timbre, Timbre::Sine);
    }

    #[test]
    fn note_lookup_by_label() {
        let tuning = get("standard").unwrap();
        let low_e = tuning.note("E2").expect("E2 missing from standard tuning");
        assert!((low_e.frequency - 82.41).abs() < 1e-3);
        assert!(tuning.note("Z9").is_none());
    }

    #[test]
    fn unknown_key_is_none() {
        assert!(get("theremin").is_none());
    }
}
