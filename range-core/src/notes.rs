//! # Note Table Module
//!
//! Fixed 12-tone equal temperament note table covering octaves 3 to 5
//! (C3 to B5, 36 notes), plus the quantizer that maps a frequency onto it.
//!
//! Pitch classes and notes are enumerated types rather than string keys;
//! names are only produced at the edges (display, serde, lookups by name).

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Lowest octave present in the table.
pub const LOWEST_OCTAVE: i8 = 3;
/// Highest octave present in the table.
pub const HIGHEST_OCTAVE: i8 = 5;
/// Default rejection distance for [`quantize`], in Hz.
pub const DEFAULT_TOLERANCE_HZ: f32 = 10.0;

/// One of the twelve chromatic pitch classes, spelled with sharps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C#")]
    CSharp,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D#")]
    DSharp,
    #[serde(rename = "E")]
    E,
    #[serde(rename = "F")]
    F,
    #[serde(rename = "F#")]
    FSharp,
    #[serde(rename = "G")]
    G,
    #[serde(rename = "G#")]
    GSharp,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A#")]
    ASharp,
    #[serde(rename = "B")]
    B,
}

const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const MAJOR_KEY_LABELS: [&str; 12] = [
    "C Major", "C# Major", "D Major", "D# Major", "E Major", "F Major",
    "F# Major", "G Major", "G# Major", "A Major", "A# Major", "B Major",
];

impl PitchClass {
    /// All pitch classes in ascending semitone order starting at C.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitones above C (0-11).
    pub fn semitone(self) -> u8 {
        self as u8
    }

    /// Pitch class for a semitone offset; wraps modulo 12.
    pub fn from_semitone(semitone: u8) -> Self {
        Self::ALL[(semitone % 12) as usize]
    }

    /// Sharp spelling, e.g. `"F#"`.
    pub fn name(self) -> &'static str {
        PITCH_CLASS_NAMES[self as usize]
    }

    /// The "X Major" label used as the preferred key.
    pub fn major_key_label(self) -> &'static str {
        MAJOR_KEY_LABELS[self as usize]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = String;

    /// Accepts sharp and flat spellings (`"C#"`, `"Db"`), case-insensitive
    /// on the letter.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_spelling(s).map(|(pc, _)| pc)
    }
}

/// Parses a pitch class spelling and returns the octave shift its accidental
/// implies: `Cb` is -1 (B of the octave below), `B#` is +1.
fn parse_spelling(s: &str) -> Result<(PitchClass, i8), String> {
    let mut chars = s.chars();
    let letter = chars
        .next()
        .ok_or_else(|| "empty pitch class".to_string())?
        .to_ascii_uppercase();
    let natural: i8 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(format!("unknown pitch class '{}'", s)),
    };
    let semitone = match chars.as_str() {
        "" => natural,
        "#" => natural + 1,
        "b" => natural - 1,
        _ => return Err(format!("unknown pitch class '{}'", s)),
    };
    let octave_shift = semitone.div_euclid(12);
    Ok((PitchClass::from_semitone(semitone.rem_euclid(12) as u8), octave_shift))
}

/// A pitch class in a specific octave (scientific pitch notation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Note {
    pub octave: i8,
    pub pitch_class: PitchClass,
}

impl Note {
    pub const fn new(pitch_class: PitchClass, octave: i8) -> Self {
        Self { octave, pitch_class }
    }

    /// MIDI note number (C4 = 60, A4 = 69).
    pub fn midi(&self) -> i32 {
        (self.octave as i32 + 1) * 12 + self.pitch_class.semitone() as i32
    }

    /// Equal-tempered frequency with A4 = 440 Hz, rounded to 0.01 Hz.
    pub fn frequency(&self) -> f32 {
        let exact = 440.0_f64 * 2.0_f64.powf((self.midi() - 69) as f64 / 12.0);
        ((exact * 100.0).round() / 100.0) as f32
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

impl FromStr for Note {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| c.is_ascii_digit() || c == '-')
            .ok_or_else(|| format!("note '{}' has no octave", s))?;
        let (class, octave) = s.split_at(split);
        let (pitch_class, octave_shift) = parse_spelling(class)?;
        let octave = octave
            .parse::<i8>()
            .ok()
            .and_then(|o| o.checked_add(octave_shift))
            .ok_or_else(|| format!("note '{}' has an invalid octave", s))?;
        Ok(Note::new(pitch_class, octave))
    }
}

impl TryFrom<String> for Note {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Note> for String {
    fn from(note: Note) -> Self {
        note.to_string()
    }
}

/// A single row of the note table.
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub note: Note,
    /// Cached display name, e.g. `"C#4"`.
    pub name: String,
    /// Frequency in Hz
    pub frequency: f32,
}

/// Statically computed chromatic notes C3..B5, strictly ascending.
static NOTE_TABLE: Lazy<Vec<TableEntry>> = Lazy::new(|| {
    (LOWEST_OCTAVE..=HIGHEST_OCTAVE)
        .flat_map(|octave| PitchClass::ALL.into_iter().map(move |pc| Note::new(pc, octave)))
        .map(|note| TableEntry {
            note,
            name: note.to_string(),
            frequency: note.frequency(),
        })
        .collect()
});

/// Name to table index, for lookups like `"A4"`.
static NOTE_MAP: Lazy<BTreeMap<String, usize>> = Lazy::new(|| {
    NOTE_TABLE
        .iter()
        .enumerate()
        .map(|(i, entry)| (entry.name.clone(), i))
        .collect()
});

/// The full table in ascending order.
pub fn note_table() -> &'static [TableEntry] {
    &NOTE_TABLE
}

/// Looks a note up by name. Flat spellings resolve to their sharp entry.
pub fn lookup(name: &str) -> Option<&'static TableEntry> {
    let canonical = name.parse::<Note>().ok()?.to_string();
    NOTE_MAP.get(&canonical).map(|&i| &NOTE_TABLE[i])
}

/// Table entry closest to `freq` and its distance in Hz.
/// The first entry wins on an exact tie.
fn closest_entry(freq: f32) -> (&'static TableEntry, f32) {
    let mut best = &NOTE_TABLE[0];
    let mut best_diff = (freq - best.frequency).abs();
    for entry in NOTE_TABLE.iter().skip(1) {
        let diff = (freq - entry.frequency).abs();
        if diff < best_diff {
            best = entry;
            best_diff = diff;
        }
    }
    (best, best_diff)
}

/// Maps a frequency to the nearest table note, or `None` when that note is
/// `tolerance_hz` or further away.
pub fn quantize(freq: f32, tolerance_hz: f32) -> Option<Note> {
    let (entry, diff) = closest_entry(freq);
    (diff < tolerance_hz).then_some(entry.note)
}

/// Nearest table note with no rejection. Frequencies outside the table clamp
/// to C3 or B5.
pub fn nearest_note(freq: f32) -> Note {
    closest_entry(freq).0.note
}

/// Deviation from a target frequency in cents (positive = sharp).
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
