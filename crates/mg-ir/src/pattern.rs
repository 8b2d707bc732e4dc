//! Pattern, channel and cell types.

use alloc::string::String;
use alloc::vec::Vec;

use crate::effects::Effect;
use crate::text::{truncated, Name};

/// Highest playable note value.
pub const NOTE_MAX: u8 = 119;

/// A note value in a pattern cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Note {
    /// No note
    #[default]
    None,
    /// Note on, `octave * 12 + semitone` (0-119). Amiga period 428 is `On(48)`.
    On(u8),
    /// Note cut / key release
    Off,
}

impl Note {
    /// Create a note from octave (0-9) and semitone (0-11).
    pub const fn from_octave_semitone(octave: u8, semitone: u8) -> Self {
        Note::On(octave * 12 + semitone)
    }

    /// Note on from a signed semitone index, clamped into the playable range.
    pub fn clamped(value: i32) -> Self {
        Note::On(value.clamp(0, NOTE_MAX as i32) as u8)
    }

    /// Get the octave (0-9) if this is a note on.
    pub const fn octave(self) -> Option<u8> {
        match self {
            Note::On(n) => Some(n / 12),
            _ => None,
        }
    }

    /// Get the semitone (0-11) if this is a note on.
    pub const fn semitone(self) -> Option<u8> {
        match self {
            Note::On(n) => Some(n % 12),
            _ => None,
        }
    }

    /// Shift a note on by `semitones`, leaving other values alone.
    pub fn transposed(self, semitones: i32) -> Self {
        match self {
            Note::On(n) => Note::clamped(n as i32 + semitones),
            other => other,
        }
    }
}

/// A single cell in a pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub note: Note,
    /// Instrument number (0 = none, otherwise 1-based instrument id)
    pub instrument: u8,
    /// Volume column (0-64), `None` when unset
    pub volume: Option<u8>,
    pub effect: Effect,
    pub effect2: Effect,
}

impl Cell {
    /// Create an empty cell.
    pub const fn empty() -> Self {
        Self {
            note: Note::None,
            instrument: 0,
            volume: None,
            effect: Effect::None,
            effect2: Effect::None,
        }
    }

    /// Returns true if the cell is completely empty.
    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    /// Put `effect` in the first free effect slot. Returns false when both are taken.
    pub fn push_effect(&mut self, effect: Effect) -> bool {
        if effect == Effect::None {
            return true;
        }
        if self.effect == Effect::None {
            self.effect = effect;
        } else if self.effect2 == Effect::None {
            self.effect2 = effect;
        } else {
            return false;
        }
        true
    }
}

/// Where a pattern came from. Informational only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportMetadata {
    /// Short format id of the decoder that produced the pattern
    pub source_format: &'static str,
    pub source_file: String,
    /// Unix timestamp (seconds) of the import
    pub imported_at: i64,
    pub original_channels: u16,
    pub original_patterns: u16,
    pub original_instruments: u16,
}

/// One channel's slice of a pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    pub name: Name,
    /// Stereo position, -64 (left) to +64 (right)
    pub pan: i8,
    pub muted: bool,
    pub solo: bool,
    pub collapsed: bool,
    pub cells: Vec<Cell>,
}

impl Channel {
    /// Create a channel of `rows` empty cells.
    pub fn new(name: &str, pan: i8, rows: u16) -> Self {
        Self {
            name: truncated(name),
            pan: pan.clamp(-64, 64),
            muted: false,
            solo: false,
            collapsed: false,
            cells: alloc::vec![Cell::empty(); rows as usize],
        }
    }
}

/// A grid of rows across channels.
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    pub id: u16,
    pub name: Name,
    /// Number of rows (1-256)
    pub rows: u16,
    pub channels: Vec<Channel>,
    pub source: ImportMetadata,
}

impl Pattern {
    /// Create a new pattern with empty cells and centred, unnamed channels.
    pub fn new(rows: u16, channels: u8) -> Self {
        Self {
            id: 0,
            name: Name::new(),
            rows,
            channels: (0..channels).map(|_| Channel::new("", 0, rows)).collect(),
            source: ImportMetadata::default(),
        }
    }

    pub fn num_channels(&self) -> u8 {
        self.channels.len() as u8
    }

    /// Get a reference to a cell.
    pub fn cell(&self, row: u16, channel: u8) -> &Cell {
        debug_assert!(row < self.rows);
        &self.channels[channel as usize].cells[row as usize]
    }

    /// Get a mutable reference to a cell.
    pub fn cell_mut(&mut self, row: u16, channel: u8) -> &mut Cell {
        debug_assert!(row < self.rows);
        &mut self.channels[channel as usize].cells[row as usize]
    }

    /// Collect the cells of one row across all channels.
    pub fn row(&self, row: u16) -> Vec<Cell> {
        self.channels.iter().map(|ch| ch.cells[row as usize]).collect()
    }

    /// Returns true if no cell in the pattern carries data.
    pub fn is_blank(&self) -> bool {
        self.channels.iter().all(|ch| ch.cells.iter().all(Cell::is_empty))
    }
}
