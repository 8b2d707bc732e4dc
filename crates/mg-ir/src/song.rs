//! Song structure and import summary.

use alloc::string::String;
use alloc::vec::Vec;

use crate::instrument::Instrument;
use crate::pattern::Pattern;
use crate::text::{truncated, Name};

/// Playback semantics a song expects from the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlaybackFormat {
    #[default]
    Mod,
    Xm,
    S3m,
    FutureComposer,
    SoundMon,
    Ahx,
    SidMon2,
    Fred,
    RobHubbard,
    Sawteeth,
    Hively,
    SidMon1,
    DigitalMugician,
    DavidWhittaker,
    Hippel,
}

impl PlaybackFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackFormat::Mod => "MOD",
            PlaybackFormat::Xm => "XM",
            PlaybackFormat::S3m => "S3M",
            PlaybackFormat::FutureComposer => "FC",
            PlaybackFormat::SoundMon => "BP",
            PlaybackFormat::Ahx => "AHX",
            PlaybackFormat::SidMon2 => "SID2",
            PlaybackFormat::Fred => "FRED",
            PlaybackFormat::RobHubbard => "RH",
            PlaybackFormat::Sawteeth => "SAW",
            PlaybackFormat::Hively => "HVL",
            PlaybackFormat::SidMon1 => "SID1",
            PlaybackFormat::DigitalMugician => "DMU",
            PlaybackFormat::DavidWhittaker => "DW",
            PlaybackFormat::Hippel => "COSO",
        }
    }
}

impl core::fmt::Display for PlaybackFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete imported song.
#[derive(Clone, Debug, PartialEq)]
pub struct Song {
    pub name: Name,
    pub format: PlaybackFormat,
    pub patterns: Vec<Pattern>,
    pub instruments: Vec<Instrument>,
    /// Song positions, each an index into `patterns`
    pub order: Vec<u16>,
    /// Initial speed (ticks per row, 1-31)
    pub initial_speed: u8,
    /// Initial tempo in BPM (32-255)
    pub initial_tempo: u8,
    pub num_channels: u8,
    /// Order position to continue from after the last one
    pub restart_position: u16,
    /// Linear (true) or Amiga period (false) pitch slides
    pub linear_slides: bool,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            name: Name::new(),
            format: PlaybackFormat::Mod,
            patterns: Vec::new(),
            instruments: Vec::new(),
            order: Vec::new(),
            initial_speed: 6,
            initial_tempo: 125,
            num_channels: 4,
            restart_position: 0,
            linear_slides: false,
        }
    }
}

impl Song {
    /// Create a new empty song.
    pub fn new(name: &str, format: PlaybackFormat) -> Self {
        Self {
            name: truncated(name),
            format,
            ..Self::default()
        }
    }

    /// Look up an instrument by its 1-based id.
    pub fn instrument(&self, id: u16) -> Option<&Instrument> {
        self.instruments.iter().find(|inst| inst.id == id)
    }

    /// Iterate over the patterns in play order.
    pub fn patterns_in_order(&self) -> impl Iterator<Item = &Pattern> + '_ {
        self.order.iter().filter_map(|&idx| self.patterns.get(idx as usize))
    }

    /// Summarize for an import-preview dialog.
    pub fn summary(&self, format_name: &str) -> FormatSummary {
        let source = self.patterns.first().map(|p| &p.source);
        FormatSummary {
            format_name: String::from(format_name),
            tag: self.format,
            title: String::from(self.name.as_str()),
            channels: self.num_channels,
            patterns: self.patterns.len() as u16,
            instruments: self.instruments.len() as u16,
            positions: self.order.len() as u16,
            original_channels: source.map_or(0, |s| s.original_channels),
            original_patterns: source.map_or(0, |s| s.original_patterns),
            original_instruments: source.map_or(0, |s| s.original_instruments),
        }
    }
}

/// Counts shown before the user commits to an import.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatSummary {
    /// Human-readable detected format label
    pub format_name: String,
    pub tag: PlaybackFormat,
    pub title: String,
    pub channels: u8,
    pub patterns: u16,
    pub instruments: u16,
    pub positions: u16,
    pub original_channels: u16,
    pub original_patterns: u16,
    pub original_instruments: u16,
}
