//! Final song assembly.
//!
//! Decoders hand the builder whatever they managed to extract; `build`
//! fills the gaps with format-family defaults so consumers never see an
//! empty song or a dangling instrument reference.

use log::{debug, warn};
use mg_ir::{Cell, Channel, ImportMetadata, Instrument, Pattern, PlaybackFormat, Song};

use crate::normalizer::Grid;
use crate::registry::DecodeContext;

/// Default channel panning.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PanScheme {
    /// Hard left/right in the classic L R R L order
    #[default]
    Amiga,
    Center,
    /// Per-channel pan, missing entries centred
    Explicit(Vec<i8>),
}

impl PanScheme {
    pub fn pan_for(&self, channel: usize) -> i8 {
        match self {
            PanScheme::Amiga => {
                if channel % 4 == 0 || channel % 4 == 3 {
                    -64
                } else {
                    64
                }
            }
            PanScheme::Center => 0,
            PanScheme::Explicit(pans) => pans.get(channel).copied().unwrap_or(0),
        }
    }
}

/// Tallest pattern a song may hold.
pub const MAX_ROWS: usize = 256;

/// Collects decoded parts and produces a [`Song`].
#[derive(Clone, Debug)]
pub struct SongBuilder {
    source_format: &'static str,
    format: PlaybackFormat,
    name: String,
    num_channels: u8,
    pan: PanScheme,
    channel_names: Vec<String>,
    patterns: Vec<Grid>,
    instruments: Vec<Instrument>,
    order: Option<Vec<u16>>,
    speed: u8,
    tempo: u8,
    restart: u16,
    linear_slides: bool,
    original: Option<(u16, u16, u16)>,
}

impl SongBuilder {
    pub fn new(source_format: &'static str, format: PlaybackFormat, num_channels: u8) -> Self {
        Self {
            source_format,
            format,
            name: String::new(),
            num_channels,
            pan: PanScheme::Amiga,
            channel_names: Vec::new(),
            patterns: Vec::new(),
            instruments: Vec::new(),
            order: None,
            speed: 6,
            tempo: 125,
            restart: 0,
            linear_slides: false,
            original: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn pan(mut self, pan: PanScheme) -> Self {
        self.pan = pan;
        self
    }

    pub fn channel_names(mut self, names: Vec<String>) -> Self {
        self.channel_names = names;
        self
    }

    pub fn patterns(mut self, patterns: Vec<Grid>) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn instruments(mut self, instruments: Vec<Instrument>) -> Self {
        self.instruments = instruments;
        self
    }

    /// Song positions. Without an order, patterns play once in sequence.
    pub fn order(mut self, order: Vec<u16>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn speed(mut self, speed: u8) -> Self {
        self.speed = speed;
        self
    }

    pub fn tempo(mut self, tempo: u8) -> Self {
        self.tempo = tempo;
        self
    }

    pub fn restart(mut self, restart: u16) -> Self {
        self.restart = restart;
        self
    }

    pub fn linear_slides(mut self, linear: bool) -> Self {
        self.linear_slides = linear;
        self
    }

    /// Counts as stored in the source file, for provenance.
    pub fn original_counts(mut self, channels: u16, patterns: u16, instruments: u16) -> Self {
        self.original = Some((channels, patterns, instruments));
        self
    }

    pub fn build(self, ctx: &DecodeContext) -> Song {
        let num_channels = self.num_channels.max(1);
        let (orig_channels, orig_patterns, orig_instruments) = self.original.unwrap_or((
            num_channels as u16,
            self.patterns.len() as u16,
            self.instruments.len() as u16,
        ));
        let metadata = ImportMetadata {
            source_format: self.source_format,
            source_file: ctx.filename.to_string(),
            imported_at: ctx.options.resolve_timestamp(),
            original_channels: orig_channels,
            original_patterns: orig_patterns,
            original_instruments: orig_instruments,
        };

        let mut grids = self.patterns;
        if grids.is_empty() {
            debug!("{}: no patterns decoded, adding an empty one", self.source_format);
            let rows = ctx.options.rows_per_pattern.max(1) as usize;
            grids.push(vec![vec![Cell::empty(); rows]; num_channels as usize]);
        }

        let patterns: Vec<Pattern> = grids
            .into_iter()
            .enumerate()
            .map(|(idx, grid)| {
                let tallest = grid.iter().map(Vec::len).max().unwrap_or(0);
                if tallest > MAX_ROWS {
                    warn!(
                        "{}: pattern {idx} has {tallest} rows, dropping all past {MAX_ROWS}",
                        self.source_format
                    );
                }
                let rows = tallest.clamp(1, MAX_ROWS);
                let channels = (0..num_channels as usize)
                    .map(|ch| {
                        let name = self
                            .channel_names
                            .get(ch)
                            .filter(|n| !n.is_empty())
                            .cloned()
                            .unwrap_or_else(|| format!("Channel {}", ch + 1));
                        let mut channel = Channel::new(&name, self.pan.pan_for(ch), rows as u16);
                        if let Some(cells) = grid.get(ch) {
                            for (dst, src) in channel.cells.iter_mut().zip(cells) {
                                *dst = *src;
                            }
                        }
                        channel
                    })
                    .collect();
                Pattern {
                    id: idx as u16,
                    name: mg_ir::truncated(&format!("Pattern {idx:02}")),
                    rows: rows as u16,
                    channels,
                    source: metadata.clone(),
                }
            })
            .collect();

        let mut instruments = self.instruments;
        for (i, inst) in instruments.iter_mut().enumerate() {
            inst.id = i as u16 + 1;
        }
        let referenced = patterns
            .iter()
            .flat_map(|p| p.channels.iter())
            .flat_map(|c| c.cells.iter())
            .map(|c| c.instrument as usize)
            .max()
            .unwrap_or(0);
        let wanted = referenced.max(1);
        if instruments.len() < wanted {
            debug!(
                "{}: padding instruments {}..={wanted} with placeholders",
                self.source_format,
                instruments.len() + 1
            );
        }
        while instruments.len() < wanted {
            let id = instruments.len() as u16 + 1;
            instruments.push(Instrument::placeholder(id, ""));
        }

        let count = patterns.len() as u16;
        let mut order: Vec<u16> = match self.order {
            Some(order) => {
                let before = order.len();
                let kept: Vec<u16> = order.into_iter().filter(|&p| p < count).collect();
                if kept.len() != before {
                    warn!(
                        "{}: dropped {} order entries referencing missing patterns",
                        self.source_format,
                        before - kept.len()
                    );
                }
                kept
            }
            None => (0..count).collect(),
        };
        if order.is_empty() {
            order.push(0);
        }

        let restart = if (self.restart as usize) < order.len() { self.restart } else { 0 };
        let speed = if self.speed == 0 { 6 } else { self.speed.min(31) };
        let tempo = if self.tempo == 0 { 125 } else { self.tempo.max(32) };

        let mut song = Song::new(&self.name, self.format);
        song.patterns = patterns;
        song.instruments = instruments;
        song.order = order;
        song.initial_speed = speed;
        song.initial_tempo = tempo;
        song.num_channels = num_channels;
        song.restart_position = restart;
        song.linear_slides = self.linear_slides;
        song
    }
}
