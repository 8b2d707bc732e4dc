//! SidMon 1.0: player code followed by song data, found via the
//! ` SID-MON BY R.v.VLIET  (c) 1988 ` marker.
//!
//! Eleven longwords just before the marker locate every table, relative
//! to the marker itself. Each voice has its own track list; a track entry
//! names a pattern of variable-length rows.

use log::{debug, warn};
use mg_ir::{
    Cell, Instrument, InstrumentConfig, Note, PlaybackFormat, SidMon1Config, Song, Waveform,
};

use super::sidmon2::pattern_slice;
use super::{load_standalone, require_len};
use crate::assembler::SongBuilder;
use crate::cursor::{BinaryRead, ByteCursor};
use crate::effect_parser;
use crate::extractor::validate_loop;
use crate::normalizer::{append_aligned, normalize, slice_columns, StreamEvent};
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const ID: &[u8] = b" SID-MON BY R.v.VLIET  (c) 1988 ";
const POINTERS_SIZE: usize = 44;
const SEARCH_END: usize = 0x10000;
const TRACK_SIZE: usize = 6;
const INSTRUMENT_SIZE: usize = 32;
const WAVE_SIZE: usize = 32;
const ROW_SIZE: usize = 5;
const SPEED: u8 = 6;
const FINETUNE_STEP: u16 = 67;

/// Offset of the marker, searched past the pointer block.
fn find_id(data: &[u8]) -> Option<usize> {
    let end = data.len().min(SEARCH_END);
    data.get(POINTERS_SIZE..end)?
        .windows(ID.len())
        .position(|w| w == ID)
        .map(|p| p + POINTERS_SIZE)
}

/// Table bounds, absolute, from the pointer block.
#[derive(Debug)]
struct Layout {
    /// Start of each voice's track list, then the end of the last one
    tracks: [usize; 5],
    instruments: (usize, usize),
    waves: (usize, usize),
    pattern_pointers: (usize, usize),
}

impl Layout {
    fn read(data: &[u8], base: usize) -> Result<Self, FormatError> {
        let mut ptr = [0usize; 11];
        for (i, p) in ptr.iter_mut().enumerate() {
            let rel = data.u32be_at(base - POINTERS_SIZE + i * 4)? as usize;
            *p = base.saturating_add(rel);
        }
        Ok(Self {
            tracks: [ptr[0], ptr[1], ptr[2], ptr[3], ptr[4]],
            instruments: (ptr[5], ptr[6]),
            waves: (ptr[7], ptr[8]),
            pattern_pointers: (ptr[9], ptr[10]),
        })
    }

    fn rows_start(&self) -> usize {
        self.pattern_pointers.1
    }
}

#[derive(Clone, Copy, Debug)]
struct TrackStep {
    pattern: usize,
    transpose: i8,
}

pub struct SidMon1;

impl Loader for SidMon1 {
    fn id(&self) -> &'static str {
        "sid1"
    }

    fn name(&self) -> &'static str {
        "SidMon 1.0"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["sid1", "smn"],
            prefixes: &["sid1", "smn"],
            required: false,
        }
    }

    fn min_size(&self) -> usize {
        POINTERS_SIZE + ID.len()
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        find_id(data).map(|_| 5)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_sidmon1(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&SidMon1, data)
}

/// Bytes of `start..end`, clipped to the file with a warning.
fn region<'a>(data: &'a [u8], (start, end): (usize, usize), what: &str) -> &'a [u8] {
    let clipped = end.min(data.len());
    if clipped < end {
        warn!("SidMon 1: {what} truncated");
    }
    data.get(start..clipped).unwrap_or_default()
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("SidMon 1", data, POINTERS_SIZE + ID.len())?;
    let base = find_id(data).ok_or_else(|| FormatError::InvalidHeader {
        format: "SidMon 1",
        reason: "marker not found".into(),
    })?;
    let layout = Layout::read(data, base)?;
    debug!("SidMon 1: marker at {base:#x}, {layout:?}");

    let voices: Vec<Vec<TrackStep>> = (0..4)
        .map(|v| {
            region(data, (layout.tracks[v], layout.tracks[v + 1]), "track list")
                .chunks_exact(TRACK_SIZE)
                .map(|raw| TrackStep {
                    pattern: u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize,
                    transpose: raw[5] as i8,
                })
                .collect()
        })
        .collect();

    let pointers: Vec<usize> = region(data, layout.pattern_pointers, "pattern pointers")
        .chunks_exact(4)
        .map(|p| u32::from_be_bytes([p[0], p[1], p[2], p[3]]) as usize * ROW_SIZE)
        .collect();
    let rows = data.get(layout.rows_start()..).unwrap_or_default();

    let positions = voices.iter().map(Vec::len).max().unwrap_or(0);
    let max_rows = ctx.options.max_rows_per_channel;
    let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); 4];
    let mut last_instrument = [0u8; 4];
    for pos in 0..positions {
        let block = voices
            .iter()
            .enumerate()
            .map(|(v, steps)| {
                let Some(step) = steps.get(pos) else {
                    return Vec::new();
                };
                let mut events = vec![StreamEvent::Instrument(last_instrument[v])];
                events.extend(parse_rows(
                    pattern_slice(rows, &pointers, step.pattern),
                    step,
                    &mut last_instrument[v],
                ));
                normalize(&events, SPEED as u32, max_rows).cells
            })
            .collect();
        append_aligned(&mut columns, block);
        if columns[0].len() as u32 >= max_rows {
            warn!("SidMon 1: row cap reached at position {pos}");
            break;
        }
    }

    let waves = region(data, layout.waves, "waveforms");
    let instruments: Vec<Instrument> = region(data, layout.instruments, "instruments")
        .chunks_exact(INSTRUMENT_SIZE)
        .enumerate()
        .map(|(i, raw)| {
            let id = i as u16 + 1;
            let config = InstrumentConfig::SidMon1(instrument_config(raw, waves));
            Instrument::new(id, &format!("Instrument {id}"), config)
        })
        .collect();

    let num_patterns = pointers.len();
    let num_instruments = instruments.len();
    Ok(SongBuilder::new("sid1", PlaybackFormat::SidMon1, 4)
        .patterns(slice_columns(&columns, ctx.options.rows_per_pattern))
        .instruments(instruments)
        .speed(SPEED)
        .tempo(125)
        .original_counts(4, num_patterns as u16, num_instruments as u16)
        .build(ctx))
}

/// Rows are note, instrument, effect, parameter and length in ticks.
fn parse_rows(bytes: &[u8], step: &TrackStep, last_instrument: &mut u8) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    let mut cur = ByteCursor::new(bytes);
    while let Ok(row) = cur.read_bytes(ROW_SIZE) {
        let note = match row[0] {
            0 => Note::None,
            n => Note::clamped(24 + n as i32 - 1 + step.transpose as i32),
        };
        if row[1] != 0 {
            *last_instrument = row[1];
            events.push(StreamEvent::Instrument(row[1]));
        }
        events.push(StreamEvent::Effect(effect_parser::sidmon1(row[2], row[3])));
        events.push(StreamEvent::Note {
            note,
            duration: row[4].max(1) as u32,
        });
    }
    events
}

fn wave(waves: &[u8], index: usize) -> Option<&[u8]> {
    waves.get(index * WAVE_SIZE..(index + 1) * WAVE_SIZE)
}

fn instrument_config(raw: &[u8], waves: &[u8]) -> SidMon1Config {
    let wave_index = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    let waveform = wave(waves, wave_index).map(|w| Waveform {
        data: w.iter().map(|&b| b as i8).collect(),
        loop_range: validate_loop(0, WAVE_SIZE as u32, WAVE_SIZE as u32),
    });
    if waveform.is_none() {
        debug!("SidMon 1: wave {wave_index} missing");
    }
    let phase_shift = raw[28];
    let phase_wave = match phase_shift {
        0 => Vec::new(),
        p => wave(waves, p as usize)
            .map(|w| w.iter().map(|&b| b as i8).collect())
            .unwrap_or_default(),
    };
    let mut arpeggio = [0u8; 16];
    arpeggio.copy_from_slice(&raw[4..20]);

    SidMon1Config {
        attack_speed: raw[20],
        attack_max: raw[21].min(64),
        decay_speed: raw[22],
        decay_min: raw[23].min(64),
        sustain: raw[24],
        release_speed: raw[26],
        release_min: raw[27].min(64),
        phase_shift,
        phase_speed: raw[29],
        finetune: raw[30].min(15) as u16 * FINETUNE_STEP,
        pitch_fall: raw[31] as i8,
        arpeggio,
        waveform,
        phase_wave,
    }
}
