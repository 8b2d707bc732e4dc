//! Jochen Hippel COSO modules (`COSO` ... `TFMX`).
//!
//! All tables sit behind offsets in a fixed header. Voices play
//! variable-length patterns, so each track step is normalized per voice.
//! Instruments are volume sequences driving a frequency sequence, the same
//! macro model Future Composer later adopted, and are imported as such.

use log::{debug, warn};
use mg_ir::{
    Cell, Effect, FutureComposerConfig, Instrument, InstrumentConfig, Note, PlaybackFormat, Song,
    Waveform,
};

use super::future_composer::first_wave;
use super::{load_standalone, require_len};
use crate::assembler::SongBuilder;
use crate::cursor::{BinaryRead, ByteCursor};
use crate::extractor::read_waveform;
use crate::normalizer::{append_aligned, normalize, slice_columns, StreamEvent};
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const HEADER_SIZE: usize = 50;
const STEP_SIZE: usize = 12;
const SONG_SIZE: usize = 6;
const SAMPLE_HEADER_SIZE: usize = 10;
const VOLSEQ_HEADER: usize = 5;
const MAX_SEQUENCE: usize = 256;
const DEFAULT_SPEED: u8 = 6;

const SEQ_LOOP: u8 = 0xE0;
const SEQ_END: u8 = 0xE1;
const PATTERN_END: u8 = 0xFF;
const PATTERN_WAIT: u8 = 0xFE;

/// Table offsets and counts from the fixed header.
#[derive(Debug)]
struct Layout {
    frequency_table: usize,
    volume_table: usize,
    pattern_table: usize,
    tracks: usize,
    songs: usize,
    sample_headers: usize,
    sample_data: usize,
    frequency_count: usize,
    volume_count: usize,
    pattern_count: usize,
    step_count: usize,
    song_count: usize,
    sample_count: usize,
}

impl Layout {
    fn read(data: &[u8]) -> Result<Self, FormatError> {
        if data.slice_at(0, 4)? != b"COSO" || data.slice_at(32, 4)? != b"TFMX" {
            return Err(FormatError::InvalidHeader {
                format: "Hippel COSO",
                reason: "missing COSO/TFMX tags".into(),
            });
        }
        let at = |ofs| data.u32be_at(ofs).map(|v| v as usize);
        // The first four counts are stored as the last valid index.
        let last = |ofs| data.u16be_at(ofs).map(|v| v as usize + 1);
        Ok(Self {
            frequency_table: at(4)?,
            volume_table: at(8)?,
            pattern_table: at(12)?,
            tracks: at(16)?,
            songs: at(20)?,
            sample_headers: at(24)?,
            sample_data: at(28)?,
            frequency_count: last(36)?,
            volume_count: last(38)?,
            pattern_count: last(40)?,
            step_count: last(42)?,
            song_count: data.u16be_at(46)? as usize,
            sample_count: data.u16be_at(48)? as usize,
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Voice {
    pattern: u8,
    transpose: i8,
    sound_transpose: i8,
}

#[derive(Clone, Copy, Debug)]
struct SongRange {
    first: usize,
    last: usize,
    speed: u8,
}

pub struct HippelCoso;

impl Loader for HippelCoso {
    fn id(&self) -> &'static str {
        "coso"
    }

    fn name(&self) -> &'static str {
        "Jochen Hippel COSO"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["hipc", "soc", "coso"],
            prefixes: &["hipc", "soc", "coso"],
            required: false,
        }
    }

    fn min_size(&self) -> usize {
        HEADER_SIZE
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        Layout::read(data).ok().map(|_| 5)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_hippel_coso(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&HippelCoso, data)
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("Hippel COSO", data, HEADER_SIZE)?;
    let layout = Layout::read(data)?;
    debug!("Hippel COSO: {layout:?}");

    let song = read_song(data, &layout);
    let speed = song.speed;
    let max_rows = ctx.options.max_rows_per_channel;
    let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); 4];
    for step in song.first..=song.last {
        let Ok(raw) = data.slice_at(layout.tracks + step * STEP_SIZE, STEP_SIZE) else {
            warn!("Hippel COSO: track table truncated at step {step}");
            break;
        };
        let block = raw
            .chunks_exact(3)
            .map(|v| {
                let voice = Voice {
                    pattern: v[0],
                    transpose: v[1] as i8,
                    sound_transpose: v[2] as i8,
                };
                let bytes = pattern_bytes(data, &layout, voice.pattern);
                let events = parse_pattern(bytes, &voice, speed);
                normalize(&events, speed as u32, max_rows).cells
            })
            .collect();
        append_aligned(&mut columns, block);
        if columns[0].len() as u32 >= max_rows {
            warn!("Hippel COSO: row cap reached at step {step}");
            break;
        }
    }

    let patterns = slice_columns(&columns, ctx.options.rows_per_pattern);
    let instruments = read_instruments(data, &layout);

    Ok(SongBuilder::new("coso", PlaybackFormat::Hippel, 4)
        .patterns(patterns)
        .instruments(instruments)
        .speed(speed)
        .tempo(125)
        .original_counts(4, layout.pattern_count as u16, layout.volume_count as u16)
        .build(ctx))
}

/// First subsong, or every track step when the song table is unreadable.
fn read_song(data: &[u8], layout: &Layout) -> SongRange {
    let whole = SongRange {
        first: 0,
        last: layout.step_count - 1,
        speed: DEFAULT_SPEED,
    };
    if layout.song_count == 0 {
        return whole;
    }
    match data.slice_at(layout.songs, SONG_SIZE) {
        Ok(raw) => {
            let word = |at: usize| u16::from_be_bytes([raw[at], raw[at + 1]]) as usize;
            let speed = (word(4) as u8).clamp(1, 31);
            SongRange {
                first: word(0),
                last: word(2).min(layout.step_count - 1),
                speed,
            }
        }
        Err(e) => {
            warn!("Hippel COSO: song table unreadable ({e}), playing every step");
            whole
        }
    }
}

/// Absolute offset stored in entry `index` of a table of 16-bit offsets.
fn table_entry(data: &[u8], table: usize, index: usize) -> Option<usize> {
    data.u16be_at(table + index * 2).ok().map(usize::from)
}

fn pattern_bytes<'a>(data: &'a [u8], layout: &Layout, pattern: u8) -> &'a [u8] {
    if pattern as usize >= layout.pattern_count {
        return &[];
    }
    table_entry(data, layout.pattern_table, pattern as usize)
        .and_then(|at| data.get(at..))
        .unwrap_or_default()
}

/// Decode one voice's pattern.
///
/// A row is a note byte and an info byte: the low five info bits pick the
/// volume sequence and any of the top three bits add a portamento byte.
/// `FE n` rests for `n` rows and `FF` ends the pattern.
fn parse_pattern(bytes: &[u8], voice: &Voice, speed: u8) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    let mut cur = ByteCursor::new(bytes);
    let row = speed as u32;

    while let Ok(b) = cur.read_u8() {
        match b {
            PATTERN_END => break,
            PATTERN_WAIT => {
                let rows = cur.read_u8().unwrap_or(0) as u32;
                if rows > 0 {
                    events.push(StreamEvent::Note { note: Note::None, duration: rows * row });
                }
            }
            0x00..=0x7F => {
                let Ok(info) = cur.read_u8() else { break };
                if info & 0xE0 != 0 {
                    let porta = cur.read_i8().unwrap_or(0);
                    events.push(StreamEvent::Effect(match porta {
                        0 => Effect::None,
                        p if p < 0 => Effect::PortaUp(p.unsigned_abs()),
                        p => Effect::PortaDown(p as u8),
                    }));
                }
                let volseq = (info & 0x1F) as i32 + voice.sound_transpose as i32;
                events.push(StreamEvent::Instrument((volseq + 1).clamp(1, 255) as u8));
                events.push(StreamEvent::Note {
                    note: Note::clamped(24 + b as i32 + voice.transpose as i32),
                    duration: row,
                });
            }
            _ => debug!("Hippel COSO: skipping pattern byte {b:#04x}"),
        }
    }
    events
}

/// Operand bytes following a sequence command.
fn operand_len(cmd: u8) -> usize {
    match cmd {
        0xE3 | 0xE9 => 2,
        0xE2 | 0xE4 | 0xE5 | 0xE6 | 0xE7 | 0xE8 | 0xEA => 1,
        _ => 0,
    }
}

/// Sequence bytes up to and including the loop or end command.
fn read_sequence(data: &[u8], at: usize, is_end: impl Fn(u8) -> bool) -> Vec<u8> {
    let bytes = data.get(at..).unwrap_or_default();
    let bytes = &bytes[..bytes.len().min(MAX_SEQUENCE)];
    let mut i = 0;
    while let Some(&b) = bytes.get(i) {
        if b == SEQ_LOOP {
            i += 2;
            break;
        }
        if is_end(b) {
            i += 1;
            break;
        }
        i += 1 + operand_len(b);
    }
    bytes[..i.min(bytes.len())].to_vec()
}

fn read_instruments(data: &[u8], layout: &Layout) -> Vec<Instrument> {
    (0..layout.volume_count)
        .map(|i| {
            let id = i as u16 + 1;
            let name = format!("Volseq {id}");
            let header = table_entry(data, layout.volume_table, i)
                .and_then(|at| data.get(at..at + VOLSEQ_HEADER).map(|h| (at, h)));
            let Some((at, h)) = header else {
                warn!("Hippel COSO: volume sequence {i} outside the file");
                return Instrument::placeholder(id, &name);
            };

            let volume_sequence =
                read_sequence(data, at + VOLSEQ_HEADER, |b| (SEQ_END..=0xE7).contains(&b));
            let frequency_sequence = if (h[1] as usize) < layout.frequency_count {
                table_entry(data, layout.frequency_table, h[1] as usize)
                    .map(|at| read_sequence(data, at, |b| b == SEQ_END))
                    .unwrap_or_default()
            } else {
                warn!("Hippel COSO: volume sequence {i} uses missing frequency sequence {}", h[1]);
                Vec::new()
            };
            let volume = volume_sequence
                .iter()
                .copied()
                .find(|&b| b < SEQ_LOOP)
                .unwrap_or(64)
                .min(64);
            let waveform =
                first_wave(&frequency_sequence).and_then(|s| sample_waveform(data, layout, s));

            Instrument::new(
                id,
                &name,
                InstrumentConfig::FutureComposer(FutureComposerConfig {
                    volume,
                    speed: h[0],
                    frequency_macro: h[1],
                    vibrato_speed: h[2],
                    vibrato_depth: h[3],
                    vibrato_delay: h[4],
                    volume_sequence,
                    frequency_sequence,
                    waveform,
                }),
            )
        })
        .collect()
}

/// Sample header: data offset, length in words, loop start in bytes and
/// loop length in words.
fn sample_waveform(data: &[u8], layout: &Layout, index: u8) -> Option<Waveform> {
    let index = index as usize;
    if index >= layout.sample_count {
        return None;
    }
    let raw = data
        .slice_at(layout.sample_headers + index * SAMPLE_HEADER_SIZE, SAMPLE_HEADER_SIZE)
        .ok()?;
    let offset = raw.u32be_at(0).ok()? as usize;
    let length = raw.u16be_at(4).ok()? as usize * 2;
    let loop_start = raw.u16be_at(6).ok()? as u32;
    let loop_words = raw.u16be_at(8).ok()? as u32;
    let loop_points = (loop_words > 1).then_some((loop_start, loop_start + loop_words * 2));
    read_waveform(data, layout.sample_data + offset, length, loop_points)
}
