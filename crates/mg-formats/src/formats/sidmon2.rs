//! SidMon II (`SIDMON II - THE MIDI VERSION`).
//!
//! Patterns are variable-length event streams rather than fixed grids.
//! Each song position plays one pattern per voice; the voices of a
//! position are normalized separately and padded to the longest one so
//! the channels stay in step.

use log::{debug, warn};
use mg_ir::{
    Cell, Effect, Instrument, InstrumentConfig, Note, PlaybackFormat, SidMon2Adsr, SidMon2Config,
    Song, Waveform,
};

use super::{load_standalone, require_len};
use crate::assembler::SongBuilder;
use crate::cursor::{parse_string, BinaryRead, ByteCursor};
use crate::effect_parser;
use crate::extractor::read_waveform;
use crate::normalizer::{append_aligned, normalize, slice_columns, StreamEvent};
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const ID: &[u8] = b"SIDMON II - THE MIDI VERSION";
const ID_OFFSET: usize = 58;
const DATA_OFFSET: usize = 90;
const INSTRUMENT_SIZE: usize = 32;
const SAMPLE_HEADER_SIZE: usize = 64;
const LIST_STRIDE: usize = 16;
const MAX_INSTRUMENTS: usize = 255;

pub struct SidMon2;

impl Loader for SidMon2 {
    fn id(&self) -> &'static str {
        "sid2"
    }

    fn name(&self) -> &'static str {
        "SidMon II"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["sid2", "smn"],
            prefixes: &["sid2", "smn"],
            required: false,
        }
    }

    fn min_size(&self) -> usize {
        DATA_OFFSET
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        (&data[ID_OFFSET..ID_OFFSET + ID.len()] == ID).then_some(5)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_sidmon2(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&SidMon2, data)
}

#[derive(Clone, Copy, Debug, Default)]
struct TrackStep {
    pattern: u8,
    transpose: i8,
    sound_transpose: i8,
}

#[derive(Clone, Debug)]
struct SampleHeader {
    name: String,
    length: usize,
    loop_start: u32,
    loop_length: u32,
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("SidMon II", data, DATA_OFFSET)?;
    let positions = data.u8_at(2)? as usize + 1;
    let speed = data.u8_at(3)?.max(1);
    let num_samples = data.u16be_at(4)? as usize / SAMPLE_HEADER_SIZE;
    let track_len = data.u32be_at(14)? as usize;
    let num_instruments = data.u32be_at(26)? as usize / INSTRUMENT_SIZE;
    let wave_size = data.u32be_at(30)? as usize;
    let arp_size = data.u32be_at(34)? as usize;
    let vib_size = data.u32be_at(38)? as usize;
    let pattern_size = data.u32be_at(50)? as usize;

    let mut cur = ByteCursor::at(data, DATA_OFFSET)?;
    let track_patterns = table(&mut cur, track_len, "track table");
    let transposes = table(&mut cur, track_len, "transpose table");
    let sound_transposes = table(&mut cur, track_len, "sound transpose table");
    let steps: Vec<TrackStep> = (0..track_patterns.len())
        .map(|i| TrackStep {
            pattern: track_patterns[i],
            transpose: transposes.get(i).map_or(0, |&t| t as i8),
            sound_transpose: sound_transposes.get(i).map_or(0, |&t| t as i8),
        })
        .collect();

    let instrument_table = table(&mut cur, num_instruments * INSTRUMENT_SIZE, "instrument table");
    let waves = table(&mut cur, wave_size, "wave lists");
    let arpeggios = table(&mut cur, arp_size, "arpeggio lists");
    let vibratos = table(&mut cur, vib_size, "vibrato lists");

    let samples: Vec<SampleHeader> = (0..num_samples)
        .map_while(|_| cur.read_bytes(SAMPLE_HEADER_SIZE).ok())
        .map(|raw| {
            let word = |at: usize| u16::from_be_bytes([raw[at], raw[at + 1]]) as u32 * 2;
            SampleHeader {
                name: parse_string(&raw[32..64]),
                length: word(4) as usize,
                loop_start: word(6),
                loop_length: word(8),
            }
        })
        .collect();
    if samples.len() < num_samples {
        warn!("SidMon II: {} of {num_samples} sample headers present", samples.len());
    }

    let num_patterns = steps.iter().map(|s| s.pattern as usize).max().map_or(0, |m| m + 1);
    let pointers: Vec<usize> = (0..num_patterns)
        .map_while(|_| cur.read_u16_be().ok())
        .map(usize::from)
        .collect();
    if pointers.len() < num_patterns {
        warn!("SidMon II: {} of {num_patterns} pattern pointers present", pointers.len());
    }
    let pattern_base = cur.position();
    let pattern_data = data
        .get(pattern_base..(pattern_base + pattern_size).min(data.len()))
        .unwrap_or_default();
    if pattern_data.len() < pattern_size {
        warn!("SidMon II: pattern data truncated");
    }
    let sample_base = (pattern_base + pattern_size + 1) & !1;
    debug!("SidMon II: {num_patterns} patterns, {num_samples} samples at {sample_base:#x}");

    // Channel-major track table: entry `ch * positions + pos`.
    let max_rows = ctx.options.max_rows_per_channel;
    let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); 4];
    let mut last_instrument = [0u8; 4];
    let mut duration = [0u8; 4];
    for pos in 0..positions {
        let block: Vec<Vec<Cell>> = (0..4)
            .map(|ch| {
                let Some(step) = steps.get(ch * positions + pos) else {
                    return Vec::new();
                };
                let mut events = vec![StreamEvent::Instrument(last_instrument[ch])];
                events.extend(parse_events(
                    pattern_slice(pattern_data, &pointers, step.pattern as usize),
                    step,
                    speed,
                    &mut duration[ch],
                    &mut last_instrument[ch],
                ));
                normalize(&events, speed as u32, max_rows).cells
            })
            .collect();
        append_aligned(&mut columns, block);
        if columns[0].len() as u32 >= max_rows {
            warn!("SidMon II: row cap reached at position {pos}");
            break;
        }
    }

    let patterns = slice_columns(&columns, ctx.options.rows_per_pattern);
    let mut instruments: Vec<Instrument> = instrument_table
        .chunks_exact(INSTRUMENT_SIZE)
        .enumerate()
        .map(|(i, raw)| {
            let config = instrument_config(raw, waves, arpeggios, vibratos, &samples, data, sample_base);
            Instrument::new(i as u16 + 1, &format!("Instrument {}", i + 1), InstrumentConfig::SidMon2(config))
        })
        .collect();
    for id in instruments.len() + 1..=num_instruments.min(MAX_INSTRUMENTS) {
        instruments.push(Instrument::placeholder(id as u16, &format!("Instrument {id}")));
    }

    Ok(SongBuilder::new("sid2", PlaybackFormat::SidMon2, 4)
        .patterns(patterns)
        .instruments(instruments)
        .speed(speed)
        .tempo(125)
        .original_counts(4, num_patterns as u16, num_instruments as u16)
        .build(ctx))
}

/// Up to `len` bytes of a header-sized table, warning when the file ends early.
fn table<'a>(cur: &mut ByteCursor<'a>, len: usize, what: &str) -> &'a [u8] {
    let bytes = cur.read_up_to(len);
    if bytes.len() < len {
        warn!("SidMon II: {what} truncated ({} of {len} bytes)", bytes.len());
    }
    bytes
}

/// Bytes of pattern `p`: from its pointer to the next higher one.
pub(super) fn pattern_slice<'a>(pattern_data: &'a [u8], pointers: &[usize], p: usize) -> &'a [u8] {
    let Some(&start) = pointers.get(p) else {
        return &[];
    };
    let end = pointers
        .iter()
        .copied()
        .filter(|&q| q > start)
        .min()
        .unwrap_or(pattern_data.len())
        .min(pattern_data.len());
    let start = start.min(end);
    &pattern_data[start..end]
}

/// Next byte, consumed only if it satisfies `pred`.
fn take_if(cur: &mut ByteCursor<'_>, pred: impl Fn(u8) -> bool) -> Option<u8> {
    cur.peek_u8().ok().filter(|&b| pred(b))?;
    cur.read_u8().ok()
}

/// Decode one pattern's bytes into normalizer events.
///
/// Grammar per row: an optional duration (negative byte, `!b` extra rows,
/// sticky), then `0` (no note) or a note `1..=111` optionally followed by an
/// instrument `1..=111`, or an effect `112..=127` with its parameter. A
/// note may also be followed by an effect.
fn parse_events(
    bytes: &[u8],
    step: &TrackStep,
    speed: u8,
    duration: &mut u8,
    last_instrument: &mut u8,
) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    let mut cur = ByteCursor::new(bytes);
    let is_plain = |b: u8| (1..112).contains(&b);
    let is_effect = |b: u8| (112..128).contains(&b);

    while let Ok(b) = cur.read_u8() {
        if (b as i8) < 0 {
            *duration = !b;
            continue;
        }
        let mut note = Note::None;
        let mut effect = Effect::None;
        if is_effect(b) {
            effect = effect_parser::sidmon2(b, cur.read_u8().unwrap_or(0));
        } else {
            if is_plain(b) {
                note = Note::clamped(24 + b as i32 - 1 + step.transpose as i32);
                if let Some(i) = take_if(&mut cur, is_plain) {
                    let inst = (i as i32 + step.sound_transpose as i32).clamp(1, 255) as u8;
                    *last_instrument = inst;
                    events.push(StreamEvent::Instrument(inst));
                }
            }
            if let Some(e) = take_if(&mut cur, is_effect) {
                effect = effect_parser::sidmon2(e, cur.read_u8().unwrap_or(0));
            }
        }
        if let Some(d) = take_if(&mut cur, |d| (d as i8) < 0) {
            *duration = !d;
        }
        events.push(StreamEvent::Effect(effect));
        events.push(StreamEvent::Note {
            note,
            duration: (*duration as u32 + 1) * speed as u32,
        });
    }
    events
}

/// Up to `len` entries of a 16-byte-strided list.
fn list_slice(table: &[u8], index: u8, len: u8) -> &[u8] {
    let start = (index as usize * LIST_STRIDE).min(table.len());
    let end = (start + len as usize + 1).min(table.len());
    &table[start..end]
}

fn instrument_config(
    raw: &[u8],
    waves: &[u8],
    arpeggios: &[u8],
    vibratos: &[u8],
    samples: &[SampleHeader],
    data: &[u8],
    sample_base: usize,
) -> SidMon2Config {
    let wave_list = list_slice(waves, raw[0], raw[1]).to_vec();
    let waveform = wave_list
        .first()
        .and_then(|&s| sample_waveform(samples, s as usize, data, sample_base));

    SidMon2Config {
        waves: wave_list,
        wave_speed: raw[2],
        wave_delay: raw[3],
        arpeggio: list_slice(arpeggios, raw[4], raw[5]).iter().map(|&b| b as i8).collect(),
        arpeggio_speed: raw[6],
        arpeggio_delay: raw[7],
        vibrato: list_slice(vibratos, raw[8], raw[9]).iter().map(|&b| b as i8).collect(),
        vibrato_speed: raw[10],
        vibrato_delay: raw[11],
        pitch_bend: raw[12] as i8,
        pitch_bend_delay: raw[13],
        adsr: SidMon2Adsr {
            attack_max: raw[16],
            attack_speed: raw[17],
            decay_min: raw[18],
            decay_speed: raw[19],
            sustain: raw[20],
            release_min: raw[21],
            release_speed: raw[22],
        },
        waveform,
    }
}

fn sample_waveform(samples: &[SampleHeader], index: usize, data: &[u8], base: usize) -> Option<Waveform> {
    let header = samples.get(index)?;
    let offset = base + samples[..index].iter().map(|s| s.length).sum::<usize>();
    let loop_points = (header.loop_length > 2)
        .then_some((header.loop_start, header.loop_start + header.loop_length));
    debug!("SidMon II: waveform from sample '{}'", header.name);
    read_waveform(data, offset, header.length, loop_points)
}
