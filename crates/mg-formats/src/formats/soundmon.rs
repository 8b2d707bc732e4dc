//! Brian Postma's SoundMon 1.x (`BPSM`) and 2.x/3.x (`V.2`, `V.3`).

use log::warn;
use mg_ir::{
    Cell, Instrument, InstrumentConfig, Note, PlaybackFormat, Song, SoundMonConfig,
    SoundMonModulator,
};

use super::{load_standalone, require_len};
use crate::assembler::SongBuilder;
use crate::cursor::{parse_string, BinaryRead};
use crate::effect_parser;
use crate::extractor::{extract_sampler, read_waveform, SampleRecord};
use crate::normalizer::Grid;
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const ID_OFFSET: usize = 26;
const STEPS_OFFSET: usize = 30;
const INSTRUMENTS: usize = 32;
const NUM_INSTRUMENTS: usize = 15;
const INSTRUMENT_SIZE: usize = 32;
const STEP_DATA: usize = 512;
const STEP_SIZE: usize = 16;
const ROWS: usize = 16;
const PATTERN_SIZE: usize = ROWS * 3;
const TABLE_SIZE: usize = 64;
const SYNTH: u8 = 0xFF;

/// Number of synth tables, or `None` if the id is unknown.
fn table_count(data: &[u8]) -> Option<usize> {
    match &data[ID_OFFSET..ID_OFFSET + 4] {
        b"BPSM" => Some(0),
        [b'V', b'.', b'2' | b'3', n] => Some(*n as usize),
        _ => None,
    }
}

pub struct SoundMon;

impl Loader for SoundMon {
    fn id(&self) -> &'static str {
        "bp"
    }

    fn name(&self) -> &'static str {
        "SoundMon"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["bp", "bp3"],
            prefixes: &["bp"],
            required: false,
        }
    }

    fn min_size(&self) -> usize {
        STEP_DATA
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        table_count(data)?;
        (data.u16be_at(STEPS_OFFSET).ok()? > 0).then_some(3)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_soundmon(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&SoundMon, data)
}

#[derive(Clone, Copy, Debug)]
struct Voice {
    /// 1-based
    pattern: u16,
    sound_transpose: i8,
    transpose: i8,
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("SoundMon", data, STEP_DATA)?;
    let tables = table_count(data).unwrap_or(0);
    let num_steps = data.u16be_at(STEPS_OFFSET)? as usize;

    let mut steps: Vec<[Voice; 4]> = Vec::with_capacity(num_steps);
    for s in 0..num_steps {
        let base = STEP_DATA + s * STEP_SIZE;
        let Ok(raw) = data.slice_at(base, STEP_SIZE) else {
            warn!("SoundMon: step table truncated at step {s}");
            break;
        };
        steps.push(core::array::from_fn(|v| Voice {
            pattern: u16::from_be_bytes([raw[v * 4], raw[v * 4 + 1]]),
            sound_transpose: raw[v * 4 + 2] as i8,
            transpose: raw[v * 4 + 3] as i8,
        }));
    }

    let num_patterns = steps
        .iter()
        .flatten()
        .map(|v| v.pattern as usize)
        .max()
        .unwrap_or(0);
    let pattern_base = STEP_DATA + num_steps * STEP_SIZE;
    let patterns: Vec<Grid> = steps
        .iter()
        .map(|voices| {
            voices
                .iter()
                .map(|voice| read_voice(data, pattern_base, voice))
                .collect()
        })
        .collect();

    let table_base = pattern_base + num_patterns * PATTERN_SIZE;
    let mut sample_offset = table_base + tables * TABLE_SIZE;
    let instruments = (0..NUM_INSTRUMENTS)
        .map(|i| {
            let id = i as u16 + 1;
            let raw = &data[INSTRUMENTS + i * INSTRUMENT_SIZE..INSTRUMENTS + (i + 1) * INSTRUMENT_SIZE];
            if raw[0] == SYNTH {
                synth_instrument(id, raw, data, table_base, tables)
            } else {
                let record = sample_record(raw, sample_offset);
                sample_offset += record.length;
                extract_sampler(id, &record, data)
            }
        })
        .collect();

    Ok(SongBuilder::new("bp", PlaybackFormat::SoundMon, 4)
        .name(parse_string(&data[..ID_OFFSET]))
        .patterns(patterns)
        .instruments(instruments)
        .speed(6)
        .tempo(125)
        .original_counts(4, num_patterns as u16, NUM_INSTRUMENTS as u16)
        .build(ctx))
}

fn read_voice(data: &[u8], pattern_base: usize, voice: &Voice) -> Vec<Cell> {
    let mut cells = vec![Cell::empty(); ROWS];
    if voice.pattern == 0 {
        return cells;
    }
    let start = pattern_base + (voice.pattern as usize - 1) * PATTERN_SIZE;
    let Ok(bytes) = data.slice_at(start, PATTERN_SIZE) else {
        warn!("SoundMon: pattern {} truncated", voice.pattern);
        return cells;
    };
    for (cell, raw) in cells.iter_mut().zip(bytes.chunks_exact(3)) {
        let note = raw[0] as i8;
        let sample = raw[1] >> 4;
        if note != 0 {
            cell.note = Note::clamped(36 + note as i32 - 1 + voice.transpose as i32);
        }
        if sample != 0 {
            cell.instrument = (sample as i32 + voice.sound_transpose as i32).clamp(1, 15) as u8;
        }
        cell.effect = effect_parser::soundmon(raw[1] & 0x0F, raw[2] as i8);
    }
    cells
}

fn be16(raw: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([raw[at], raw[at + 1]])
}

fn sample_record(raw: &[u8], offset: usize) -> SampleRecord {
    let length = be16(raw, 24) as usize * 2;
    let loop_start = be16(raw, 26) as u32;
    let loop_words = be16(raw, 28) as u32;
    SampleRecord {
        name: parse_string(&raw[..24]),
        offset,
        length,
        loop_points: (loop_words > 1).then_some((loop_start, loop_start + loop_words * 2)),
        volume: be16(raw, 30).min(64) as u8,
        ..Default::default()
    }
}

fn synth_instrument(id: u16, raw: &[u8], data: &[u8], table_base: usize, tables: usize) -> Instrument {
    let wave_table = raw[1];
    let wave_length = be16(raw, 2) * 2;
    let waveform = if (wave_table as usize) < tables {
        let length = (wave_length as usize).clamp(2, TABLE_SIZE);
        read_waveform(
            data,
            table_base + wave_table as usize * TABLE_SIZE,
            length,
            Some((0, length as u32)),
        )
    } else {
        warn!("SoundMon: synth {id} uses missing table {wave_table}");
        None
    };

    Instrument::new(
        id,
        &format!("Synth {id}"),
        InstrumentConfig::SoundMon(SoundMonConfig {
            volume: raw[29].min(64),
            wave_table,
            wave_length,
            adsr: SoundMonModulator {
                control: raw[4],
                table: raw[5],
                length: be16(raw, 6),
                speed: raw[8],
                ..Default::default()
            },
            lfo: SoundMonModulator {
                control: raw[9],
                table: raw[10],
                depth: raw[11],
                length: be16(raw, 12),
                delay: raw[14],
                speed: raw[15],
            },
            eg: SoundMonModulator {
                control: raw[16],
                table: raw[17],
                length: be16(raw, 18),
                delay: raw[20],
                speed: raw[21],
                ..Default::default()
            },
            modulation: SoundMonModulator {
                control: raw[25],
                table: raw[26],
                speed: raw[27],
                delay: raw[28],
                length: be16(raw, 30),
                ..Default::default()
            },
            fx_control: raw[22],
            fx_speed: raw[23],
            fx_delay: raw[24],
            waveform,
        }),
    )
}
