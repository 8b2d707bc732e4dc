//! Fred Editor modules, stored as the relocatable replay binary.
//!
//! Table addresses are recovered by scanning the player code. Songs whose
//! code doesn't match the known routine still import as metadata-only.

use log::{debug, warn};
use mg_ir::{
    period, Effect, FredConfig, FredSynthType, Instrument, InstrumentConfig, Note, PlaybackFormat, Song,
};

use super::{load_standalone, placeholder_instruments, require_len};
use crate::assembler::SongBuilder;
use crate::cursor::{BinaryRead, ByteCursor};
use crate::extractor::{extract_sampler, read_waveform, SampleRecord};
use crate::normalizer::{normalize, slice_columns, StreamEvent};
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::scanner::{op, scan_all, OpcodeRule, Operand, ScanWindow};
use crate::FormatError;

const JMP_PC: u16 = 0x4EFA;
const SCAN_WINDOW: ScanWindow = ScanWindow::new(16, 1024);

/// `MOVE.B d16(PC),D1; CMP.B D1,D0`: PC target is `data + 0x895`
const DATA_POINTER: OpcodeRule = OpcodeRule {
    name: "fred data pointer",
    pattern: &[op(0, 0x123A), op(4, 0xB001)],
    operand: Operand::PcRelative16 { at: 2 },
};

/// `MOVE.L A2,d16(A0); LEA d16(PC),A3`: PC target is the module base
const BASE_POINTER: OpcodeRule = OpcodeRule {
    name: "fred base pointer",
    pattern: &[op(0, 0x214A), op(4, 0x47FA)],
    operand: Operand::PcRelative16 { at: 6 },
};

const SONG_COUNT: usize = 0x895;
const SPEEDS: usize = 0x897;
const SAMPLE_TABLE: usize = 0x8A2;
const PATTERN_DATA: usize = 0x8A6;
const TRACK_TABLE: usize = 0x8AA;

const RECORD_SIZE: usize = 64;
const MAX_INSTRUMENTS: usize = 128;
const MAX_TRACK_ENTRIES: usize = 256;
const TRACK_END: u16 = 0x8000;

pub struct FredEditor;

impl Loader for FredEditor {
    fn id(&self) -> &'static str {
        "fred"
    }

    fn name(&self) -> &'static str {
        "Fred Editor"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["fred"],
            prefixes: &["fred"],
            required: true,
        }
    }

    fn min_size(&self) -> usize {
        16
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        (0..4)
            .all(|i| data.u16be_at(i * 4).is_ok_and(|w| w == JMP_PC))
            .then_some(3)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_fred(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&FredEditor, data)
}

/// Absolute offsets recovered from the player code.
#[derive(Debug, Clone, Copy)]
struct Pointers {
    data: usize,
    base: usize,
}

fn locate(data: &[u8]) -> Option<Pointers> {
    match scan_all(data, SCAN_WINDOW, &[DATA_POINTER, BASE_POINTER]) {
        Ok(hits) => Some(Pointers {
            data: (hits[0].value as usize).checked_sub(SONG_COUNT)?,
            base: hits[1].value as usize,
        }),
        Err(failure) => {
            warn!("Fred Editor: {failure}, importing metadata only");
            None
        }
    }
}

/// Header fields and the absolute table offsets they resolve to.
#[derive(Debug)]
struct Tables {
    songs: usize,
    speed: u8,
    sample_table: usize,
    pattern_data: usize,
    /// Start of each channel's track list
    track_lists: [usize; 4],
}

fn read_tables(data: &[u8], ptr: Pointers) -> Result<Tables, FormatError> {
    let relative = |at: usize| -> Result<usize, FormatError> {
        Ok(ptr.base + data.u32be_at(ptr.data + at)? as usize)
    };
    let sample_table = relative(SAMPLE_TABLE)?;
    let pattern_data = relative(PATTERN_DATA)?;
    let track_table = relative(TRACK_TABLE)?;
    let mut track_lists = [0; 4];
    for (ch, list) in track_lists.iter_mut().enumerate() {
        *list = track_table + data.u16be_at(track_table + ch * 2)? as usize;
    }
    Ok(Tables {
        songs: data.u8_at(ptr.data + SONG_COUNT)? as usize + 1,
        speed: data.u8_at(ptr.data + SPEEDS)?.max(1),
        sample_table,
        pattern_data,
        track_lists,
    })
}

fn metadata_only(builder: SongBuilder, ctx: &DecodeContext) -> Song {
    builder
        .instruments(placeholder_instruments(1, "Instrument"))
        .original_counts(4, 0, 0)
        .build(ctx)
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("Fred Editor", data, 16)?;
    let builder = SongBuilder::new("fred", PlaybackFormat::Fred, 4);

    let Some(ptr) = locate(data) else {
        return Ok(metadata_only(builder, ctx));
    };
    debug!("Fred Editor: data at {:#x}, base at {:#x}", ptr.data, ptr.base);

    let tables = match read_tables(data, ptr) {
        Ok(tables) => tables,
        Err(e) => {
            warn!("Fred Editor: song tables unreadable ({e}), importing metadata only");
            return Ok(metadata_only(builder, ctx));
        }
    };
    let Tables { songs, speed, sample_table, pattern_data, track_lists } = tables;
    debug!("Fred Editor: {songs} songs, importing the first");

    let max_rows = ctx.options.max_rows_per_channel;
    let mut columns = Vec::with_capacity(4);
    for (ch, &list) in track_lists.iter().enumerate() {
        let events = channel_events(data, list, pattern_data, speed);
        let column = normalize(&events, speed as u32, max_rows);
        if column.truncated {
            warn!("Fred Editor: channel {ch} cut at {max_rows} rows");
        }
        columns.push(column.cells);
    }

    let count = if pattern_data > sample_table {
        ((pattern_data - sample_table) / RECORD_SIZE).min(MAX_INSTRUMENTS)
    } else {
        warn!("Fred Editor: sample table follows pattern data, reading one record");
        1
    };
    let instruments: Vec<Instrument> = (0..count)
        .map(|i| {
            let id = i as u16 + 1;
            match data.slice_at(sample_table + i * RECORD_SIZE, RECORD_SIZE) {
                Ok(raw) => read_instrument(id, raw, data, ptr.base),
                Err(_) => Instrument::placeholder(id, ""),
            }
        })
        .collect();

    Ok(builder
        .patterns(slice_columns(&columns, ctx.options.rows_per_pattern))
        .instruments(instruments)
        .speed(speed)
        .tempo(125)
        .original_counts(4, 0, count as u16)
        .build(ctx))
}

/// Walk one channel's track list and decode every pattern it names.
fn channel_events(data: &[u8], list: usize, pattern_data: usize, speed: u8) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    let mut speed = speed;
    for i in 0..MAX_TRACK_ENTRIES {
        let Ok(entry) = data.u16be_at(list + i * 2) else {
            warn!("Fred Editor: track list runs off the end");
            break;
        };
        if entry & TRACK_END != 0 {
            break;
        }
        let Ok(mut cur) = ByteCursor::at(data, pattern_data + entry as usize) else {
            warn!("Fred Editor: pattern at {entry:#x} outside the file");
            break;
        };
        pattern_events(&mut cur, &mut speed, &mut events);
    }
    events.push(StreamEvent::End);
    events
}

fn pattern_events(cur: &mut ByteCursor<'_>, speed: &mut u8, events: &mut Vec<StreamEvent>) {
    let mut rows = 1u32;
    while let Ok(b) = cur.read_u8() {
        let ticks = rows * *speed as u32;
        match b {
            0x00 => events.push(StreamEvent::Note { note: Note::None, duration: ticks }),
            0x01..=0x7F => events.push(StreamEvent::Note {
                note: Note::clamped(24 + b as i32 - 1),
                duration: ticks,
            }),
            0x80 => return,
            0x81 => {
                // speed, target note, slide time in ticks
                let (Ok(porta), Ok(note), Ok(_)) = (cur.read_u8(), cur.read_u8(), cur.read_u8())
                else {
                    return;
                };
                events.push(StreamEvent::Effect(Effect::TonePorta(porta)));
                events.push(StreamEvent::Note {
                    note: Note::clamped(24 + note as i32 - 1),
                    duration: ticks,
                });
            }
            0x82 => {
                let Ok(s) = cur.read_u8() else { return };
                *speed = s.max(1);
                events.push(StreamEvent::Speed(*speed));
            }
            0x83 => {
                let Ok(i) = cur.read_u8() else { return };
                events.push(StreamEvent::Instrument(i.saturating_add(1)));
            }
            0x84 => events.push(StreamEvent::Note { note: Note::Off, duration: ticks }),
            _ => rows = (b as i8).unsigned_abs() as u32,
        }
    }
}

fn read_instrument(id: u16, raw: &[u8], data: &[u8], base: usize) -> Instrument {
    let be16 = |at: usize| u16::from_be_bytes([raw[at], raw[at + 1]]);
    let pointer = base + u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    let loop_ptr = be16(4) as i16;
    let length = be16(6) as usize * 2;
    let relative = be16(8);
    let envelope_volume = raw[14].min(64);
    let name = format!("Instrument {id}");

    let synth_type = match raw[39] {
        0 => {
            let rate = if relative > 0 {
                period::BASE_RATE * 1024 / relative as u32
            } else {
                period::BASE_RATE
            };
            let record = SampleRecord {
                name,
                offset: pointer,
                length,
                loop_points: (loop_ptr >= 0).then_some((loop_ptr as u32, length as u32)),
                sample_rate: rate,
                volume: envelope_volume,
                ..Default::default()
            };
            return extract_sampler(id, &record, data);
        }
        1 => FredSynthType::Pulse,
        2 => FredSynthType::Blend,
        other => {
            warn!("Fred Editor: instrument {id} has unknown type {other}");
            return Instrument::placeholder(id, &name);
        }
    };

    let mut arpeggio = [0i8; 16];
    for (dst, &src) in arpeggio.iter_mut().zip(&raw[22..38]) {
        *dst = src as i8;
    }
    let waveform = read_waveform(data, pointer, length.max(2), Some((0, length.max(2) as u32)));

    Instrument::new(
        id,
        &name,
        InstrumentConfig::Fred(FredConfig {
            synth_type,
            relative,
            vibrato_delay: raw[10],
            vibrato_speed: raw[12],
            vibrato_depth: raw[13],
            envelope_volume,
            attack_speed: raw[15],
            attack_volume: raw[16],
            decay_speed: raw[17],
            decay_volume: raw[18],
            sustain_time: raw[19],
            release_speed: raw[20],
            release_volume: raw[21],
            arpeggio,
            arpeggio_speed: raw[38],
            arpeggio_limit: raw[51],
            pulse_rate_neg: raw[40] as i8,
            pulse_rate_pos: raw[41],
            pulse_speed: raw[42],
            pulse_pos_low: raw[43],
            pulse_pos_high: raw[44],
            pulse_delay: raw[45],
            blend_rate: raw[47],
            blend_delay: raw[48],
            waveform,
        }),
    )
}
