//! David Whittaker modules: a position-independent replayer followed by
//! its song and sample tables.
//!
//! There is no header. The player is recognized by its DMA setup and the
//! tables are found by scanning for the instructions that load them. A
//! missing table degrades to a metadata-only import.

use log::{debug, warn};
use mg_ir::{
    period, DavidWhittakerConfig, Instrument, InstrumentConfig, Note, PlaybackFormat, Song,
    Waveform,
};

use super::{load_standalone, placeholder_instruments, require_len};
use crate::assembler::SongBuilder;
use crate::cursor::{BinaryRead, ByteCursor};
use crate::extractor::validate_loop;
use crate::normalizer::{normalize, slice_columns, StreamEvent};
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::scanner::{op, op_masked, scan, OpcodeRule, Operand, ScanWindow};
use crate::FormatError;

const SCAN_WINDOW: ScanWindow = ScanWindow::new(0, 2048);
const MAX_SEQUENCE: usize = 256;
const SEQUENCE_END: u16 = 0xFFFF;
const DEFAULT_SPEED: u8 = 6;

/// `MOVE.W #imm,$DFF096`: DMA control write at player init
const DMA_SETUP: OpcodeRule = OpcodeRule {
    name: "dw dma setup",
    pattern: &[op(0, 0x33FC), op(4, 0x00DF), op(6, 0xF096)],
    operand: Operand::Immediate16 { at: 2 },
};

/// `LEA d16(PC),A3; MOVEQ #n,D7`: D7 is the sample count minus one
const SAMPLE_TABLE: OpcodeRule = OpcodeRule {
    name: "dw sample table",
    pattern: &[op(0, 0x47FA), op_masked(4, 0x7E00, 0xFF00)],
    operand: Operand::PcRelative16 { at: 2 },
};

/// `LEA d16(PC),A2; MOVEQ #3,D0`: speed word and four voice sequences
const SONG_TABLE: OpcodeRule = OpcodeRule {
    name: "dw song table",
    pattern: &[op(0, 0x45FA), op(4, 0x7003)],
    operand: Operand::PcRelative16 { at: 2 },
};

pub struct DavidWhittaker;

impl Loader for DavidWhittaker {
    fn id(&self) -> &'static str {
        "dw"
    }

    fn name(&self) -> &'static str {
        "David Whittaker"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["dw", "dwold"],
            prefixes: &["dw", "dwold"],
            required: true,
        }
    }

    fn min_size(&self) -> usize {
        32
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        scan(data, SCAN_WINDOW, &DMA_SETUP).map(|_| 2)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_david_whittaker(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&DavidWhittaker, data)
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("David Whittaker", data, 32)?;
    let Some(init) = scan(data, SCAN_WINDOW, &DMA_SETUP) else {
        return Err(FormatError::InvalidHeader {
            format: "David Whittaker",
            reason: format!("opcode pattern '{}' not found", DMA_SETUP.name),
        });
    };
    debug!("David Whittaker: player init at {:#x}", init.at);

    let instruments = match scan(data, SCAN_WINDOW, &SAMPLE_TABLE) {
        Some(hit) => {
            let count = data.u8_at(hit.at + 5)? as usize + 1;
            debug!("David Whittaker: {count} samples at {:#x}", hit.value);
            read_samples(data, hit.value as usize, count)
        }
        None => {
            warn!("David Whittaker: opcode pattern '{}' not found", SAMPLE_TABLE.name);
            Vec::new()
        }
    };
    let stored = instruments.len() as u16;
    let instruments = if instruments.is_empty() {
        placeholder_instruments(1, "Sample")
    } else {
        instruments
    };

    let builder = SongBuilder::new("dw", PlaybackFormat::DavidWhittaker, 4);
    let Some(song) = scan(data, SCAN_WINDOW, &SONG_TABLE) else {
        warn!(
            "David Whittaker: opcode pattern '{}' not found, importing metadata only",
            SONG_TABLE.name
        );
        return Ok(builder.instruments(instruments).original_counts(4, 0, stored).build(ctx));
    };
    let table = song.value as usize;
    let speed = data.u16be_at(table).map_or(DEFAULT_SPEED, |s| (s as u8).clamp(1, 31));
    debug!("David Whittaker: song table at {table:#x}, speed {speed}");

    let max_rows = ctx.options.max_rows_per_channel;
    let mut columns = Vec::with_capacity(4);
    let mut patterns_seen = 0usize;
    for voice in 0..4 {
        let events = match data.u16be_at(table + 2 + voice * 2) {
            Ok(sequence) => voice_events(data, sequence as usize, speed, &mut patterns_seen),
            Err(_) => {
                warn!("David Whittaker: voice {voice} sequence pointer truncated");
                vec![StreamEvent::End]
            }
        };
        let column = normalize(&events, speed as u32, max_rows);
        if column.truncated {
            warn!("David Whittaker: voice {voice} cut at {max_rows} rows");
        }
        columns.push(column.cells);
    }

    Ok(builder
        .patterns(slice_columns(&columns, ctx.options.rows_per_pattern))
        .instruments(instruments)
        .speed(speed)
        .tempo(125)
        .original_counts(4, patterns_seen as u16, stored)
        .build(ctx))
}

/// Follow one voice's sequence of pattern offsets.
fn voice_events(data: &[u8], sequence: usize, speed: u8, seen: &mut usize) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    let mut speed = speed;
    for i in 0..MAX_SEQUENCE {
        let Ok(entry) = data.u16be_at(sequence + i * 2) else {
            warn!("David Whittaker: sequence at {sequence:#x} runs off the end");
            break;
        };
        if entry == 0 || entry == SEQUENCE_END {
            break;
        }
        let Ok(mut cur) = ByteCursor::at(data, entry as usize) else {
            warn!("David Whittaker: pattern at {entry:#x} outside the file");
            break;
        };
        *seen += 1;
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
                note: Note::clamped(36 + b as i32 - 1),
                duration: ticks,
            }),
            0x80..=0x9F => rows = (b & 0x1F) as u32 + 1,
            0xA0..=0xDF => events.push(StreamEvent::Instrument(b - 0xA0 + 1)),
            0xE0 => {
                let Ok(v) = cur.read_u8() else { return };
                events.push(StreamEvent::Volume(v.min(64)));
            }
            0xE1 => {
                let Ok(s) = cur.read_u8() else { return };
                *speed = s.clamp(1, 31);
                events.push(StreamEvent::Speed(*speed));
            }
            0xE2 => events.push(StreamEvent::Note { note: Note::Off, duration: ticks }),
            0xFF => return,
            _ => debug!("David Whittaker: skipping command {b:#04x}"),
        }
    }
}

/// Sequential records: header followed directly by its PCM.
fn read_samples(data: &[u8], table: usize, count: usize) -> Vec<Instrument> {
    let Ok(mut cur) = ByteCursor::at(data, table) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let id = i as u16 + 1;
        match read_sample(&mut cur, id) {
            Ok(inst) => out.push(inst),
            Err(e) => {
                warn!("David Whittaker: sample {id}: {e}");
                break;
            }
        }
    }
    out
}

fn read_sample(cur: &mut ByteCursor<'_>, id: u16) -> Result<Instrument, FormatError> {
    let length = cur.read_u32_be()? as usize;
    let loop_offset = cur.read_u32_be()? as i32;
    let rate = cur.read_u16_be()?;
    let volume = cur.read_u16_be()?.min(64) as u8;
    let pcm = cur.read_bytes(length.min(cur.remaining()))?;
    let name = format!("Sample {id}");
    if pcm.is_empty() {
        return Ok(Instrument::placeholder(id, &name));
    }

    let frames = pcm.len() as u32;
    let loop_range = u32::try_from(loop_offset)
        .ok()
        .and_then(|start| validate_loop(start, frames, frames));
    let (sample_rate, relative) = match rate {
        0 => (period::BASE_RATE, 0),
        r => (r as u32, (period::NTSC_CLOCK / r as u32).min(u16::MAX as u32) as u16),
    };

    Ok(Instrument::new(
        id,
        &name,
        InstrumentConfig::DavidWhittaker(DavidWhittakerConfig {
            volume,
            relative,
            sample_rate,
            waveform: Waveform {
                data: pcm.iter().map(|&b| b as i8).collect(),
                loop_range,
            },
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_ir::{Effect, SynthKind};

    const SONG: usize = 0x40;
    const SAMPLES: usize = 0x80;

    fn put(buf: &mut [u8], at: usize, words: &[u16]) {
        for (i, w) in words.iter().enumerate() {
            buf[at + i * 2..at + i * 2 + 2].copy_from_slice(&w.to_be_bytes());
        }
    }

    /// Player stub, song table at `SONG`, two patterns, two samples.
    fn make_minimal_dw() -> Vec<u8> {
        let mut data = vec![0u8; SAMPLES];
        put(&mut data, 0, &[0x6000, 0x000E]);
        put(&mut data, 16, &[0x33FC, 0x800F, 0x00DF, 0xF096]);
        put(&mut data, 24, &[0x47FA, (SAMPLES - 26) as u16, 0x7E01]);
        put(&mut data, 30, &[0x45FA, (SONG - 32) as u16, 0x7003]);

        // speed 3, voice 0 plays patterns at 0x54 and 0x5C, the rest are silent
        put(&mut data, SONG, &[3, 0x4C, 0x4A, 0x4A, 0x4A]);
        put(&mut data, 0x4A, &[0xFFFF]);
        put(&mut data, 0x4C, &[0x54, 0x5C, 0x0000]);
        data[0x54..0x5C].copy_from_slice(&[0xA0, 0xE0, 40, 0x81, 13, 0x80, 0x00, 0xFF]);
        data[0x5C..0x61].copy_from_slice(&[0xA1, 0xE1, 2, 0x19, 0xFF]);

        data.extend_from_slice(&[0, 0, 0, 4, 0xFF, 0xFF, 0xFF, 0xFF, 0x1F, 0x40, 0, 64]);
        data.extend_from_slice(&[1, 2, 3, 4]);
        data.extend_from_slice(&[0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 32]);
        data.extend_from_slice(&[0x80, 0x7F]);
        data
    }

    #[test]
    fn voice_streams_become_rows() {
        let data = make_minimal_dw();
        assert_eq!(DavidWhittaker.probe(&data), Some(2));
        let song = load_david_whittaker(&data).unwrap();

        assert_eq!(song.format, PlaybackFormat::DavidWhittaker);
        assert_eq!(song.initial_speed, 3);
        let p = &song.patterns[0];
        assert_eq!(p.cell(0, 0).note, Note::On(48));
        assert_eq!(p.cell(0, 0).instrument, 1);
        assert_eq!(p.cell(0, 0).volume, Some(40));
        assert!(p.cell(1, 0).is_empty());
        assert_eq!(p.cell(2, 0).note, Note::None);
        assert_eq!(p.cell(3, 0).note, Note::On(60));
        assert_eq!(p.cell(3, 0).instrument, 2);
        assert_eq!(p.cell(3, 0).effect, Effect::SetSpeed(2));
        assert!(p.cell(0, 1).is_empty());
    }

    #[test]
    fn sample_bank_reads_rates_and_loops() {
        let song = load_david_whittaker(&make_minimal_dw()).unwrap();
        assert_eq!(song.instruments.len(), 2);
        assert_eq!(song.instruments[0].kind(), SynthKind::DavidWhittaker);
        match &song.instruments[0].config {
            InstrumentConfig::DavidWhittaker(dw) => {
                assert_eq!(dw.sample_rate, 8000);
                assert_eq!(dw.relative, 447);
                assert_eq!(dw.waveform.data, vec![1, 2, 3, 4]);
                assert!(dw.waveform.loop_range.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        match &song.instruments[1].config {
            InstrumentConfig::DavidWhittaker(dw) => {
                assert_eq!(dw.volume, 32);
                assert_eq!(dw.sample_rate, period::BASE_RATE);
                assert_eq!(dw.waveform.loop_range.map(|l| (l.start, l.end)), Some((0, 2)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_song_table_keeps_samples() {
        let mut data = make_minimal_dw();
        data[30] = 0x4E;
        let song = load_david_whittaker(&data).unwrap();
        assert_eq!(song.patterns.len(), 1);
        assert!(song.patterns[0].is_blank());
        assert_eq!(song.instruments.len(), 2);
    }

    #[test]
    fn missing_sample_table_keeps_patterns() {
        let mut data = make_minimal_dw();
        data[24] = 0x4E;
        let song = load_david_whittaker(&data).unwrap();
        assert_eq!(song.instruments.len(), 2);
        assert!(song.instruments.iter().all(|i| i.is_placeholder()));
        assert_eq!(song.patterns[0].cell(0, 0).note, Note::On(48));
    }

    #[test]
    fn player_without_dma_setup_is_rejected() {
        let mut data = make_minimal_dw();
        data[20] = 0x01;
        assert!(DavidWhittaker.probe(&data).is_none());
        assert!(load_david_whittaker(&data).is_err());
    }
}
