//! SoundFX 1.3 (15 samples, `SONG` tag).

use log::warn;
use mg_ir::{period, Cell, Note, PlaybackFormat, Song};

use super::{load_standalone, require_len};
use crate::assembler::SongBuilder;
use crate::cursor::{parse_string, BinaryRead};
use crate::effect_parser;
use crate::extractor::{extract_all, SampleRecord};
use crate::normalizer::Grid;
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const NUM_SAMPLES: usize = 15;
const TAG_OFFSET: usize = 60;
const DELAY_OFFSET: usize = 64;
const SAMPLE_HEADERS: usize = 80;
const SONG_LENGTH_OFFSET: usize = 530;
const RESTART_OFFSET: usize = 531;
const ORDER_OFFSET: usize = 532;
const PATTERN_OFFSET: usize = 660;
const PATTERN_SIZE: usize = 64 * 4 * 4;
/// CIA delay that plays at 125 BPM.
const STANDARD_DELAY: u32 = 14565;

const PERIOD_CUT: u16 = 0xFFFE;
const PERIOD_SKIP: u16 = 0xFFFD;

pub struct SoundFx;

impl Loader for SoundFx {
    fn id(&self) -> &'static str {
        "sfx"
    }

    fn name(&self) -> &'static str {
        "SoundFX"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["sfx"],
            prefixes: &["sfx"],
            required: false,
        }
    }

    fn min_size(&self) -> usize {
        PATTERN_OFFSET
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        if &data[TAG_OFFSET..TAG_OFFSET + 4] != b"SONG" {
            return None;
        }
        let song_length = data[SONG_LENGTH_OFFSET] as usize;
        if !(1..=128).contains(&song_length) {
            return None;
        }
        if data[ORDER_OFFSET..ORDER_OFFSET + song_length].iter().any(|&p| p >= 128) {
            return None;
        }
        Some(3)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_sfx(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&SoundFx, data)
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("SoundFX", data, PATTERN_OFFSET)?;

    let delay = data.u16be_at(DELAY_OFFSET)? as u32;
    let tempo = if delay == 0 {
        125
    } else {
        (STANDARD_DELAY * 125 / delay).clamp(32, 255) as u8
    };

    let mut records = Vec::with_capacity(NUM_SAMPLES);
    for i in 0..NUM_SAMPLES {
        let length = data.u32be_at(i * 4)? as usize;
        let h = SAMPLE_HEADERS + i * 30;
        let volume = data.u16be_at(h + 24)?.min(64) as u8;
        let loop_start = data.u16be_at(h + 26)? as u32;
        let loop_words = data.u16be_at(h + 28)? as u32;
        records.push(SampleRecord {
            name: parse_string(&data[h..h + 22]),
            length,
            loop_points: (loop_words > 1).then(|| (loop_start, loop_start + loop_words * 2)),
            sample_rate: period::BASE_RATE,
            volume,
            ..Default::default()
        });
    }

    let song_length = data[SONG_LENGTH_OFFSET].clamp(1, 128) as usize;
    let order: Vec<u16> = data[ORDER_OFFSET..ORDER_OFFSET + song_length]
        .iter()
        .map(|&p| p as u16)
        .collect();
    let num_patterns = order.iter().copied().max().unwrap_or(0) as usize + 1;

    let mut patterns = Vec::with_capacity(num_patterns);
    for idx in 0..num_patterns {
        let offset = PATTERN_OFFSET + idx * PATTERN_SIZE;
        let Some(bytes) = data.get(offset..offset + PATTERN_SIZE) else {
            warn!("SoundFX: pattern {idx} truncated");
            break;
        };
        patterns.push(parse_pattern(bytes));
    }

    let mut offset = PATTERN_OFFSET + num_patterns * PATTERN_SIZE;
    for record in &mut records {
        record.offset = offset;
        offset += record.length;
    }

    Ok(SongBuilder::new("sfx", PlaybackFormat::Mod, 4)
        .patterns(patterns)
        .instruments(extract_all(&records, data))
        .order(order)
        .restart(data[RESTART_OFFSET] as u16)
        .speed(6)
        .tempo(tempo)
        .original_counts(4, num_patterns as u16, NUM_SAMPLES as u16)
        .build(ctx))
}

fn parse_pattern(data: &[u8]) -> Grid {
    (0..4)
        .map(|ch| {
            (0..64)
                .map(|row| {
                    let o = (row * 4 + ch) * 4;
                    parse_cell(&data[o..o + 4])
                })
                .collect()
        })
        .collect()
}

fn parse_cell(b: &[u8]) -> Cell {
    let raw = u16::from_be_bytes([b[0], b[1]]);
    match raw {
        PERIOD_SKIP => Cell::empty(),
        PERIOD_CUT => Cell {
            note: Note::Off,
            ..Cell::empty()
        },
        _ => Cell {
            note: period::period_to_note(raw & 0x0FFF),
            instrument: (b[0] & 0xF0) | (b[2] >> 4),
            effect: effect_parser::soundfx(b[2] & 0x0F, b[3]),
            ..Cell::empty()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_ir::{Effect, InstrumentConfig};

    fn make_minimal_sfx() -> Vec<u8> {
        let mut data = vec![0u8; PATTERN_OFFSET + PATTERN_SIZE + 16];
        data[0..4].copy_from_slice(&16u32.to_be_bytes());
        data[TAG_OFFSET..TAG_OFFSET + 4].copy_from_slice(b"SONG");
        data[DELAY_OFFSET..DELAY_OFFSET + 2].copy_from_slice(&(STANDARD_DELAY as u16).to_be_bytes());
        data[SAMPLE_HEADERS..SAMPLE_HEADERS + 5].copy_from_slice(b"snare");
        data[SAMPLE_HEADERS + 25] = 40;
        data[SONG_LENGTH_OFFSET] = 1;
        // ch0 row0: sample 1, period 214, arpeggio 0x37
        let p = PATTERN_OFFSET;
        data[p..p + 4].copy_from_slice(&[0x00, 0xD6, 0x11, 0x37]);
        // ch1 row0: note cut
        data[p + 4..p + 8].copy_from_slice(&[0xFF, 0xFE, 0x00, 0x00]);
        data
    }

    #[test]
    fn parses_minimal_sfx() {
        let data = make_minimal_sfx();
        assert_eq!(SoundFx.probe(&data), Some(3));
        let song = load_sfx(&data).unwrap();

        assert_eq!(song.initial_tempo, 125);
        assert_eq!(song.instruments.len(), 15);
        let c0 = song.patterns[0].cell(0, 0);
        assert_eq!(c0.note, Note::On(60));
        assert_eq!(c0.instrument, 1);
        assert_eq!(c0.effect, Effect::Arpeggio { x: 3, y: 7 });
        assert_eq!(song.patterns[0].cell(0, 1).note, Note::Off);

        match &song.instruments[0].config {
            InstrumentConfig::Sampler(s) => {
                assert_eq!(s.data.len(), 16);
                assert_eq!(s.volume, 40);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_tag() {
        let mut data = make_minimal_sfx();
        data[TAG_OFFSET] = b'X';
        assert!(SoundFx.probe(&data).is_none());
    }
}
