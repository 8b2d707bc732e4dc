//! ProTracker MOD format parser.

use log::warn;
use mg_ir::{period, Cell, PlaybackFormat, Song};

use super::{load_standalone, require_len};
use crate::assembler::SongBuilder;
use crate::cursor::parse_string;
use crate::effect_parser;
use crate::extractor::{extract_all, SampleRecord};
use crate::normalizer::Grid;
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const NUM_SAMPLES: usize = 31;
const SONG_LENGTH_OFFSET: usize = 950;
const ORDER_OFFSET: usize = 952;
const SIGNATURE_OFFSET: usize = 1080;
const HEADER_SIZE: usize = 1084;
const ROWS: usize = 64;

pub struct ProTracker;

/// Channel count implied by the signature at offset 1080.
fn channels_for(sig: &[u8]) -> Option<u8> {
    match sig {
        b"M.K." | b"M!K!" | b"FLT4" | b"4CHN" => Some(4),
        b"6CHN" => Some(6),
        b"8CHN" | b"OCTA" | b"CD81" | b"FLT8" => Some(8),
        _ => None,
    }
}

impl Loader for ProTracker {
    fn id(&self) -> &'static str {
        "mod"
    }

    fn name(&self) -> &'static str {
        "ProTracker"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["mod"],
            prefixes: &["mod"],
            required: false,
        }
    }

    fn min_size(&self) -> usize {
        HEADER_SIZE
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        channels_for(&data[SIGNATURE_OFFSET..HEADER_SIZE])?;
        let song_length = data[SONG_LENGTH_OFFSET];
        if !(1..=128).contains(&song_length) {
            return None;
        }
        if data[ORDER_OFFSET..ORDER_OFFSET + 128].iter().any(|&p| p >= 128) {
            return None;
        }
        Some(3)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

/// Load a MOD file from bytes.
pub fn load_mod(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&ProTracker, data)
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("ProTracker", data, HEADER_SIZE)?;

    let num_channels = channels_for(&data[SIGNATURE_OFFSET..HEADER_SIZE]).unwrap_or(4);
    let title = parse_string(&data[0..20]);

    let mut records: Vec<SampleRecord> = (0..NUM_SAMPLES)
        .map(|i| {
            let offset = 20 + i * 30;
            parse_sample_header(&data[offset..offset + 30])
        })
        .collect();

    let song_length = data[SONG_LENGTH_OFFSET].clamp(1, 128) as usize;
    let order: Vec<u16> = data[ORDER_OFFSET..ORDER_OFFSET + song_length]
        .iter()
        .map(|&p| p as u16)
        .collect();

    // Every stored pattern counts, including ones past the song length.
    let max_pattern = data[ORDER_OFFSET..ORDER_OFFSET + 128]
        .iter()
        .copied()
        .filter(|&p| p < 128)
        .max()
        .unwrap_or(0) as usize;

    let pattern_size = ROWS * num_channels as usize * 4;
    let mut patterns = Vec::new();
    for pat_idx in 0..=max_pattern {
        let pat_offset = HEADER_SIZE + pat_idx * pattern_size;
        let Some(bytes) = data.get(pat_offset..pat_offset + pattern_size) else {
            warn!("ProTracker: pattern {pat_idx} truncated, keeping {} patterns", patterns.len());
            break;
        };
        patterns.push(parse_pattern(bytes, num_channels));
    }

    let mut sample_offset = HEADER_SIZE + (max_pattern + 1) * pattern_size;
    for record in &mut records {
        record.offset = sample_offset;
        sample_offset += record.length;
    }

    Ok(SongBuilder::new("mod", PlaybackFormat::Mod, num_channels)
        .name(title)
        .patterns(patterns)
        .instruments(extract_all(&records, data))
        .order(order)
        .speed(6)
        .tempo(125)
        .original_counts(num_channels as u16, max_pattern as u16 + 1, NUM_SAMPLES as u16)
        .build(ctx))
}

/// Parse a sample header (30 bytes). The PCM offset is filled in later.
fn parse_sample_header(data: &[u8]) -> SampleRecord {
    let name = parse_string(&data[0..22]);
    let length = u16::from_be_bytes([data[22], data[23]]) as u32 * 2;
    let finetune = (data[24] & 0x0F) as i8;
    let finetune = if finetune > 7 { finetune - 16 } else { finetune };
    let volume = data[25].min(64);
    let loop_start = u16::from_be_bytes([data[26], data[27]]) as u32 * 2;
    let loop_length = u16::from_be_bytes([data[28], data[29]]) as u32 * 2;

    // Loop ends slightly past the sample are common; clamp them.
    let loop_points = (loop_length > 2)
        .then(|| (loop_start, (loop_start + loop_length).min(length)));

    SampleRecord {
        name,
        length: length as usize,
        loop_points,
        sample_rate: period::finetune_rate(period::BASE_RATE, finetune),
        volume,
        finetune,
        ..Default::default()
    }
}

fn parse_pattern(data: &[u8], num_channels: u8) -> Grid {
    let channels = num_channels as usize;
    (0..channels)
        .map(|ch| {
            (0..ROWS)
                .map(|row| {
                    let offset = (row * channels + ch) * 4;
                    parse_cell(&data[offset..offset + 4])
                })
                .collect()
        })
        .collect()
}

/// Parse a single pattern cell (4 bytes).
pub(crate) fn parse_cell(data: &[u8]) -> Cell {
    // Byte 0: upper 4 bits of sample number, upper 4 bits of period
    // Byte 1: lower 8 bits of period
    // Byte 2: lower 4 bits of sample number, effect command
    // Byte 3: effect parameter
    let period = (((data[0] & 0x0F) as u16) << 8) | data[1] as u16;
    let sample = (data[0] & 0xF0) | ((data[2] & 0xF0) >> 4);

    Cell {
        note: period::period_to_note(period),
        instrument: sample,
        effect: effect_parser::protracker(data[2] & 0x0F, data[3]),
        ..Cell::empty()
    }
}
