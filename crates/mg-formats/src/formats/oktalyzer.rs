//! Oktalyzer (`OKTASONG` IFF container).

use log::{debug, warn};
use mg_ir::{Cell, Note, PlaybackFormat, Song};

use super::{load_standalone, require_len};
use crate::assembler::{PanScheme, SongBuilder};
use crate::cursor::{parse_string, BinaryRead, ByteCursor};
use crate::effect_parser;
use crate::extractor::{extract_all, SampleRecord};
use crate::normalizer::Grid;
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const MAGIC: &[u8; 8] = b"OKTASONG";
const SAMPLE_ENTRY_SIZE: usize = 32;

pub struct Oktalyzer;

impl Loader for Oktalyzer {
    fn id(&self) -> &'static str {
        "okt"
    }

    fn name(&self) -> &'static str {
        "Oktalyzer"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["okt"],
            prefixes: &["okta"],
            required: false,
        }
    }

    fn min_size(&self) -> usize {
        16
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        let ok = &data[..8] == MAGIC && &data[8..12] == b"CMOD" && data.u32be_at(12).ok()? == 8;
        ok.then_some(4)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_okt(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&Oktalyzer, data)
}

#[derive(Default)]
struct Parts {
    /// Hardware channel of each output channel
    hardware: Vec<usize>,
    records: Vec<SampleRecord>,
    speed: u8,
    song_length: usize,
    order: Vec<u16>,
    patterns: Vec<Grid>,
    next_sample: usize,
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("Oktalyzer", data, 16)?;
    let mut parts = Parts {
        hardware: (0..4).collect(),
        speed: 6,
        ..Default::default()
    };

    let mut cur = ByteCursor::at(data, MAGIC.len())?;
    while cur.remaining() >= 8 {
        let tag: [u8; 4] = cur.read_bytes(4)?.try_into().unwrap_or([0; 4]);
        let size = cur.read_u32_be()? as usize;
        let start = cur.position();
        let body = &data[start..(start + size).min(data.len())];
        if body.len() < size {
            warn!("Oktalyzer: {} chunk truncated", String::from_utf8_lossy(&tag));
        }
        read_chunk(&tag, body, start, &mut parts);
        if cur.seek(start + size).is_err() {
            break;
        }
    }

    let channels = parts.hardware.len();
    let pans = parts
        .hardware
        .iter()
        .map(|&hw| PanScheme::Amiga.pan_for(hw))
        .collect();
    let order = parts.order.iter().take(parts.song_length.max(1)).copied().collect();
    let num_patterns = parts.patterns.len() as u16;

    Ok(SongBuilder::new("okt", PlaybackFormat::Mod, channels as u8)
        .pan(PanScheme::Explicit(pans))
        .patterns(parts.patterns)
        .instruments(extract_all(&parts.records, data))
        .order(order)
        .speed(parts.speed)
        .tempo(125)
        .original_counts(channels as u16, num_patterns, parts.records.len() as u16)
        .build(ctx))
}

fn read_chunk(tag: &[u8; 4], body: &[u8], start: usize, parts: &mut Parts) {
    match tag {
        b"CMOD" => {
            parts.hardware = (0..4)
                .flat_map(|hw| {
                    let split = body.u16be_at(hw * 2).unwrap_or(0) != 0;
                    std::iter::repeat(hw).take(if split { 2 } else { 1 })
                })
                .collect();
        }
        b"SAMP" => {
            parts.records = body.chunks_exact(SAMPLE_ENTRY_SIZE).map(parse_sample).collect();
        }
        b"SPEE" => parts.speed = body.u16be_at(0).unwrap_or(6).clamp(1, 31) as u8,
        b"PLEN" => parts.song_length = body.u16be_at(0).unwrap_or(1) as usize,
        b"PATT" => parts.order = body.iter().take(128).map(|&p| p as u16).collect(),
        b"PBOD" => {
            let channels = parts.hardware.len();
            match parse_pattern(body, channels) {
                Some(grid) => parts.patterns.push(grid),
                None => warn!("Oktalyzer: pattern {} too short", parts.patterns.len()),
            }
        }
        b"SBOD" => {
            // Sample bodies appear in slot order, skipping empty slots.
            let slot = parts.records[parts.next_sample.min(parts.records.len())..]
                .iter()
                .position(|r| r.length > 0)
                .map(|i| i + parts.next_sample);
            match slot {
                Some(i) => {
                    let record = &mut parts.records[i];
                    record.offset = start;
                    record.length = record.length.min(body.len());
                    parts.next_sample = i + 1;
                }
                None => debug!("Oktalyzer: SBOD without a matching sample slot"),
            }
        }
        // SLEN duplicates the PBOD count.
        _ => {}
    }
}

fn parse_sample(entry: &[u8]) -> SampleRecord {
    let length = u32::from_be_bytes([entry[20], entry[21], entry[22], entry[23]]) as usize;
    let repeat_start = u16::from_be_bytes([entry[24], entry[25]]) as u32 * 2;
    let repeat_length = u16::from_be_bytes([entry[26], entry[27]]) as u32 * 2;
    SampleRecord {
        name: parse_string(&entry[..20]),
        length,
        loop_points: (repeat_length > 2).then_some((repeat_start, repeat_start + repeat_length)),
        volume: entry[29].min(64),
        ..Default::default()
    }
}

fn parse_pattern(body: &[u8], channels: usize) -> Option<Grid> {
    let rows = (body.u16be_at(0).ok()? as usize).clamp(1, 256);
    let cells = body.get(2..2 + rows * channels * 4)?;
    let mut grid = vec![vec![Cell::empty(); rows]; channels];
    for (i, raw) in cells.chunks_exact(4).enumerate() {
        let cell = &mut grid[i % channels][i / channels];
        if (1..=36).contains(&raw[0]) {
            cell.note = Note::On(35 + raw[0]);
            cell.instrument = raw[1] + 1;
        }
        cell.effect = effect_parser::oktalyzer(raw[2], raw[3]);
    }
    Some(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_ir::{Effect, InstrumentConfig};

    fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut c = tag.to_vec();
        c.extend_from_slice(&(body.len() as u32).to_be_bytes());
        c.extend_from_slice(body);
        c
    }

    fn make_minimal_okt(split: [u16; 4]) -> Vec<u8> {
        let channels: usize = split.iter().map(|&s| if s != 0 { 2 } else { 1 }).sum();
        let mut data = MAGIC.to_vec();
        let cmod: Vec<u8> = split.iter().flat_map(|s| s.to_be_bytes()).collect();
        data.extend(chunk(b"CMOD", &cmod));

        let mut samp = vec![0u8; SAMPLE_ENTRY_SIZE * 2];
        samp[..5].copy_from_slice(b"empty");
        let s = SAMPLE_ENTRY_SIZE;
        samp[s..s + 4].copy_from_slice(b"bell");
        samp[s + 20..s + 24].copy_from_slice(&8u32.to_be_bytes());
        samp[s + 29] = 33;
        data.extend(chunk(b"SAMP", &samp));
        data.extend(chunk(b"SPEE", &3u16.to_be_bytes()));
        data.extend(chunk(b"SLEN", &1u16.to_be_bytes()));
        data.extend(chunk(b"PLEN", &1u16.to_be_bytes()));
        data.extend(chunk(b"PATT", &[0u8; 128]));

        let rows = 4usize;
        let mut pbod = (rows as u16).to_be_bytes().to_vec();
        let mut cells = vec![0u8; rows * channels * 4];
        cells[..4].copy_from_slice(&[13, 1, 31, 0x20]);
        pbod.append(&mut cells);
        data.extend(chunk(b"PBOD", &pbod));
        data.extend(chunk(b"SBOD", &[1, 2, 3, 4, 5, 6, 7, 8]));
        data
    }

    #[test]
    fn parses_chunks_and_skips_empty_sample_slots() {
        let data = make_minimal_okt([0; 4]);
        assert_eq!(Oktalyzer.probe(&data), Some(4));
        let song = load_okt(&data).unwrap();

        assert_eq!(song.num_channels, 4);
        assert_eq!(song.initial_speed, 3);
        let c = song.patterns[0].cell(0, 0);
        assert_eq!(c.note, Note::On(48));
        assert_eq!(c.instrument, 2);
        assert_eq!(c.effect, Effect::SetVolume(0x20));

        assert!(song.instruments[0].is_placeholder());
        match &song.instruments[1].config {
            InstrumentConfig::Sampler(s) => {
                assert_eq!(s.data.len(), 8);
                assert_eq!(s.volume, 33);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn split_channels_share_hardware_pan() {
        let data = make_minimal_okt([1, 0, 0, 1]);
        let song = load_okt(&data).unwrap();
        assert_eq!(song.num_channels, 6);
        let pans: Vec<i8> = song.patterns[0].channels.iter().map(|c| c.pan).collect();
        assert_eq!(pans, vec![-64, -64, 64, 64, -64, -64]);
    }
}
