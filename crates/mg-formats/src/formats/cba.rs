//! Chuck Biscuits Atari (`.cba`), the Black Lotus demo tracker.

use std::io::Cursor;

use binrw::BinRead;
use log::warn;
use mg_ir::{Cell, Note, PlaybackFormat, Song};

use super::{load_standalone, require_len};
use crate::assembler::{PanScheme, SongBuilder};
use crate::cursor::parse_string;
use crate::effect_parser;
use crate::extractor::{extract_all, PcmEncoding, SampleRecord};
use crate::normalizer::Grid;
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const HEADER_SIZE: usize = 333;
const SAMPLE_HEADER_SIZE: usize = 48;
const ROWS: usize = 64;
const CELL_SIZE: usize = 5;

#[derive(BinRead, Debug)]
#[br(little, magic = b"CBA\xF9")]
struct FileHeader {
    title: [u8; 32],
    eof: u8,
    message_length: u16,
    channels: u8,
    last_pattern: u8,
    num_orders: u8,
    num_samples: u8,
    speed: u8,
    tempo: u8,
    pan: [u8; 32],
    orders: [u8; 255],
}

#[derive(BinRead, Debug)]
#[br(little)]
struct SampleHeader {
    name: [u8; 32],
    flags: u8,
    volume: u8,
    rate: u16,
    length: u32,
    loop_start: u32,
    loop_end: u32,
}

impl SampleHeader {
    const LOOP: u8 = 0x08;
}

impl FileHeader {
    fn is_plausible(&self) -> bool {
        self.eof == 0x1A
            && (1..=32).contains(&self.channels)
            && self.speed >= 1
            && self.tempo >= 32
    }
}

pub struct ChuckBiscuits;

impl Loader for ChuckBiscuits {
    fn id(&self) -> &'static str {
        "cba"
    }

    fn name(&self) -> &'static str {
        "Chuck Biscuits Atari"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["cba"],
            prefixes: &[],
            required: false,
        }
    }

    fn min_size(&self) -> usize {
        HEADER_SIZE
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        let header = FileHeader::read(&mut Cursor::new(data)).ok()?;
        header.is_plausible().then_some(4)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_cba(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&ChuckBiscuits, data)
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("CBA", data, HEADER_SIZE)?;
    let mut cursor = Cursor::new(data);
    let header = FileHeader::read(&mut cursor)?;
    if !header.is_plausible() {
        return Err(FormatError::InvalidHeader {
            format: "CBA",
            reason: format!("{} channels, speed {}", header.channels, header.speed),
        });
    }
    cursor.set_position(HEADER_SIZE as u64);

    let mut headers = Vec::with_capacity(header.num_samples as usize);
    for i in 0..header.num_samples {
        match SampleHeader::read(&mut cursor) {
            Ok(h) => headers.push(h),
            Err(_) => {
                warn!("CBA: sample table truncated at entry {i}");
                break;
            }
        }
    }

    let channels = header.channels as usize;
    let pattern_base = HEADER_SIZE
        + header.num_samples as usize * SAMPLE_HEADER_SIZE
        + header.message_length as usize;
    let pattern_size = ROWS * channels * CELL_SIZE;
    let num_patterns = header.last_pattern as usize + 1;

    let mut patterns = Vec::with_capacity(num_patterns);
    for idx in 0..num_patterns {
        let start = pattern_base + idx * pattern_size;
        let Some(bytes) = data.get(start..start + pattern_size) else {
            warn!("CBA: pattern {idx} truncated, keeping {}", patterns.len());
            break;
        };
        patterns.push(parse_pattern(bytes, channels));
    }

    let mut offset = pattern_base + num_patterns * pattern_size;
    let records: Vec<SampleRecord> = headers
        .iter()
        .map(|h| {
            let record = SampleRecord {
                name: parse_string(&h.name),
                offset,
                length: h.length as usize,
                loop_points: (h.flags & SampleHeader::LOOP != 0).then_some((h.loop_start, h.loop_end)),
                encoding: PcmEncoding::Delta8,
                sample_rate: h.rate as u32,
                volume: h.volume,
                ..Default::default()
            };
            offset += h.length as usize;
            record
        })
        .collect();

    let order: Vec<u16> = header.orders[..header.num_orders as usize]
        .iter()
        .filter(|&&o| o != 0xFF)
        .map(|&o| o as u16)
        .collect();
    let pans = header.pan[..channels]
        .iter()
        .map(|&p| ((p as i16 - 128) / 2) as i8)
        .collect();

    Ok(SongBuilder::new("cba", PlaybackFormat::Mod, header.channels)
        .name(parse_string(&header.title))
        .pan(PanScheme::Explicit(pans))
        .patterns(patterns)
        .instruments(extract_all(&records, data))
        .order(order)
        .speed(header.speed)
        .tempo(header.tempo)
        .original_counts(channels as u16, num_patterns as u16, header.num_samples as u16)
        .build(ctx))
}

fn parse_pattern(bytes: &[u8], channels: usize) -> Grid {
    let mut grid = vec![vec![Cell::empty(); ROWS]; channels];
    for (i, raw) in bytes.chunks_exact(CELL_SIZE).enumerate() {
        let (row, ch) = (i / channels, i % channels);
        let cell = &mut grid[ch][row];
        cell.instrument = raw[0];
        cell.note = match raw[1] {
            255 => Note::Off,
            n @ 1..=96 => Note::On(11 + n),
            _ => Note::None,
        };
        cell.volume = match raw[2] {
            v @ 1..=65 => Some(v - 1),
            _ => None,
        };
        cell.effect = effect_parser::cba(raw[3], raw[4]);
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_ir::{Effect, InstrumentConfig};

    fn make_minimal_cba(channels: u8) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_SIZE];
        data[..4].copy_from_slice(b"CBA\xF9");
        data[4..9].copy_from_slice(b"lotus");
        data[36] = 0x1A;
        data[37..39].copy_from_slice(&3u16.to_le_bytes());
        data[39] = channels;
        data[41] = 1;
        data[42] = 1;
        data[43] = 6;
        data[44] = 125;
        data[45] = 0;
        data[46] = 255;

        let mut sample = [0u8; SAMPLE_HEADER_SIZE];
        sample[..4].copy_from_slice(b"kick");
        sample[32] = SampleHeader::LOOP;
        sample[33] = 50;
        sample[34..36].copy_from_slice(&8363u16.to_le_bytes());
        sample[36..40].copy_from_slice(&4u32.to_le_bytes());
        sample[40..44].copy_from_slice(&1u32.to_le_bytes());
        sample[44..48].copy_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&sample);
        data.extend_from_slice(b"hi!");

        let mut pattern = vec![0u8; ROWS * channels as usize * CELL_SIZE];
        pattern[..5].copy_from_slice(&[1, 37, 33, 0x03, 0x03]);
        pattern[5..10].copy_from_slice(&[0, 255, 0, 0, 0]);
        data.extend_from_slice(&pattern);
        data.extend_from_slice(&[10, 5, 0xFB, 1]);
        data
    }

    #[test]
    fn parses_minimal_cba() {
        let data = make_minimal_cba(2);
        assert_eq!(ChuckBiscuits.probe(&data), Some(4));
        let song = load_cba(&data).unwrap();

        assert_eq!(song.name.as_str(), "lotus");
        assert_eq!(song.num_channels, 2);
        let c0 = song.patterns[0].cell(0, 0);
        assert_eq!(c0.note, Note::On(48));
        assert_eq!(c0.instrument, 1);
        assert_eq!(c0.volume, Some(32));
        assert_eq!(c0.effect, Effect::PortaDown(3));
        assert_eq!(song.patterns[0].cell(0, 1).note, Note::Off);

        let pans: Vec<i8> = song.patterns[0].channels.iter().map(|c| c.pan).collect();
        assert_eq!(pans, vec![-64, 63]);

        match &song.instruments[0].config {
            InstrumentConfig::Sampler(s) => {
                assert_eq!(s.data, mg_ir::SampleData::Mono8(vec![10, 15, 10, 11]));
                assert_eq!(s.volume, 50);
                assert!(s.loop_range.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn detection_checks_channels_and_eof_marker() {
        let mut data = make_minimal_cba(2);
        data[36] = 0;
        assert!(ChuckBiscuits.probe(&data).is_none());

        let data = make_minimal_cba(33);
        assert!(ChuckBiscuits.probe(&data).is_none());
    }
}
