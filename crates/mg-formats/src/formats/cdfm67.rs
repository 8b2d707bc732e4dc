//! CDFM Composer 670 (`.c67`): 4 PCM channels plus 9 OPL2 channels.

use std::io::Cursor;

use binrw::BinRead;
use log::{debug, warn};
use mg_ir::{Cell, Instrument, InstrumentConfig, Note, OplConfig, PlaybackFormat, Song};

use super::{load_standalone, require_len};
use crate::assembler::{PanScheme, SongBuilder};
use crate::cursor::parse_string;
use crate::extractor::{extract_sampler, PcmEncoding, SampleRecord};
use crate::normalizer::Grid;
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const HEADER_SIZE: usize = 2978;
const NUM_PCM: usize = 4;
const NUM_FM: usize = 9;
const NUM_CHANNELS: usize = NUM_PCM + NUM_FM;
const ROWS: usize = 64;
const NO_LOOP: u32 = 0xFFFFF;
const ORDER_END: u8 = 0xFF;
const TEMPO: u8 = 143;

#[derive(BinRead, Debug, Clone, Copy)]
#[br(little)]
struct SampleInfo {
    unknown: u32,
    length: u32,
    loop_start: u32,
    loop_end: u32,
}

/// Everything before the pattern data.
#[derive(BinRead, Debug)]
#[br(little)]
struct FileHeader {
    speed: u8,
    restart: u8,
    sample_names: [[u8; 13]; 32],
    samples: [SampleInfo; 32],
    fm_names: [[u8; 13]; 32],
    fm_registers: [[u8; 11]; 32],
    orders: [u8; 256],
    pattern_offsets: [u32; 128],
    pattern_lengths: [u32; 128],
}

impl FileHeader {
    fn parse(data: &[u8]) -> Result<Self, FormatError> {
        Ok(Self::read(&mut Cursor::new(data))?)
    }

    fn is_plausible(&self) -> bool {
        if !(1..=15).contains(&self.speed) {
            return false;
        }
        if self.orders.iter().any(|&o| o >= 128 && o != ORDER_END) {
            return false;
        }
        if self.sample_names.iter().chain(&self.fm_names).any(|n| n[12] != 0) {
            return false;
        }
        let samples_ok = self.samples.iter().all(|s| {
            s.unknown == 0
                && s.length <= NO_LOOP
                && (s.loop_end == NO_LOOP || (s.loop_start <= s.loop_end && s.loop_end <= s.length))
        });
        // OPL3-only bits must be clear
        let fm_ok = self
            .fm_registers
            .iter()
            .all(|r| r[0] & 0xF0 == 0 && r[5] & 0xFC == 0 && r[10] & 0xFC == 0);
        samples_ok && fm_ok
    }

    fn has_content(&self) -> bool {
        self.samples.iter().any(|s| s.length > 0)
            || self.fm_registers.iter().any(|r| r.iter().any(|&b| b != 0))
    }
}

pub struct Cdfm67;

impl Loader for Cdfm67 {
    fn id(&self) -> &'static str {
        "c67"
    }

    fn name(&self) -> &'static str {
        "CDFM Composer 670"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["c67"],
            prefixes: &[],
            required: false,
        }
    }

    fn min_size(&self) -> usize {
        HEADER_SIZE
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        let header = FileHeader::parse(data).ok()?;
        (header.is_plausible() && header.has_content()).then_some(2)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_c67(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&Cdfm67, data)
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("CDFM67", data, HEADER_SIZE)?;
    let header = FileHeader::parse(data)?;

    let order: Vec<u16> = header
        .orders
        .iter()
        .take_while(|&&o| o != ORDER_END)
        .map(|&o| o as u16)
        .collect();
    let num_patterns = order.iter().copied().max().map_or(1, |m| m as usize + 1);

    let patterns: Vec<Grid> = (0..num_patterns)
        .map(|idx| {
            let start = HEADER_SIZE + header.pattern_offsets[idx] as usize;
            let end = start.saturating_add(header.pattern_lengths[idx] as usize);
            match data.get(start..end.min(data.len())) {
                Some(bytes) if end <= data.len() => parse_pattern(bytes),
                Some(bytes) => {
                    warn!("CDFM67: pattern {idx} truncated");
                    parse_pattern(bytes)
                }
                None => {
                    warn!("CDFM67: pattern {idx} outside the file");
                    empty_grid()
                }
            }
        })
        .collect();

    // PCM follows the furthest pattern, in slot order.
    let pcm_base = HEADER_SIZE
        + header
            .pattern_offsets
            .iter()
            .zip(&header.pattern_lengths)
            .map(|(&o, &l)| o as usize + l as usize)
            .max()
            .unwrap_or(0);
    debug!("CDFM67: {num_patterns} patterns, sample data at {pcm_base:#x}");

    let mut instruments = Vec::with_capacity(64);
    let mut offset = pcm_base;
    for (i, (info, name)) in header.samples.iter().zip(&header.sample_names).enumerate() {
        let record = SampleRecord {
            name: parse_string(name),
            offset,
            length: info.length as usize,
            loop_points: (info.loop_end != NO_LOOP).then_some((info.loop_start, info.loop_end)),
            encoding: PcmEncoding::Unsigned8,
            ..Default::default()
        };
        offset += info.length as usize;
        instruments.push(extract_sampler(i as u16 + 1, &record, data));
    }
    for (i, (regs, name)) in header.fm_registers.iter().zip(&header.fm_names).enumerate() {
        instruments.push(Instrument::new(
            (33 + i) as u16,
            &parse_string(name),
            InstrumentConfig::Opl(OplConfig {
                registers: *regs,
                volume: 64,
            }),
        ));
    }

    let pans = (0..NUM_CHANNELS)
        .map(|ch| {
            if ch < NUM_PCM {
                PanScheme::Amiga.pan_for(ch)
            } else {
                0
            }
        })
        .collect();
    let channel_names = (0..NUM_CHANNELS)
        .map(|ch| {
            if ch < NUM_PCM {
                format!("PCM {}", ch + 1)
            } else {
                format!("FM {}", ch - NUM_PCM + 1)
            }
        })
        .collect();

    Ok(SongBuilder::new("c67", PlaybackFormat::S3m, NUM_CHANNELS as u8)
        .pan(PanScheme::Explicit(pans))
        .channel_names(channel_names)
        .patterns(patterns)
        .instruments(instruments)
        .order(order)
        .restart(header.restart as u16)
        .speed(header.speed)
        .tempo(TEMPO)
        .original_counts(NUM_CHANNELS as u16, num_patterns as u16, 64)
        .build(ctx))
}

fn empty_grid() -> Grid {
    vec![vec![Cell::empty(); ROWS]; NUM_CHANNELS]
}

fn scale_volume(nibble: u8) -> u8 {
    ((nibble & 0x0F) as u16 * 64 / 15) as u8
}

fn parse_pattern(bytes: &[u8]) -> Grid {
    let mut grid = empty_grid();
    let mut row = 0usize;
    let mut pos = 0usize;

    while row < ROWS {
        let Some(&cmd) = bytes.get(pos) else { break };
        pos += 1;
        match cmd {
            0x00..=0x0C => {
                let (Some(&note), Some(&instr_vol)) = (bytes.get(pos), bytes.get(pos + 1)) else {
                    break;
                };
                pos += 2;
                let ch = cmd as usize;
                let fm = ch >= NUM_PCM;
                let base = if fm { 12 } else { 36 };
                let semitone = (note & 0x0F).min(11) as i32;
                let octave = ((note >> 4) & 0x07) as i32;
                let mut instrument = (instr_vol >> 4) + ((note & 0x80) >> 3) + 1;
                if fm {
                    instrument += 32;
                }
                let cell = &mut grid[ch][row];
                cell.note = Note::clamped(base + octave * 12 + semitone);
                cell.instrument = instrument;
                cell.volume = Some(scale_volume(instr_vol));
            }
            0x20..=0x2C => {
                let Some(&vol) = bytes.get(pos) else { break };
                pos += 1;
                grid[(cmd - 0x20) as usize][row].volume = Some(scale_volume(vol));
            }
            0x40 => {
                let Some(&n) = bytes.get(pos) else { break };
                pos += 1;
                row += n as usize;
            }
            _ => break,
        }
    }
    grid
}
