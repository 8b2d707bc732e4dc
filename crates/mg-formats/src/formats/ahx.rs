//! AHX / THX (Abyss' Highest eXperience) v0 and v1 modules.

use log::{debug, warn};
use mg_ir::{
    AhxConfig, AhxEnvelope, AhxPlistEntry, Cell, Instrument, InstrumentConfig, Note,
    PlaybackFormat, Song,
};

use super::{load_standalone, require_len};
use crate::assembler::SongBuilder;
use crate::cursor::{BinaryRead, ByteCursor};
use crate::effect_parser;
use crate::normalizer::Grid;
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const HEADER_SIZE: usize = 14;
const POSITION_SIZE: usize = 8;
const CELL_SIZE: usize = 3;
pub(super) const INSTRUMENT_SIZE: usize = 22;
const PLIST_ENTRY_SIZE: usize = 4;
const TRACK0_EMPTY: u16 = 0x8000;

#[derive(Debug)]
struct Header {
    version: u8,
    names_offset: usize,
    track0_empty: bool,
    /// Replay rate multiplier (v1 only): 50 Hz × (n + 1)
    speed_multiplier: u8,
    positions: usize,
    restart: u16,
    track_length: usize,
    highest_track: usize,
    instruments: usize,
    subsongs: usize,
}

impl Header {
    fn read(data: &[u8]) -> Result<Self, FormatError> {
        if data.slice_at(0, 3)? != b"THX" {
            return Err(FormatError::InvalidHeader {
                format: "AHX",
                reason: "missing THX tag".into(),
            });
        }
        let version = data.u8_at(3)?;
        let flags = data.u16be_at(6)?;
        Ok(Self {
            version,
            names_offset: data.u16be_at(4)? as usize,
            track0_empty: flags & TRACK0_EMPTY != 0,
            speed_multiplier: if version > 0 { ((flags >> 13) & 3) as u8 } else { 0 },
            positions: (flags & 0x0FFF) as usize,
            restart: data.u16be_at(8)?,
            track_length: data.u8_at(10)? as usize,
            highest_track: data.u8_at(11)? as usize,
            instruments: data.u8_at(12)? as usize,
            subsongs: data.u8_at(13)? as usize,
        })
    }

    fn is_plausible(&self) -> bool {
        self.version <= 1 && (1..=64).contains(&self.track_length) && self.positions >= 1
    }
}

pub struct Ahx;

impl Loader for Ahx {
    fn id(&self) -> &'static str {
        "ahx"
    }

    fn name(&self) -> &'static str {
        "AHX"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["ahx", "thx"],
            prefixes: &["ahx", "thx"],
            required: false,
        }
    }

    fn min_size(&self) -> usize {
        HEADER_SIZE
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        Header::read(data).ok()?.is_plausible().then_some(4)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_ahx(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&Ahx, data)
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("AHX", data, HEADER_SIZE)?;
    let header = Header::read(data)?;
    if !header.is_plausible() {
        return Err(FormatError::InvalidHeader {
            format: "AHX",
            reason: format!("version {}, track length {}", header.version, header.track_length),
        });
    }
    debug!("AHX: {header:?}");

    let positions_at = HEADER_SIZE + header.subsongs * 2;
    let tracks_at = positions_at + header.positions * POSITION_SIZE;
    let track_size = header.track_length * CELL_SIZE;
    let stored_tracks = header.highest_track + 1 - header.track0_empty as usize;
    let instruments_at = tracks_at + stored_tracks * track_size;

    let mut patterns = Vec::with_capacity(header.positions);
    for pos in 0..header.positions {
        let Ok(raw) = data.slice_at(positions_at + pos * POSITION_SIZE, POSITION_SIZE) else {
            warn!("AHX: position list truncated at {pos}");
            break;
        };
        let grid: Grid = raw
            .chunks_exact(2)
            .map(|pair| read_track(data, &header, tracks_at, pair[0] as usize, pair[1] as i8))
            .collect();
        patterns.push(grid);
    }

    let mut cur = ByteCursor::at(data, instruments_at.min(data.len()))?;
    let mut configs = Vec::with_capacity(header.instruments);
    for i in 0..header.instruments {
        match read_instrument(&mut cur) {
            Ok(config) => configs.push(config),
            Err(e) => {
                warn!("AHX: instrument {}: {e}", i + 1);
                break;
            }
        }
    }

    let mut names = ByteCursor::at(data, header.names_offset.min(data.len()))?;
    let title = names.read_cstring().unwrap_or_default();
    let instruments = configs
        .into_iter()
        .enumerate()
        .map(|(i, config)| {
            let name = names.read_cstring().unwrap_or_default();
            Instrument::new(i as u16 + 1, &name, InstrumentConfig::Ahx(config))
        })
        .collect();

    let tempo = (125 * (header.speed_multiplier as u32 + 1)).min(255) as u8;
    let order: Vec<u16> = (0..patterns.len() as u16).collect();

    Ok(SongBuilder::new("ahx", PlaybackFormat::Ahx, 4)
        .name(title)
        .patterns(patterns)
        .instruments(instruments)
        .order(order)
        .restart(header.restart)
        .speed(6)
        .tempo(tempo)
        .original_counts(4, stored_tracks as u16, header.instruments as u16)
        .build(ctx))
}

fn read_track(data: &[u8], header: &Header, tracks_at: usize, track: usize, transpose: i8) -> Vec<Cell> {
    let rows = header.track_length;
    let mut cells = vec![Cell::empty(); rows];
    if track > header.highest_track || (track == 0 && header.track0_empty) {
        return cells;
    }
    let index = track - header.track0_empty as usize;
    let Ok(bytes) = data.slice_at(tracks_at + index * rows * CELL_SIZE, rows * CELL_SIZE) else {
        warn!("AHX: track {track} truncated");
        return cells;
    };
    for (cell, raw) in cells.iter_mut().zip(bytes.chunks_exact(CELL_SIZE)) {
        let note = raw[0] >> 2;
        if note != 0 {
            cell.note = Note::clamped(36 + note as i32 - 1 + transpose as i32);
        }
        cell.instrument = ((raw[0] & 0x03) << 4) | (raw[1] >> 4);
        cell.effect = effect_parser::ahx(raw[1] & 0x0F, raw[2]);
    }
    cells
}

fn read_instrument(cur: &mut ByteCursor<'_>) -> Result<AhxConfig, FormatError> {
    let b = cur.read_bytes(INSTRUMENT_SIZE)?;
    let plist_length = b[21] as usize;
    let plist = cur
        .read_bytes(plist_length * PLIST_ENTRY_SIZE)?
        .chunks_exact(PLIST_ENTRY_SIZE)
        .map(parse_plist_entry)
        .collect();
    Ok(instrument_config(b, plist))
}

/// The 22-byte instrument block shared with HivelyTracker.
pub(super) fn instrument_config(b: &[u8], plist: Vec<AhxPlistEntry>) -> AhxConfig {
    AhxConfig {
        volume: b[0].min(64),
        wave_length: b[1] & 0x07,
        envelope: AhxEnvelope {
            attack_frames: b[2],
            attack_volume: b[3],
            decay_frames: b[4],
            decay_volume: b[5],
            sustain_frames: b[6],
            release_frames: b[7],
            release_volume: b[8],
        },
        filter_lower: b[12] & 0x7F,
        filter_upper: b[19] & 0x3F,
        filter_speed: ((b[1] >> 3) & 0x1F) | ((b[12] >> 2) & 0x20),
        square_lower: b[16],
        square_upper: b[17],
        square_speed: b[18],
        vibrato_delay: b[13],
        vibrato_depth: b[14] & 0x0F,
        vibrato_speed: b[15],
        hard_cut_release: b[14] & 0x80 != 0,
        hard_cut_frames: (b[14] >> 4) & 0x07,
        plist_speed: b[20],
        plist,
    }
}

fn parse_plist_entry(raw: &[u8]) -> AhxPlistEntry {
    AhxPlistEntry {
        note: raw[1] & 0x3F,
        fixed: (raw[1] >> 6) & 1 != 0,
        waveform: ((raw[0] << 1) & 6) | (raw[1] >> 7),
        fx: [(raw[0] >> 2) & 7, (raw[0] >> 5) & 7],
        params: [raw[2], raw[3]],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_ir::Effect;

    fn make_minimal_ahx(version: u8) -> Vec<u8> {
        let mut data = b"THX".to_vec();
        data.push(version);
        data.extend_from_slice(&0u16.to_be_bytes()); // names offset, patched below
        data.extend_from_slice(&(0x2000u16 | 1).to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&[4, 1, 1, 0]);

        // position 0: voice 0 track 1 transpose +12, others track 0
        data.extend_from_slice(&[1, 12, 0, 0, 0, 0, 0, 0]);
        // track 0 (4 rows), then track 1: note 1 instrument 1 fx C param 0x20
        data.extend_from_slice(&[0; 12]);
        data.extend_from_slice(&[0x04, 0x1C, 0x20]);
        data.extend_from_slice(&[0; 9]);

        let mut inst = [0u8; INSTRUMENT_SIZE];
        inst[0] = 50;
        inst[1] = 0x0B;
        inst[2] = 1;
        inst[3] = 64;
        inst[14] = 0x93;
        inst[21] = 1;
        data.extend_from_slice(&inst);
        data.extend_from_slice(&[0x05, 0xD8, 0x10, 0x20]);

        let names = data.len() as u16;
        data[4..6].copy_from_slice(&names.to_be_bytes());
        data.extend_from_slice(b"chip tune\0lead\0");
        data
    }

    #[test]
    fn parses_positions_tracks_and_instruments() {
        let data = make_minimal_ahx(1);
        assert_eq!(Ahx.probe(&data), Some(4));
        let song = load_ahx(&data).unwrap();

        assert_eq!(song.name.as_str(), "chip tune");
        assert_eq!(song.initial_tempo, 250);
        assert_eq!(song.patterns[0].rows, 4);
        let c = song.patterns[0].cell(0, 0);
        assert_eq!(c.note, Note::On(48));
        assert_eq!(c.instrument, 1);
        assert_eq!(c.effect, Effect::SetVolume(0x20));
        assert!(song.patterns[0].cell(0, 1).is_empty());

        assert_eq!(song.instruments[0].name.as_str(), "lead");
        match &song.instruments[0].config {
            InstrumentConfig::Ahx(ahx) => {
                assert_eq!(ahx.volume, 50);
                assert_eq!(ahx.wave_length, 3);
                assert_eq!(ahx.filter_speed, 1);
                assert!(ahx.hard_cut_release);
                assert_eq!(ahx.hard_cut_frames, 1);
                assert_eq!(ahx.vibrato_depth, 3);
                assert_eq!(ahx.plist.len(), 1);
                let e = ahx.plist[0];
                assert_eq!(e.fx, [1, 0]);
                assert_eq!(e.waveform, 3);
                assert!(e.fixed);
                assert_eq!(e.note, 24);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn version_zero_ignores_speed_bits() {
        let song = load_ahx(&make_minimal_ahx(0)).unwrap();
        assert_eq!(song.initial_tempo, 125);
    }

    #[test]
    fn zero_track_length_is_rejected() {
        let mut data = make_minimal_ahx(1);
        data[10] = 0;
        assert!(Ahx.probe(&data).is_none());
    }
}
