//! HivelyTracker (`HVL`) modules.
//!
//! An extension of AHX: up to 16 voices, a second effect column, packed
//! empty track steps and a default stereo width. Instruments keep the AHX
//! block with wider play-list entries.

use log::{debug, warn};
use mg_ir::{
    AhxConfig, AhxPlistEntry, Cell, Instrument, InstrumentConfig, Note, PlaybackFormat, Song,
};

use super::ahx::{instrument_config, INSTRUMENT_SIZE};
use super::{load_standalone, require_len};
use crate::assembler::{PanScheme, SongBuilder};
use crate::cursor::{BinaryRead, ByteCursor};
use crate::effect_parser;
use crate::normalizer::Grid;
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const HEADER_SIZE: usize = 16;
const STEP_SIZE: usize = 5;
const EMPTY_STEP: u8 = 0x3F;
const PLIST_ENTRY_SIZE: usize = 5;
const TRACK0_EMPTY: u16 = 0x8000;
const MAX_CHANNELS: usize = 16;

#[derive(Debug)]
struct Header {
    version: u8,
    names_offset: usize,
    track0_empty: bool,
    speed_multiplier: u8,
    positions: usize,
    channels: usize,
    restart: u16,
    track_length: usize,
    highest_track: usize,
    instruments: usize,
    subsongs: usize,
    mix_gain: u8,
    /// Stereo width, 0 (mono) to 4 (hard left/right)
    stereo: u8,
}

impl Header {
    fn read(data: &[u8]) -> Result<Self, FormatError> {
        if data.slice_at(0, 3)? != b"HVL" {
            return Err(FormatError::InvalidHeader {
                format: "HivelyTracker",
                reason: "missing HVL tag".into(),
            });
        }
        let flags = data.u16be_at(6)?;
        let voices = data.u16be_at(8)?;
        Ok(Self {
            version: data.u8_at(3)?,
            names_offset: data.u16be_at(4)? as usize,
            track0_empty: flags & TRACK0_EMPTY != 0,
            speed_multiplier: ((flags >> 13) & 3) as u8,
            positions: (flags & 0x0FFF) as usize,
            channels: (voices >> 10) as usize + 4,
            restart: voices & 0x03FF,
            track_length: data.u8_at(10)? as usize,
            highest_track: data.u8_at(11)? as usize,
            instruments: data.u8_at(12)? as usize,
            subsongs: data.u8_at(13)? as usize,
            mix_gain: data.u8_at(14)?,
            stereo: data.u8_at(15)?,
        })
    }

    fn is_plausible(&self) -> bool {
        self.version <= 1
            && (1..=64).contains(&self.track_length)
            && self.positions >= 1
            && self.channels <= MAX_CHANNELS
    }

    fn pan(&self) -> PanScheme {
        let width = self.stereo.min(4) as i32 * 16;
        let pans = (0..self.channels)
            .map(|ch| (PanScheme::Amiga.pan_for(ch) as i32 * width / 64) as i8)
            .collect();
        PanScheme::Explicit(pans)
    }
}

/// One unpacked track step.
#[derive(Clone, Copy, Debug, Default)]
struct Step {
    note: u8,
    instrument: u8,
    fx: [(u8, u8); 2],
}

pub struct Hively;

impl Loader for Hively {
    fn id(&self) -> &'static str {
        "hvl"
    }

    fn name(&self) -> &'static str {
        "HivelyTracker"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["hvl"],
            prefixes: &["hvl"],
            required: false,
        }
    }

    fn min_size(&self) -> usize {
        HEADER_SIZE
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        Header::read(data).ok()?.is_plausible().then_some(5)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_hively(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&Hively, data)
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("HivelyTracker", data, HEADER_SIZE)?;
    let header = Header::read(data)?;
    if !header.is_plausible() {
        return Err(FormatError::InvalidHeader {
            format: "HivelyTracker",
            reason: format!(
                "version {}, track length {}, {} channels",
                header.version, header.track_length, header.channels
            ),
        });
    }
    debug!("HivelyTracker: {header:?}");

    let mut cur = ByteCursor::at(data, HEADER_SIZE)?;
    let _ = cur.read_up_to(header.subsongs * 2);
    let position_size = header.channels * 2;
    let positions: Vec<&[u8]> = (0..header.positions)
        .map_while(|_| cur.read_bytes(position_size).ok())
        .collect();
    if positions.len() < header.positions {
        warn!("HivelyTracker: position list truncated at {}", positions.len());
    }

    let mut tracks: Vec<Vec<Step>> = Vec::with_capacity(header.highest_track + 1);
    let mut intact = positions.len() == header.positions;
    for track in 0..=header.highest_track {
        if track == 0 && header.track0_empty {
            tracks.push(vec![Step::default(); header.track_length]);
            continue;
        }
        if !intact {
            break;
        }
        match read_track(&mut cur, header.track_length) {
            Ok(steps) => tracks.push(steps),
            Err(e) => {
                warn!("HivelyTracker: track {track}: {e}");
                intact = false;
            }
        }
    }

    let patterns: Vec<Grid> = positions
        .iter()
        .map(|raw| {
            raw.chunks_exact(2)
                .map(|pair| {
                    track_column(&tracks, header.track_length, pair[0] as usize, pair[1] as i8)
                })
                .collect()
        })
        .collect();

    let mut configs = Vec::with_capacity(header.instruments);
    for i in 0..header.instruments {
        if !intact {
            break;
        }
        match read_instrument(&mut cur) {
            Ok(config) => configs.push(config),
            Err(e) => {
                warn!("HivelyTracker: instrument {}: {e}", i + 1);
                intact = false;
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
    debug!("HivelyTracker: mix gain {}", header.mix_gain);

    let tempo = (125 * (header.speed_multiplier as u32 + 1)).min(255) as u8;
    let order: Vec<u16> = (0..patterns.len() as u16).collect();
    let stored_tracks = header.highest_track + 1 - header.track0_empty as usize;

    Ok(SongBuilder::new("hvl", PlaybackFormat::Hively, header.channels as u8)
        .name(title)
        .pan(header.pan())
        .patterns(patterns)
        .instruments(instruments)
        .order(order)
        .restart(header.restart)
        .speed(6)
        .tempo(tempo)
        .original_counts(header.channels as u16, stored_tracks as u16, header.instruments as u16)
        .build(ctx))
}

fn read_track(cur: &mut ByteCursor<'_>, rows: usize) -> Result<Vec<Step>, FormatError> {
    let mut steps = Vec::with_capacity(rows);
    for _ in 0..rows {
        if cur.peek_u8()? == EMPTY_STEP {
            cur.skip(1)?;
            steps.push(Step::default());
            continue;
        }
        let b = cur.read_bytes(STEP_SIZE)?;
        steps.push(Step {
            note: b[0],
            instrument: b[1],
            fx: [(b[2] >> 4, b[3]), (b[2] & 0x0F, b[4])],
        });
    }
    Ok(steps)
}

fn track_column(tracks: &[Vec<Step>], rows: usize, track: usize, transpose: i8) -> Vec<Cell> {
    let Some(steps) = tracks.get(track) else {
        return vec![Cell::empty(); rows];
    };
    steps
        .iter()
        .map(|step| {
            let mut cell = Cell::empty();
            if step.note != 0 {
                cell.note = Note::clamped(36 + step.note as i32 - 1 + transpose as i32);
            }
            cell.instrument = step.instrument;
            cell.effect = effect_parser::ahx(step.fx[0].0, step.fx[0].1);
            cell.effect2 = effect_parser::ahx(step.fx[1].0, step.fx[1].1);
            cell
        })
        .collect()
}

fn read_instrument(cur: &mut ByteCursor<'_>) -> Result<AhxConfig, FormatError> {
    let b = cur.read_bytes(INSTRUMENT_SIZE)?;
    let plist = cur
        .read_bytes(b[21] as usize * PLIST_ENTRY_SIZE)?
        .chunks_exact(PLIST_ENTRY_SIZE)
        .map(|raw| AhxPlistEntry {
            note: raw[2] & 0x3F,
            fixed: (raw[2] >> 6) & 1 != 0,
            waveform: raw[1] & 0x07,
            fx: [raw[0] & 0x0F, (raw[1] >> 3) & 0x0F],
            params: [raw[3], raw[4]],
        })
        .collect();
    Ok(instrument_config(b, plist))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_ir::Effect;

    /// Five voices, one position; voice 0 plays track 1 up an octave.
    fn make_minimal_hvl() -> Vec<u8> {
        let mut data = b"HVL\x01".to_vec();
        data.extend_from_slice(&0u16.to_be_bytes()); // names offset, patched below
        data.extend_from_slice(&(0x8000u16 | 0x2000 | 1).to_be_bytes());
        data.extend_from_slice(&(1u16 << 10).to_be_bytes());
        data.extend_from_slice(&[4, 1, 1, 0, 100, 2]);

        data.extend_from_slice(&[1, 12, 0, 0, 0, 0, 0, 0, 0, 0]);
        // track 1: note 1 instrument 1 with C20 and A04, then three packed rests
        data.extend_from_slice(&[1, 1, 0xCA, 0x20, 0x04]);
        data.extend_from_slice(&[EMPTY_STEP; 3]);

        let mut inst = [0u8; INSTRUMENT_SIZE];
        inst[0] = 48;
        inst[1] = 0x02;
        inst[21] = 1;
        data.extend_from_slice(&inst);
        data.extend_from_slice(&[0x03, 0x0B, 0x58, 0x10, 0x20]);

        let names = data.len() as u16;
        data[4..6].copy_from_slice(&names.to_be_bytes());
        data.extend_from_slice(b"hively\0bass\0");
        data
    }

    #[test]
    fn parses_packed_tracks_and_second_effect() {
        let data = make_minimal_hvl();
        assert_eq!(Hively.probe(&data), Some(5));
        let song = load_hively(&data).unwrap();

        assert_eq!(song.format, PlaybackFormat::Hively);
        assert_eq!(song.name.as_str(), "hively");
        assert_eq!(song.num_channels, 5);
        assert_eq!(song.initial_tempo, 250);
        let p = &song.patterns[0];
        assert_eq!(p.rows, 4);
        let c = p.cell(0, 0);
        assert_eq!(c.note, Note::On(48));
        assert_eq!(c.instrument, 1);
        assert_eq!(c.effect, Effect::SetVolume(0x20));
        assert_eq!(c.effect2, Effect::VolumeSlide(-4));
        assert!(p.cell(1, 0).is_empty());
        assert!(p.cell(0, 4).is_empty());

        assert_eq!(song.instruments[0].name.as_str(), "bass");
        match &song.instruments[0].config {
            InstrumentConfig::Ahx(ahx) => {
                assert_eq!(ahx.volume, 48);
                assert_eq!(ahx.wave_length, 2);
                let e = ahx.plist[0];
                assert_eq!(e.fx, [3, 1]);
                assert_eq!(e.waveform, 3);
                assert!(e.fixed);
                assert_eq!(e.note, 24);
                assert_eq!(e.params, [0x10, 0x20]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stereo_width_scales_amiga_panning() {
        let song = load_hively(&make_minimal_hvl()).unwrap();
        let pans: Vec<i8> = song.patterns[0].channels.iter().map(|c| c.pan).collect();
        assert_eq!(pans, vec![-32, 32, 32, -32, -32]);
    }

    #[test]
    fn truncated_track_keeps_positions() {
        let data = make_minimal_hvl();
        let song = load_hively(&data[..HEADER_SIZE + 10 + 3]).unwrap();
        assert_eq!(song.patterns.len(), 1);
        assert!(song.patterns[0].is_blank());
        assert_eq!(song.instruments.len(), 1);
        assert!(song.instruments[0].is_placeholder());
    }

    #[test]
    fn too_many_voices_are_rejected() {
        let mut data = make_minimal_hvl();
        data[8] = 13 << 2;
        assert!(Hively.probe(&data).is_none());
    }
}
