//! Digital Mugician (` MUGICIAN/SOFTEYES 1990 `) and its seven-voice
//! variant Digital Mugician II.
//!
//! Eight subsongs share one pool of 64-row tracks. Instruments either run
//! a 128-byte wavetable through the synth or, for wave numbers from 32 up,
//! play a plain sample.

use log::{debug, warn};
use mg_ir::{
    Cell, DigitalMugicianConfig, Instrument, InstrumentConfig, Note, PlaybackFormat, Song,
};

use super::{load_standalone, name_or, require_len};
use crate::assembler::SongBuilder;
use crate::cursor::{parse_string, BinaryRead};
use crate::effect_parser;
use crate::extractor::{extract_sampler, read_waveform, SampleRecord};
use crate::normalizer::Grid;
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const ID_DM1: &[u8] = b" MUGICIAN/SOFTEYES 1990 ";
const ID_DM2: &[u8] = b" MUGICIAN2/SOFTEYES 1990";
const SONGS: usize = 8;
const SONG_HEADER_SIZE: usize = 16;
const HEADER_SIZE: usize = 76;
const TABLES_START: usize = HEADER_SIZE + SONGS * SONG_HEADER_SIZE;
const STEP_SIZE: usize = 8;
const TRACK_ROWS: usize = 64;
const TRACK_SIZE: usize = TRACK_ROWS * 4;
const INSTRUMENT_SIZE: usize = 16;
const WAVE_SIZE: usize = 128;
const SAMPLE_HEADER_SIZE: usize = 32;
const ARPEGGIO_SIZE: usize = 256;
const ARPEGGIO_STEPS: usize = 8;
const FIRST_SAMPLE_WAVE: u8 = 32;

#[derive(Debug)]
struct Header {
    seven_voice: bool,
    has_arpeggios: bool,
    tracks: usize,
    steps: [usize; SONGS],
    instruments: usize,
    waves: usize,
    samples: usize,
    sample_data_size: usize,
}

impl Header {
    fn read(data: &[u8]) -> Result<Self, FormatError> {
        let id = data.slice_at(0, ID_DM1.len())?;
        if id != ID_DM1 && id != ID_DM2 {
            return Err(FormatError::InvalidHeader {
                format: "Digital Mugician",
                reason: "missing SOFTEYES tag".into(),
            });
        }
        let seven_voice = id == ID_DM2;
        let mut steps = [0usize; SONGS];
        for (i, s) in steps.iter_mut().enumerate() {
            *s = data.u32be_at(28 + i * 4)? as usize;
        }
        Ok(Self {
            seven_voice,
            has_arpeggios: data.u16be_at(24)? != 0,
            tracks: data.u16be_at(26)? as usize,
            steps,
            instruments: data.u32be_at(60)? as usize,
            waves: data.u32be_at(64)? as usize,
            samples: data.u32be_at(68)? as usize,
            sample_data_size: data.u32be_at(72)? as usize,
        })
    }

    fn channels(&self) -> usize {
        if self.seven_voice {
            7
        } else {
            4
        }
    }

    /// Absolute offsets of the tables that follow the song headers.
    fn layout(&self) -> Layout {
        let mut sequences = [0usize; SONGS];
        let mut at = TABLES_START;
        for (s, steps) in sequences.iter_mut().zip(self.steps) {
            *s = at;
            at = at.saturating_add(steps.saturating_mul(STEP_SIZE));
        }
        let tracks = at;
        let instruments = tracks.saturating_add(self.tracks.saturating_mul(TRACK_SIZE));
        let waves = instruments.saturating_add(self.instruments.saturating_mul(INSTRUMENT_SIZE));
        let sample_headers = waves.saturating_add(self.waves.saturating_mul(WAVE_SIZE));
        let sample_data =
            sample_headers.saturating_add(self.samples.saturating_mul(SAMPLE_HEADER_SIZE));
        Layout {
            sequences,
            tracks,
            instruments,
            waves,
            sample_headers,
            sample_data,
            arpeggios: sample_data.saturating_add(self.sample_data_size),
        }
    }
}

#[derive(Debug)]
struct Layout {
    sequences: [usize; SONGS],
    tracks: usize,
    instruments: usize,
    waves: usize,
    sample_headers: usize,
    sample_data: usize,
    arpeggios: usize,
}

#[derive(Debug)]
struct SongHeader {
    looping: bool,
    loop_step: u8,
    speed: u8,
    length: usize,
    title: String,
}

impl SongHeader {
    fn read(data: &[u8], index: usize) -> Result<Self, FormatError> {
        let raw = data.slice_at(HEADER_SIZE + index * SONG_HEADER_SIZE, SONG_HEADER_SIZE)?;
        Ok(Self {
            looping: raw[0] != 0,
            loop_step: raw[1],
            speed: (raw[2] & 0x0F).max(1),
            length: raw[3] as usize,
            title: parse_string(&raw[4..]),
        })
    }
}

pub struct DigitalMugician;

impl Loader for DigitalMugician {
    fn id(&self) -> &'static str {
        "dmu"
    }

    fn name(&self) -> &'static str {
        "Digital Mugician"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["dmu", "mug", "dm2", "mug2"],
            prefixes: &["dmu", "mug", "mug2"],
            required: false,
        }
    }

    fn min_size(&self) -> usize {
        TABLES_START
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        Header::read(data).ok().map(|_| 5)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_digital_mugician(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&DigitalMugician, data)
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("Digital Mugician", data, TABLES_START)?;
    let header = Header::read(data)?;
    let song = SongHeader::read(data, 0)?;
    let layout = header.layout();
    debug!("Digital Mugician: {header:?}, {song:?}, {layout:?}");

    let channels = header.channels();
    let length = song.length.min(header.steps[0]);
    let mut patterns: Vec<Grid> = Vec::with_capacity(length);
    for pos in 0..length {
        // voices 4-6 of the seven-voice variant come from the second song
        let grid: Grid = (0..channels)
            .map(|ch| {
                let (seq, voice) = if ch < 4 { (0, ch) } else { (1, ch - 4) };
                sequence_column(data, &header, &layout, seq, pos, voice)
            })
            .collect();
        patterns.push(grid);
    }

    let arpeggios = data
        .get(layout.arpeggios..layout.arpeggios.saturating_add(ARPEGGIO_SIZE))
        .filter(|_| header.has_arpeggios);
    let mut instruments = Vec::with_capacity(header.instruments);
    for i in 0..header.instruments {
        let Ok(raw) = data.slice_at(layout.instruments + i * INSTRUMENT_SIZE, INSTRUMENT_SIZE)
        else {
            warn!("Digital Mugician: instrument table truncated at {i}");
            break;
        };
        instruments.push(read_instrument(data, &layout, raw, arpeggios, i as u16 + 1));
    }

    let order: Vec<u16> = (0..patterns.len() as u16).collect();
    let restart = if song.looping { song.loop_step as u16 } else { 0 };
    let title = name_or(song.title, || "Digital Mugician".into());

    Ok(SongBuilder::new("dmu", PlaybackFormat::DigitalMugician, channels as u8)
        .name(title)
        .patterns(patterns)
        .instruments(instruments)
        .order(order)
        .restart(restart)
        .speed(song.speed)
        .tempo(125)
        .original_counts(channels as u16, header.tracks as u16, header.instruments as u16)
        .build(ctx))
}

/// One voice of one sequence step, expanded to a full track.
fn sequence_column(
    data: &[u8],
    header: &Header,
    layout: &Layout,
    seq: usize,
    pos: usize,
    voice: usize,
) -> Vec<Cell> {
    let blank = vec![Cell::empty(); TRACK_ROWS];
    if pos >= header.steps[seq] {
        return blank;
    }
    let at = layout.sequences[seq] + pos * STEP_SIZE + voice * 2;
    let (Ok(track), Ok(transpose)) = (data.u8_at(at), data.u8_at(at + 1)) else {
        return blank;
    };
    let track = track as usize;
    if track >= header.tracks {
        debug!("Digital Mugician: step {pos} names missing track {track}");
        return blank;
    }
    let Some(rows) = data.get(layout.tracks + track * TRACK_SIZE..) else {
        return blank;
    };
    let mut column: Vec<Cell> = rows
        .chunks_exact(4)
        .take(TRACK_ROWS)
        .map(|row| {
            let mut cell = Cell::empty();
            if row[0] != 0 {
                cell.note = Note::clamped(24 + row[0] as i32 - 1 + transpose as i8 as i32);
            }
            cell.instrument = row[1];
            cell.effect = effect_parser::digital_mugician(row[2], row[3]);
            cell
        })
        .collect();
    column.resize(TRACK_ROWS, Cell::empty());
    column
}

fn read_instrument(
    data: &[u8],
    layout: &Layout,
    raw: &[u8],
    arpeggios: Option<&[u8]>,
    id: u16,
) -> Instrument {
    let wave = raw[0];
    if wave >= FIRST_SAMPLE_WAVE {
        return sample_instrument(data, layout, wave - FIRST_SAMPLE_WAVE, raw[2], id);
    }
    let wave_length = (raw[1] as u16 * 2).min(WAVE_SIZE as u16);
    let waveform = if (wave as usize) < layout_waves(layout) {
        let at = layout.waves + wave as usize * WAVE_SIZE;
        read_waveform(data, at, WAVE_SIZE, Some((0, wave_length as u32)))
    } else {
        warn!("Digital Mugician: instrument {id} names missing wave {wave}");
        None
    };
    let arp_at = raw[4] as usize * ARPEGGIO_STEPS;
    let arpeggio = arpeggios
        .and_then(|t| t.get(arp_at..arp_at + ARPEGGIO_STEPS))
        .map(|steps| steps.iter().map(|&b| b as i8).collect())
        .unwrap_or_default();

    let config = DigitalMugicianConfig {
        wave,
        wave_length,
        volume: raw[2].min(64),
        volume_speed: raw[3],
        arpeggio,
        pitch: raw[5],
        effect_step: raw[6],
        pitch_delay: raw[7],
        finetune: raw[8],
        pitch_loop: raw[9] != 0,
        pitch_speed: raw[10],
        effect: raw[11],
        sources: [raw[12], raw[13]],
        effect_speed: raw[14],
        volume_loop: raw[15] != 0,
        waveform,
    };
    Instrument::new(id, &format!("Synth {id}"), InstrumentConfig::DigitalMugician(config))
}

/// Number of wavetables the layout has room for.
fn layout_waves(layout: &Layout) -> usize {
    (layout.sample_headers - layout.waves) / WAVE_SIZE
}

fn sample_instrument(data: &[u8], layout: &Layout, sample: u8, volume: u8, id: u16) -> Instrument {
    let at = layout.sample_headers + sample as usize * SAMPLE_HEADER_SIZE;
    let in_table = at + SAMPLE_HEADER_SIZE <= layout.sample_data;
    let Some(raw) = data.get(at..at + SAMPLE_HEADER_SIZE).filter(|_| in_table) else {
        warn!("Digital Mugician: instrument {id} names missing sample {sample}");
        return Instrument::placeholder(id, &format!("Sample {}", sample + 1));
    };
    let word = |o: usize| u32::from_be_bytes([raw[o], raw[o + 1], raw[o + 2], raw[o + 3]]);
    let (start, end, loop_at) = (word(0), word(4), word(8));
    let length = end.saturating_sub(start);
    let loop_points = (loop_at != 0 && loop_at > start && loop_at < end)
        .then(|| (loop_at - start, length));
    let record = SampleRecord {
        name: name_or(parse_string(&raw[12..]), || format!("Sample {}", sample + 1)),
        offset: layout.sample_data.saturating_add(start as usize),
        length: length as usize,
        loop_points,
        volume: volume.min(64),
        ..Default::default()
    };
    extract_sampler(id, &record, data)
}
