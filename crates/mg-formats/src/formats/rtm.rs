//! Real Tracker 2 (`.rtm`).
//!
//! The file is a chain of tagged objects: one `RTMM` song header, then
//! `RTND` patterns, then `RTIN` instruments each followed by their `RTSM`
//! samples. Every object starts with the same 42-byte header whose size
//! field gives the length of the object-specific header that follows.

use std::io::Cursor;

use binrw::BinRead;
use log::{debug, warn};
use mg_ir::{Cell, Instrument, LoopMode, Note, PlaybackFormat, Song};

use super::{load_standalone, require_len};
use crate::assembler::{PanScheme, SongBuilder, MAX_ROWS};
use crate::cursor::{parse_string, BinaryRead, ByteCursor};
use crate::effect_parser;
use crate::extractor::{extract_sampler, PcmEncoding, SampleRecord};
use crate::normalizer::Grid;
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const OBJECT_HEADER_SIZE: usize = 42;
const SONG_HEADER_SIZE: usize = 130;
const SAMPLE_HEADER_SIZE: usize = 26;
const TRACK_NAME_SIZE: usize = 16;
const KEY_OFF: u8 = 0xFE;

#[derive(BinRead, Debug)]
#[br(little)]
struct ObjectHeader {
    id: [u8; 4],
    space: u8,
    name: [u8; 32],
    eof: u8,
    _version: u16,
    object_size: u16,
}

#[derive(BinRead, Debug)]
#[br(little)]
struct SongHeader {
    _software: [u8; 20],
    _composer: [u8; 32],
    flags: u16,
    channels: u8,
    instruments: u8,
    orders: u16,
    patterns: u16,
    speed: u8,
    tempo: u8,
    pan: [i8; 32],
    extra_size: u32,
}

impl SongHeader {
    const LINEAR_SLIDES: u16 = 0x0001;
    const TRACK_NAMES: u16 = 0x0002;
}

#[derive(BinRead, Debug)]
#[br(little)]
struct PatternHeader {
    _flags: u16,
    _tracks: u8,
    rows: u16,
    data_size: u32,
}

#[derive(BinRead, Debug)]
#[br(little)]
struct SampleHeader {
    flags: u16,
    _base_volume: u8,
    default_volume: u8,
    length: u32,
    loop_type: u8,
    _reserved: [u8; 3],
    loop_begin: u32,
    loop_end: u32,
    rate: u32,
    _base_note: u8,
    pan: i8,
}

impl SampleHeader {
    const SIXTEEN_BIT: u16 = 0x0002;
    const DELTA: u16 = 0x0004;
}

/// Reads a `T` at `pos`.
fn read_at<T>(data: &[u8], pos: usize) -> Result<T, FormatError>
where
    T: for<'a> BinRead<Args<'a> = ()> + binrw::meta::ReadEndian,
{
    let mut cursor = Cursor::new(data);
    cursor.set_position(pos as u64);
    Ok(T::read(&mut cursor)?)
}

/// Object header at `pos`, checked against `tag`. Returns the header and
/// the offset of the object-specific data.
fn object_at(data: &[u8], pos: usize, tag: &[u8; 4]) -> Result<(ObjectHeader, usize), FormatError> {
    let header: ObjectHeader = read_at(data, pos)?;
    if &header.id != tag {
        return Err(FormatError::InvalidHeader {
            format: "RTM",
            reason: format!(
                "expected {} object at {pos:#x}",
                String::from_utf8_lossy(tag)
            ),
        });
    }
    Ok((header, pos + OBJECT_HEADER_SIZE))
}

pub struct RealTracker;

impl Loader for RealTracker {
    fn id(&self) -> &'static str {
        "rtm"
    }

    fn name(&self) -> &'static str {
        "Real Tracker 2"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["rtm"],
            prefixes: &[],
            required: false,
        }
    }

    fn min_size(&self) -> usize {
        OBJECT_HEADER_SIZE + SONG_HEADER_SIZE
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        let (object, content) = object_at(data, 0, b"RTMM").ok()?;
        if object.space != 0x20 || object.eof != 0x1A {
            return None;
        }
        if (object.object_size as usize) < SONG_HEADER_SIZE {
            return None;
        }
        let song: SongHeader = read_at(data, content).ok()?;
        (1..=32).contains(&song.channels).then_some(4)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_rtm(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&RealTracker, data)
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("RTM", data, OBJECT_HEADER_SIZE + SONG_HEADER_SIZE)?;
    let (object, content) = object_at(data, 0, b"RTMM")?;
    let song: SongHeader = read_at(data, content)?;
    let channels = song.channels.clamp(1, 32) as usize;

    let extra = content + object.object_size as usize;
    let order: Vec<u16> = (0..song.orders as usize)
        .map_while(|i| data.u16le_at(extra + i * 2).ok())
        .collect();
    if order.len() < song.orders as usize {
        warn!("RTM: order list truncated at {} of {} entries", order.len(), song.orders);
    }
    let channel_names: Vec<String> = if song.flags & SongHeader::TRACK_NAMES != 0 {
        let names = extra + song.orders as usize * 2;
        (0..channels)
            .map(|ch| data.string_at(names + ch * TRACK_NAME_SIZE, TRACK_NAME_SIZE))
            .collect::<Result<_, _>>()
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    let mut pos = extra + song.extra_size as usize;
    let mut patterns = Vec::with_capacity(song.patterns as usize);
    for idx in 0..song.patterns {
        match read_pattern(data, pos, channels) {
            Ok((grid, next)) => {
                patterns.push(grid);
                pos = next;
            }
            Err(e) => {
                warn!("RTM: pattern {idx}: {e}; keeping {}", patterns.len());
                break;
            }
        }
    }
    // Instruments can't be located past a broken pattern.
    let patterns_complete = patterns.len() == song.patterns as usize;

    let mut instruments = Vec::with_capacity(song.instruments as usize);
    if patterns_complete {
        for idx in 0..song.instruments {
            let id = idx as u16 + 1;
            match read_instrument(data, pos, id) {
                Ok((instrument, next)) => {
                    instruments.push(instrument);
                    pos = next;
                }
                Err(e) => {
                    warn!("RTM: instrument {id}: {e}");
                    break;
                }
            }
        }
    }

    let pans = song.pan[..channels].iter().map(|&p| p.clamp(-64, 64)).collect();

    Ok(SongBuilder::new("rtm", PlaybackFormat::Xm, channels as u8)
        .name(parse_string(&object.name))
        .pan(PanScheme::Explicit(pans))
        .channel_names(channel_names)
        .patterns(patterns)
        .instruments(instruments)
        .order(order)
        .speed(song.speed)
        .tempo(song.tempo)
        .linear_slides(song.flags & SongHeader::LINEAR_SLIDES != 0)
        .original_counts(song.channels as u16, song.patterns, song.instruments as u16)
        .build(ctx))
}

/// Decode one `RTND` object. Returns the grid and the next object offset.
fn read_pattern(data: &[u8], pos: usize, channels: usize) -> Result<(Grid, usize), FormatError> {
    let (object, content) = object_at(data, pos, b"RTND")?;
    let header: PatternHeader = read_at(data, content)?;
    let start = content + object.object_size as usize;
    let packed = data.slice_at(start, header.data_size as usize)?;
    let rows = (header.rows as usize).clamp(1, MAX_ROWS);
    if header.rows as usize > MAX_ROWS {
        warn!("RTM: pattern at {pos:#x} has {} rows, keeping {MAX_ROWS}", header.rows);
    }
    Ok((unpack_rows(packed, rows, channels), start + packed.len()))
}

fn unpack_rows(packed: &[u8], rows: usize, channels: usize) -> Grid {
    let mut grid = vec![vec![Cell::empty(); rows]; channels];
    let mut cur = ByteCursor::new(packed);
    let (mut row, mut ch) = (0usize, 0usize);

    while row < rows {
        let Ok(flags) = cur.read_u8() else { break };
        if flags == 0 {
            row += 1;
            ch = 0;
            continue;
        }
        let Ok([channel, note, instrument, cmd1, param1, cmd2, param2]) = read_fields(&mut cur, flags)
        else {
            warn!("RTM: packed data ends inside row {row}");
            break;
        };
        if let Some(c) = channel {
            ch = c as usize;
        }

        if let Some(cell) = grid.get_mut(ch).map(|col| &mut col[row]) {
            cell.note = match note {
                Some(KEY_OFF) => Note::Off,
                Some(n) => Note::clamped(n as i32),
                None => Note::None,
            };
            cell.instrument = instrument.unwrap_or(0);
            if cmd1.is_some() || param1.is_some() {
                cell.effect = effect_parser::xm(cmd1.unwrap_or(0), param1.unwrap_or(0));
            }
            if cmd2.is_some() || param2.is_some() {
                cell.effect2 = effect_parser::xm(cmd2.unwrap_or(0), param2.unwrap_or(0));
            }
        }
        ch += 1;
    }
    grid
}

/// Optional fields of a packed cell, in flag-bit order.
fn read_fields(cur: &mut ByteCursor<'_>, flags: u8) -> Result<[Option<u8>; 7], FormatError> {
    let mut fields = [None; 7];
    for (bit, field) in fields.iter_mut().enumerate() {
        if flags & (1 << bit) != 0 {
            *field = Some(cur.read_u8()?);
        }
    }
    Ok(fields)
}

/// Decode one `RTIN` object and its samples, keeping the first sample.
fn read_instrument(data: &[u8], pos: usize, id: u16) -> Result<(Instrument, usize), FormatError> {
    let (object, content) = object_at(data, pos, b"RTIN")?;
    let name = parse_string(&object.name);
    let num_samples = data.u8_at(content)?;
    let mut next = content + object.object_size as usize;

    let mut first = None;
    for s in 0..num_samples {
        let (sample_object, sample_content) = object_at(data, next, b"RTSM")?;
        let header: SampleHeader = read_at(data, sample_content)?;
        let pcm = sample_content + (sample_object.object_size as usize).max(SAMPLE_HEADER_SIZE);
        next = pcm + header.length as usize;
        if s == 0 {
            first = Some(sample_record(&header, &name, pcm));
        } else {
            debug!("RTM: instrument {id}: skipping extra sample {s}");
        }
    }

    let instrument = match first {
        Some(record) => extract_sampler(id, &record, data),
        None => Instrument::placeholder(id, &name),
    };
    Ok((instrument, next.min(data.len())))
}

fn sample_record(header: &SampleHeader, name: &str, offset: usize) -> SampleRecord {
    let sixteen = header.flags & SampleHeader::SIXTEEN_BIT != 0;
    let delta = header.flags & SampleHeader::DELTA != 0;
    let encoding = match (sixteen, delta) {
        (true, true) => PcmEncoding::Delta16Le,
        (true, false) => PcmEncoding::Signed16Le,
        (false, true) => PcmEncoding::Delta8,
        (false, false) => PcmEncoding::Signed8,
    };
    let frame = encoding.bytes_per_frame() as u32;
    let (loop_points, loop_mode) = match header.loop_type {
        1 => (Some((header.loop_begin / frame, header.loop_end / frame)), LoopMode::Forward),
        2 => (Some((header.loop_begin / frame, header.loop_end / frame)), LoopMode::PingPong),
        _ => (None, LoopMode::Forward),
    };

    SampleRecord {
        name: name.to_string(),
        offset,
        length: header.length as usize,
        loop_points,
        loop_mode,
        encoding,
        sample_rate: header.rate,
        volume: header.default_volume.min(64),
        pan: Some(header.pan.clamp(-64, 64)),
        ..Default::default()
    }
}
