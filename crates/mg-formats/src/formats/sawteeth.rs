//! Sawteeth binary (`SWTD`) modules.
//!
//! Channels are sequences of parts; each part is a list of fixed-length
//! steps. Every channel is flattened into one event stream and cut into
//! patterns, since channels play parts of different lengths and speeds.

use log::{debug, warn};
use mg_ir::{
    Envelope, Instrument, InstrumentConfig, Note, PlaybackFormat, SawteethConfig, SawteethStep,
    Song,
};

use super::{load_standalone, name_or};
use crate::assembler::{PanScheme, SongBuilder};
use crate::cursor::{BinaryRead, ByteCursor};
use crate::effect_parser;
use crate::normalizer::{normalize, slice_columns, StreamEvent};
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const MAX_VERSION: u16 = 1200;
const MAX_CHANNELS: u8 = 12;
const STEP_RELATIVE: u8 = 0x80;

#[derive(Debug)]
struct ChannelStep {
    part: u8,
    transpose: i8,
}

#[derive(Debug)]
struct SongChannel {
    left: u8,
    right: u8,
    steps: Vec<ChannelStep>,
}

impl SongChannel {
    fn pan(&self) -> i8 {
        ((self.right as i32 - self.left as i32) * 64 / 255) as i8
    }
}

#[derive(Debug)]
struct PartStep {
    instrument: u8,
    effect: u8,
    note: u8,
}

#[derive(Debug)]
struct Part {
    ticks_per_step: u8,
    steps: Vec<PartStep>,
}

pub struct Sawteeth;

impl Loader for Sawteeth {
    fn id(&self) -> &'static str {
        "saw"
    }

    fn name(&self) -> &'static str {
        "Sawteeth"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["st", "saw"],
            prefixes: &["st"],
            required: false,
        }
    }

    fn min_size(&self) -> usize {
        8
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        if data.slice_at(0, 4).ok()? != b"SWTD" {
            return None;
        }
        let version = data.u16be_at(4).ok()?;
        let channels = data.u8_at(if version >= 900 { 8 } else { 6 }).ok()?;
        (version <= MAX_VERSION && (1..=MAX_CHANNELS).contains(&channels)).then_some(3)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_sawteeth(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&Sawteeth, data)
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    let mut cur = ByteCursor::new(data);
    if cur.read_bytes(4)? != b"SWTD" {
        return Err(FormatError::InvalidHeader {
            format: "Sawteeth",
            reason: "missing SWTD tag".into(),
        });
    }
    let version = cur.read_u16_be()?;
    if version > MAX_VERSION {
        return Err(FormatError::InvalidHeader {
            format: "Sawteeth",
            reason: format!("unsupported version {version}"),
        });
    }
    let samples_per_tick = if version >= 900 { cur.read_u16_be()? } else { 0 };

    let channel_count = cur.read_u8()?;
    if !(1..=MAX_CHANNELS).contains(&channel_count) {
        return Err(FormatError::InvalidHeader {
            format: "Sawteeth",
            reason: format!("{channel_count} channels"),
        });
    }
    // Past the header a short file keeps what was read; records that
    // can't be located after a failure are left out.
    let mut channels = Vec::with_capacity(channel_count as usize);
    let mut intact = read_records("channel", channel_count as usize, &mut channels, || {
        read_channel(&mut cur, version)
    });
    let mut parts = Vec::new();
    let mut part_count = 0;
    if intact {
        part_count = cur.read_u8().unwrap_or(0);
        intact = read_records("part", part_count as usize, &mut parts, || read_part(&mut cur));
    }
    // Instrument 0 is implicit and never stored.
    let mut instruments = Vec::new();
    let mut stored = 0;
    if intact {
        stored = cur.read_u8().unwrap_or(0).saturating_sub(1);
        let mut id = 0;
        intact = read_records("instrument", stored as usize, &mut instruments, || {
            id += 1;
            read_instrument(&mut cur, id, version)
        });
    }

    let title = match intact.then(|| read_trailer(&mut cur)) {
        Some(Ok(title)) => title,
        Some(Err(e)) => {
            warn!("Sawteeth: break points or names unreadable: {e}");
            String::new()
        }
        None => String::new(),
    };
    debug!(
        "Sawteeth v{version}: {channel_count} channels, {part_count} parts, {stored} instruments"
    );

    let ticks_per_row = parts
        .iter()
        .map(|p| p.ticks_per_step.max(1))
        .min()
        .unwrap_or(6) as u32;
    let max_rows = ctx.options.max_rows_per_channel;
    let columns: Vec<_> = channels
        .iter()
        .enumerate()
        .map(|(ch, channel)| {
            let events = channel_events(channel, &parts);
            let column = normalize(&events, ticks_per_row, max_rows);
            if column.truncated {
                warn!("Sawteeth: channel {ch} cut at {max_rows} rows");
            }
            column.cells
        })
        .collect();

    let tempo = match samples_per_tick {
        0 => 125,
        sps => (110_250 / sps as u32).clamp(32, 255) as u8,
    };

    Ok(SongBuilder::new("saw", PlaybackFormat::Sawteeth, channel_count)
        .name(name_or(title, || "Sawteeth".into()))
        .pan(PanScheme::Explicit(channels.iter().map(SongChannel::pan).collect()))
        .patterns(slice_columns(&columns, ctx.options.rows_per_pattern))
        .instruments(instruments)
        .speed(ticks_per_row.clamp(1, 31) as u8)
        .tempo(tempo)
        .original_counts(channel_count as u16, part_count as u16, stored as u16)
        .build(ctx))
}

/// Read up to `count` records into `out`. Returns false if the file ran out
/// first, in which case the cursor position is meaningless.
fn read_records<T>(
    what: &str,
    count: usize,
    out: &mut Vec<T>,
    mut read: impl FnMut() -> Result<T, FormatError>,
) -> bool {
    for i in 0..count {
        match read() {
            Ok(record) => out.push(record),
            Err(e) => {
                warn!("Sawteeth: {what} {i} of {count} unreadable: {e}");
                return false;
            }
        }
    }
    true
}

fn read_channel(cur: &mut ByteCursor<'_>, version: u16) -> Result<SongChannel, FormatError> {
    let left = cur.read_u8()?;
    let right = cur.read_u8()?;
    let len = cur.read_u16_be()?;
    if version >= 910 {
        cur.skip(2)?; // loop
    }
    if version >= 1200 {
        cur.skip(2)?; // right-hand loop length
    }
    let steps = (0..len)
        .map(|_| {
            let part = cur.read_u8()?;
            let transpose = cur.read_i8()?;
            cur.skip(1)?; // damp
            Ok(ChannelStep { part, transpose })
        })
        .collect::<Result<Vec<_>, FormatError>>()?;
    Ok(SongChannel { left, right, steps })
}

fn read_part(cur: &mut ByteCursor<'_>) -> Result<Part, FormatError> {
    let ticks_per_step = cur.read_u8()?;
    let len = cur.read_u8()?;
    let steps = (0..len)
        .map(|_| {
            Ok(PartStep {
                instrument: cur.read_u8()?,
                effect: cur.read_u8()?,
                note: cur.read_u8()?,
            })
        })
        .collect::<Result<Vec<_>, FormatError>>()?;
    Ok(Part {
        ticks_per_step,
        steps,
    })
}

/// Point count, then (delta time, level) pairs.
fn read_envelope(cur: &mut ByteCursor<'_>) -> Result<Envelope, FormatError> {
    let count = cur.read_u8()?;
    let mut envelope = Envelope::new();
    let mut tick = 0u16;
    for _ in 0..count {
        tick = tick.saturating_add(cur.read_u8()? as u16);
        envelope.add_point(tick, cur.read_u8()?);
    }
    Ok(envelope)
}

fn read_instrument(
    cur: &mut ByteCursor<'_>,
    id: u16,
    version: u16,
) -> Result<Instrument, FormatError> {
    let filter = read_envelope(cur)?;
    let amplitude = read_envelope(cur)?;
    let filter_mode = cur.read_u8()?;
    let clip_boost = cur.read_u8()?;
    let vibrato_speed = cur.read_u8()?;
    let vibrato_depth = cur.read_u8()?;
    let pwm_speed = cur.read_u8()?;
    let pwm_depth = cur.read_u8()?;
    let resonance = cur.read_u8()?;
    let ticks_per_step = cur.read_u8()?;
    let len = cur.read_u8()?;
    let loop_step = if version >= 900 { cur.read_u8()? } else { 0 };
    let steps = (0..len)
        .map(|_| {
            let mode = cur.read_u8()?;
            Ok(SawteethStep {
                relative: mode & STEP_RELATIVE != 0,
                waveform: mode & 0x0F,
                note: cur.read_u8()?,
            })
        })
        .collect::<Result<Vec<_>, FormatError>>()?;

    Ok(Instrument::new(
        id,
        &format!("Instrument {id}"),
        InstrumentConfig::Sawteeth(SawteethConfig {
            filter,
            amplitude,
            filter_mode,
            clip_mode: clip_boost >> 4,
            boost: clip_boost & 0x0F,
            vibrato_speed,
            vibrato_depth,
            pwm_speed,
            pwm_depth,
            resonance,
            ticks_per_step,
            loop_step: loop_step.min(len.saturating_sub(1)),
            steps,
        }),
    ))
}

/// Skip break points and return the song name.
fn read_trailer(cur: &mut ByteCursor<'_>) -> Result<String, FormatError> {
    let breaks = cur.read_u8()? as usize;
    cur.skip(breaks * 8)?;
    cur.read_cstring()
}

fn channel_events(channel: &SongChannel, parts: &[Part]) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for step in &channel.steps {
        let Some(part) = parts.get(step.part as usize) else {
            warn!("Sawteeth: channel refers to missing part {}", step.part);
            continue;
        };
        let duration = part.ticks_per_step.max(1) as u32;
        for s in &part.steps {
            if s.instrument != 0 {
                events.push(StreamEvent::Instrument(s.instrument));
            }
            events.push(StreamEvent::Effect(effect_parser::sawteeth(s.effect)));
            let note = match s.note {
                0 => Note::None,
                n => Note::clamped(n as i32 - 1 + step.transpose as i32),
            };
            events.push(StreamEvent::Note { note, duration });
        }
    }
    events.push(StreamEvent::End);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_ir::{Effect, SynthKind};

    fn make_minimal_saw() -> Vec<u8> {
        let mut data = b"SWTD".to_vec();
        data.extend_from_slice(&[0x04, 0xB0, 0x03, 0x72]); // v1200, 882 samples per tick
        data.extend_from_slice(&[1, 0, 255, 0, 1, 0, 0, 0, 0, 0, 0, 0]);
        data.extend_from_slice(&[1, 6, 2, 1, 0xC8, 49, 0, 0, 0]);
        data.push(2);
        data.extend_from_slice(&[1, 0, 255, 2, 0, 64, 10, 0]);
        data.extend_from_slice(&[1, 0x23, 1, 2, 3, 4, 5, 2, 1, 0, 0x82, 0]);
        data.push(0);
        data.extend_from_slice(b"tune\0me\0");
        data
    }

    #[test]
    fn decodes_minimal_song() {
        let data = make_minimal_saw();
        assert_eq!(Sawteeth.probe(&data), Some(3));
        let song = load_sawteeth(&data).unwrap();

        assert_eq!(song.format.as_str(), "SAW");
        assert_eq!(song.num_channels, 1);
        assert_eq!(song.name.as_str(), "tune");
        assert_eq!(song.initial_speed, 6);
        assert_eq!(song.initial_tempo, 125);

        let p = &song.patterns[0];
        assert_eq!(p.channels[0].pan, 64);
        let c = p.cell(0, 0);
        assert_eq!(c.note, Note::On(48));
        assert_eq!(c.instrument, 1);
        assert_eq!(c.effect, Effect::SetVolume(34));
        assert!(p.cell(1, 0).is_empty());

        assert_eq!(song.instruments.len(), 1);
        assert_eq!(song.instruments[0].kind(), SynthKind::Sawteeth);
        match &song.instruments[0].config {
            InstrumentConfig::Sawteeth(cfg) => {
                let ticks: Vec<_> = cfg.amplitude.points.iter().map(|p| (p.tick, p.value)).collect();
                assert_eq!(ticks, [(0, 64), (10, 0)]);
                assert_eq!((cfg.clip_mode, cfg.boost), (2, 3));
                assert_eq!(cfg.ticks_per_step, 2);
                assert!(cfg.steps[0].relative);
                assert_eq!(cfg.steps[0].waveform, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_text_modules_and_bad_channel_counts() {
        let mut data = make_minimal_saw();
        data[3] = b'T';
        assert_eq!(Sawteeth.probe(&data), None);

        let mut data = make_minimal_saw();
        data[8] = 13;
        assert_eq!(Sawteeth.probe(&data), None);
        assert!(load_sawteeth(&data).is_err());
    }

    #[test]
    fn truncated_records_keep_what_was_read() {
        let data = make_minimal_saw();
        // inside the part record
        let song = load_sawteeth(&data[..24]).unwrap();
        assert_eq!(song.num_channels, 1);
        assert!(song.patterns[0].is_blank());
        assert_eq!(song.instruments.len(), 1);
        assert!(song.instruments[0].is_placeholder());

        // inside the instrument record: the part still plays
        let song = load_sawteeth(&data[..36]).unwrap();
        assert_eq!(song.patterns[0].cell(0, 0).note, Note::On(48));
        assert!(song.instruments[0].is_placeholder());
        assert_eq!(song.name.as_str(), "Sawteeth");
    }
}
