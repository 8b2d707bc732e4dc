//! MIDI-Loriciel: Standard MIDI Files from Loriciel games.
//!
//! Each MIDI channel that plays notes becomes one tracker channel. Notes
//! are snapped to rows of a sixteenth note and fed to the normalizer,
//! keeping only the first note that lands on a row.

use log::{debug, warn};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use mg_ir::{Instrument, Note, PlaybackFormat, Song};

use super::load_standalone;
use crate::assembler::{PanScheme, SongBuilder};
use crate::cursor::BinaryRead;
use crate::normalizer::{normalize, slice_columns, StreamEvent};
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const DRUM_CHANNEL: u8 = 9;
const DEFAULT_PPQN: u32 = 96;
const DEFAULT_TEMPO: u8 = 120;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Voice {
    On { key: u8, vel: u8 },
    Off { key: u8 },
    Program(u8),
}

#[derive(Clone, Copy, Debug)]
struct Timed {
    tick: u64,
    channel: u8,
    voice: Voice,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Patch {
    Program(u8),
    Drums,
}

/// Instruments in order of first use.
#[derive(Default)]
struct Patches(Vec<Patch>);

impl Patches {
    fn id(&mut self, patch: Patch) -> u8 {
        let idx = match self.0.iter().position(|&p| p == patch) {
            Some(idx) => idx,
            None => {
                self.0.push(patch);
                self.0.len() - 1
            }
        };
        (idx + 1).min(u8::MAX as usize) as u8
    }

    fn into_instruments(self) -> Vec<Instrument> {
        self.0
            .into_iter()
            .enumerate()
            .map(|(i, patch)| {
                let name = match patch {
                    Patch::Program(p) => format!("Program {}", p as u16 + 1),
                    Patch::Drums => "Drums".to_string(),
                };
                Instrument::placeholder(i as u16 + 1, &name)
            })
            .collect()
    }
}

pub struct MidiLoriciel;

impl Loader for MidiLoriciel {
    fn id(&self) -> &'static str {
        "midi"
    }

    fn name(&self) -> &'static str {
        "MIDI-Loriciel"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["mid", "midi"],
            prefixes: &["midi"],
            required: true,
        }
    }

    fn min_size(&self) -> usize {
        14
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        let ok = data.slice_at(0, 4).ok()? == b"MThd"
            && data.u32be_at(4).ok()? == 6
            && data.u16be_at(8).ok()? <= 2
            && data.u16be_at(10).ok()? >= 1;
        ok.then_some(4)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        let smf = match Smf::parse(data) {
            Ok(smf) => Some(smf),
            // The header is sound, so only track data is lost.
            Err(e) if self.check(data).is_some() => {
                warn!("MIDI: track data unreadable ({e}), importing the header only");
                None
            }
            Err(e) => {
                return Err(FormatError::InvalidHeader {
                    format: "MIDI",
                    reason: e.to_string(),
                })
            }
        };
        let ppqn = match smf.as_ref().map(|smf| smf.header.timing) {
            Some(Timing::Metrical(t)) => t.as_int() as u32,
            Some(Timing::Timecode(..)) => {
                warn!("MIDI: timecode timing, assuming {DEFAULT_PPQN} ticks per beat");
                DEFAULT_PPQN
            }
            None => DEFAULT_PPQN,
        };
        let tracks = smf.as_ref().map_or(&[][..], |smf| smf.tracks.as_slice());
        let ticks_per_row = (ppqn / 4).max(1);

        let mut tempo = None;
        let mut timeline = Vec::new();
        for track in tracks {
            let mut tick = 0u64;
            for event in track {
                tick += event.delta.as_int() as u64;
                match event.kind {
                    TrackEventKind::Meta(MetaMessage::Tempo(uspq)) if tempo.is_none() => {
                        tempo = Some(uspq.as_int());
                    }
                    TrackEventKind::Midi { channel, message } => {
                        let voice = match message {
                            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => Voice::On {
                                key: key.as_int(),
                                vel: vel.as_int(),
                            },
                            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                                Voice::Off { key: key.as_int() }
                            }
                            MidiMessage::ProgramChange { program } => Voice::Program(program.as_int()),
                            _ => continue,
                        };
                        timeline.push(Timed {
                            tick,
                            channel: channel.as_int(),
                            voice,
                        });
                    }
                    _ => {}
                }
            }
        }
        // Stable: simultaneous events keep track order.
        timeline.sort_by_key(|t| t.tick);

        let used: Vec<u8> = (0..16u8)
            .filter(|&ch| {
                timeline
                    .iter()
                    .any(|t| t.channel == ch && matches!(t.voice, Voice::On { .. }))
            })
            .collect();
        debug!(
            "MIDI: {} tracks, ppqn {ppqn}, channels {used:?}",
            tracks.len()
        );

        let mut patches = Patches::default();
        let max_rows = ctx.options.max_rows_per_channel;
        let columns: Vec<_> = used
            .iter()
            .map(|&ch| {
                let events = channel_events(&timeline, ch, ticks_per_row, &mut patches);
                let column = normalize(&events, ticks_per_row, max_rows);
                if column.truncated {
                    warn!("MIDI: channel {} cut at {max_rows} rows", ch + 1);
                }
                column.cells
            })
            .collect();

        let tempo = tempo
            .filter(|&t| t > 0)
            .map_or(DEFAULT_TEMPO, |uspq| (60_000_000 / uspq).clamp(32, 255) as u8);
        let names = used.iter().map(|ch| format!("MIDI {}", ch + 1)).collect();

        Ok(SongBuilder::new("midi", PlaybackFormat::Xm, used.len().max(1) as u8)
            .pan(PanScheme::Center)
            .channel_names(names)
            .patterns(slice_columns(&columns, ctx.options.rows_per_pattern))
            .instruments(patches.into_instruments())
            .speed(6)
            .tempo(tempo)
            .original_counts(used.len() as u16, tracks.len() as u16, 0)
            .build(ctx))
    }
}

pub fn load_midi_loriciel(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&MidiLoriciel, data)
}

/// Monophonic event stream for one MIDI channel.
fn channel_events(
    timeline: &[Timed],
    channel: u8,
    ticks_per_row: u32,
    patches: &mut Patches,
) -> Vec<StreamEvent> {
    let row_of = |tick: u64| (tick + ticks_per_row as u64 / 2) / ticks_per_row as u64;

    // (row, note, instrument, volume)
    let mut slots: Vec<(u64, Note, u8, Option<u8>)> = Vec::new();
    let mut program = 0u8;
    let mut sounding: Option<u8> = None;
    for t in timeline.iter().filter(|t| t.channel == channel) {
        let row = row_of(t.tick);
        let slot = match t.voice {
            Voice::Program(p) => {
                program = p;
                continue;
            }
            Voice::On { key, vel } => {
                sounding = Some(key);
                let patch = if channel == DRUM_CHANNEL {
                    Patch::Drums
                } else {
                    Patch::Program(program)
                };
                let volume = ((vel as u32 * 64 + 63) / 127) as u8;
                (row, Note::clamped(key as i32 - 12), patches.id(patch), Some(volume))
            }
            Voice::Off { key } if sounding == Some(key) => {
                sounding = None;
                (row, Note::Off, 0, None)
            }
            Voice::Off { .. } => continue,
        };
        match slots.last().filter(|s| s.0 == row).map(|s| s.1) {
            // A release and a new note on the same row: the note wins.
            Some(Note::Off) => {
                slots.pop();
                slots.push(slot);
            }
            Some(_) => continue,
            None => slots.push(slot),
        }
    }

    let mut events = Vec::with_capacity(slots.len() * 3 + 2);
    if let Some(&(first, ..)) = slots.first() {
        if first > 0 {
            events.push(StreamEvent::Note {
                note: Note::None,
                duration: (first * ticks_per_row as u64) as u32,
            });
        }
    }
    for (i, &(row, note, instrument, volume)) in slots.iter().enumerate() {
        let next = slots.get(i + 1).map_or(row + 1, |s| s.0);
        if instrument > 0 {
            events.push(StreamEvent::Instrument(instrument));
        }
        if let Some(v) = volume {
            events.push(StreamEvent::Volume(v));
        }
        let duration = ((next - row) * ticks_per_row as u64).min(u32::MAX as u64) as u32;
        events.push(StreamEvent::Note { note, duration });
    }
    events.push(StreamEvent::End);
    events
}
