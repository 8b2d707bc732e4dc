//! Future Composer 1.3 (`SMOD`) and 1.4 (`FC14`).
//!
//! Songs are a list of sequence steps, each naming one 32-row pattern per
//! voice with a note and instrument transpose. Instruments are volume
//! macros; their frequency macro selects the waveform.

use log::{debug, warn};
use mg_ir::{
    Cell, Effect, FutureComposerConfig, Instrument, InstrumentConfig, Note, PlaybackFormat, Song,
    Waveform,
};

use super::{load_standalone, require_len};
use crate::assembler::SongBuilder;
use crate::cursor::BinaryRead;
use crate::extractor::read_waveform;
use crate::normalizer::Grid;
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const SAMPLE_INFO: usize = 40;
const NUM_SAMPLES: usize = 10;
const WAVE_LENGTHS: usize = 100;
const NUM_WAVES: usize = 80;
const STEP_SIZE: usize = 13;
const PATTERN_SIZE: usize = 64;
const MACRO_SIZE: usize = 64;
const ROWS: usize = 32;
const PATTERN_END: u8 = 0x49;
const DEFAULT_SPEED: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Version {
    Fc13,
    Fc14,
}

impl Version {
    fn detect(data: &[u8]) -> Option<Self> {
        match data.get(..4)? {
            b"SMOD" => Some(Version::Fc13),
            b"FC14" => Some(Version::Fc14),
            _ => None,
        }
    }

    fn sequence_offset(self) -> usize {
        match self {
            Version::Fc13 => WAVE_LENGTHS,
            Version::Fc14 => WAVE_LENGTHS + NUM_WAVES,
        }
    }
}

/// Offsets from the file header.
#[derive(Debug)]
struct Layout {
    version: Version,
    sequence_length: usize,
    patterns: (usize, usize),
    frequency_macros: (usize, usize),
    volume_macros: (usize, usize),
    sample_data: usize,
    wave_data: usize,
}

impl Layout {
    fn read(data: &[u8]) -> Result<Self, FormatError> {
        let version = Version::detect(data).ok_or_else(|| FormatError::InvalidHeader {
            format: "Future Composer",
            reason: "missing SMOD/FC14 tag".into(),
        })?;
        let at = |ofs| data.u32be_at(ofs).map(|v| v as usize);
        Ok(Self {
            version,
            sequence_length: at(4)?,
            patterns: (at(8)?, at(12)?),
            frequency_macros: (at(16)?, at(20)?),
            volume_macros: (at(24)?, at(28)?),
            sample_data: at(32)?,
            wave_data: at(36)?,
        })
    }

    fn is_plausible(&self, len: usize) -> bool {
        let inside = |(ofs, size): (usize, usize)| ofs.saturating_add(size) <= len;
        self.sequence_length > 0
            && self.sequence_length % STEP_SIZE == 0
            && self.version.sequence_offset() + self.sequence_length <= len
            && inside(self.patterns)
            && inside(self.frequency_macros)
            && inside(self.volume_macros)
    }
}

/// One voice of a sequence step.
#[derive(Clone, Copy, Debug, Default)]
struct Voice {
    pattern: u8,
    transpose: i8,
    sound_transpose: i8,
}

#[derive(Clone, Copy, Debug, Default)]
struct Step {
    voices: [Voice; 4],
    speed: u8,
}

pub struct FutureComposer;

impl Loader for FutureComposer {
    fn id(&self) -> &'static str {
        "fc"
    }

    fn name(&self) -> &'static str {
        "Future Composer 1.3/1.4"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["fc", "fc13", "fc14", "smod"],
            prefixes: &["fc"],
            required: false,
        }
    }

    fn min_size(&self) -> usize {
        WAVE_LENGTHS
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        let layout = Layout::read(data).ok()?;
        layout.is_plausible(data.len()).then_some(4)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        decode(data, ctx)
    }
}

pub fn load_fc(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&FutureComposer, data)
}

fn decode(data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
    require_len("Future Composer", data, WAVE_LENGTHS)?;
    let layout = Layout::read(data)?;
    debug!("Future Composer: {layout:?}");

    let seq_start = layout.version.sequence_offset();
    let steps: Vec<Step> = data
        .get(seq_start..seq_start + layout.sequence_length)
        .unwrap_or_else(|| {
            warn!("Future Composer: sequence table truncated");
            data.get(seq_start..).unwrap_or_default()
        })
        .chunks_exact(STEP_SIZE)
        .map(parse_step)
        .collect();

    let patterns: Vec<Grid> = steps.iter().map(|step| build_step(data, &layout, step)).collect();
    let speed = steps
        .first()
        .map(|s| s.speed)
        .filter(|&s| s != 0)
        .unwrap_or(DEFAULT_SPEED);

    let instruments = read_instruments(data, &layout);
    let num_macros = layout.volume_macros.1 / MACRO_SIZE;

    Ok(SongBuilder::new("fc", PlaybackFormat::FutureComposer, 4)
        .patterns(patterns)
        .instruments(instruments)
        .speed(speed)
        .tempo(125)
        .original_counts(4, (layout.patterns.1 / PATTERN_SIZE) as u16, num_macros as u16)
        .build(ctx))
}

fn parse_step(raw: &[u8]) -> Step {
    let mut step = Step {
        speed: raw[12],
        ..Default::default()
    };
    for (v, voice) in step.voices.iter_mut().enumerate() {
        *voice = Voice {
            pattern: raw[v * 3],
            transpose: raw[v * 3 + 1] as i8,
            sound_transpose: raw[v * 3 + 2] as i8,
        };
    }
    step
}

fn build_step(data: &[u8], layout: &Layout, step: &Step) -> Grid {
    let mut grid: Grid = step
        .voices
        .iter()
        .map(|voice| {
            let start = layout.patterns.0 + voice.pattern as usize * PATTERN_SIZE;
            let inside = (voice.pattern as usize + 1) * PATTERN_SIZE <= layout.patterns.1;
            match data.get(start..start + PATTERN_SIZE).filter(|_| inside) {
                Some(bytes) => parse_voice(bytes, voice),
                None => {
                    warn!("Future Composer: pattern {} outside the pattern block", voice.pattern);
                    vec![Cell::empty(); ROWS]
                }
            }
        })
        .collect();
    if step.speed != 0 {
        grid[0][0].push_effect(Effect::SetSpeed(step.speed));
    }
    grid
}

fn parse_voice(bytes: &[u8], voice: &Voice) -> Vec<Cell> {
    let mut cells = vec![Cell::empty(); ROWS];
    let mut porta_value_next = false;

    for (row, pair) in bytes.chunks_exact(2).enumerate() {
        let (note, info) = (pair[0], pair[1]);
        if note == PATTERN_END {
            break;
        }
        if porta_value_next {
            // This row's info byte belongs to the previous row's portamento.
            porta_value_next = false;
            let amount = info & 0x1F;
            if amount != 0 && row > 0 {
                let effect = if info & 0x20 != 0 {
                    Effect::PortaDown(amount)
                } else {
                    Effect::PortaUp(amount)
                };
                cells[row - 1].push_effect(effect);
            }
            if note != 0 {
                cells[row].note = Note::clamped(24 + note as i32 - 1 + voice.transpose as i32);
            }
            continue;
        }
        let cell = &mut cells[row];
        if note != 0 {
            cell.note = Note::clamped(24 + note as i32 - 1 + voice.transpose as i32);
            let macro_idx = (info & 0x3F) as i32 + voice.sound_transpose as i32;
            cell.instrument = (macro_idx.clamp(0, 63) + 1) as u8;
        }
        porta_value_next = info & 0x80 != 0;
    }
    cells
}

fn read_instruments(data: &[u8], layout: &Layout) -> Vec<Instrument> {
    let (vol_ofs, vol_len) = layout.volume_macros;
    let count = vol_len / MACRO_SIZE;
    (0..count)
        .map(|i| {
            let id = i as u16 + 1;
            let Ok(vol) = data.slice_at(vol_ofs + i * MACRO_SIZE, MACRO_SIZE) else {
                return Instrument::placeholder(id, "");
            };
            let freq_idx = vol[1] as usize;
            let frequency_sequence = if (freq_idx + 1) * MACRO_SIZE <= layout.frequency_macros.1 {
                data.slice_at(layout.frequency_macros.0 + freq_idx * MACRO_SIZE, MACRO_SIZE)
                    .map(<[u8]>::to_vec)
                    .unwrap_or_default()
            } else {
                warn!("Future Composer: macro {i} references missing frequency macro {freq_idx}");
                Vec::new()
            };
            let volume_sequence = vol[5..].to_vec();
            let volume = volume_sequence
                .iter()
                .copied()
                .find(|&b| b < 0xE0)
                .unwrap_or(64)
                .min(64);
            let waveform = first_wave(&frequency_sequence)
                .and_then(|w| resolve_waveform(data, layout, w));

            Instrument::new(
                id,
                &format!("Macro {id}"),
                InstrumentConfig::FutureComposer(FutureComposerConfig {
                    volume,
                    speed: vol[0],
                    frequency_macro: vol[1],
                    vibrato_speed: vol[2],
                    vibrato_depth: vol[3],
                    vibrato_delay: vol[4],
                    volume_sequence,
                    frequency_sequence,
                    waveform,
                }),
            )
        })
        .collect()
}

/// Waveform number set by the first `E2`/`E4` command.
pub(super) fn first_wave(sequence: &[u8]) -> Option<u8> {
    sequence
        .windows(2)
        .find(|w| w[0] == 0xE2 || w[0] == 0xE4)
        .map(|w| w[1])
}

fn resolve_waveform(data: &[u8], layout: &Layout, index: u8) -> Option<Waveform> {
    let index = index as usize;
    if index < NUM_SAMPLES {
        let mut offset = layout.sample_data;
        for s in 0..index {
            offset += data.u16be_at(SAMPLE_INFO + s * 6).ok()? as usize * 2;
        }
        let info = SAMPLE_INFO + index * 6;
        let length = data.u16be_at(info).ok()? as usize * 2;
        let loop_start = data.u16be_at(info + 2).ok()? as u32;
        let loop_words = data.u16be_at(info + 4).ok()? as u32;
        let loop_points = (loop_words > 1).then_some((loop_start, loop_start + loop_words * 2));
        return read_waveform(data, offset, length, loop_points);
    }
    if layout.version == Version::Fc13 {
        debug!("Future Composer: built-in wave {index} has no data in the file");
        return None;
    }
    let wave = index - NUM_SAMPLES;
    if wave >= NUM_WAVES {
        return None;
    }
    let lengths = data.get(WAVE_LENGTHS..WAVE_LENGTHS + NUM_WAVES)?;
    let offset = layout.wave_data + lengths[..wave].iter().map(|&l| l as usize * 2).sum::<usize>();
    let length = lengths[wave] as usize * 2;
    read_waveform(data, offset, length, Some((0, length as u32)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// FC14 file: one step, one pattern, one volume macro, one frequency
    /// macro selecting wavetable 0.
    fn make_minimal_fc14() -> Vec<u8> {
        let seq = WAVE_LENGTHS + NUM_WAVES;
        let pat = seq + STEP_SIZE;
        let freq = pat + PATTERN_SIZE;
        let vol = freq + MACRO_SIZE;
        let samples = vol + MACRO_SIZE;
        let waves = samples;
        let mut data = vec![0u8; waves + 16];

        data[..4].copy_from_slice(b"FC14");
        let put = |data: &mut Vec<u8>, at: usize, v: usize| {
            data[at..at + 4].copy_from_slice(&(v as u32).to_be_bytes())
        };
        put(&mut data, 4, STEP_SIZE);
        put(&mut data, 8, pat);
        put(&mut data, 12, PATTERN_SIZE);
        put(&mut data, 16, freq);
        put(&mut data, 20, MACRO_SIZE);
        put(&mut data, 24, vol);
        put(&mut data, 28, MACRO_SIZE);
        put(&mut data, 32, samples);
        put(&mut data, 36, waves);
        data[WAVE_LENGTHS] = 8;

        // step: voice 0 pattern 0 transpose +12, speed 5
        data[seq + 1] = 12;
        data[seq + 12] = 5;

        // row 0: note 1, macro 0, porta flag; row 1: porta up 3; row 2: end
        data[pat..pat + 6].copy_from_slice(&[1, 0x80, 0, 0x03, PATTERN_END, 0]);

        data[freq..freq + 3].copy_from_slice(&[0xE2, 10, 0xE1]);
        data[vol..vol + 6].copy_from_slice(&[2, 0, 1, 2, 3, 48]);
        for (i, b) in data[waves..].iter_mut().enumerate() {
            *b = i as u8;
        }
        data
    }

    #[test]
    fn parses_steps_and_macros() {
        let data = make_minimal_fc14();
        assert_eq!(FutureComposer.probe(&data), Some(4));
        let song = load_fc(&data).unwrap();

        assert_eq!(song.initial_speed, 5);
        assert_eq!(song.patterns.len(), 1);
        assert_eq!(song.patterns[0].rows, 32);
        let c = song.patterns[0].cell(0, 0);
        assert_eq!(c.note, Note::On(36));
        assert_eq!(c.instrument, 1);
        assert_eq!(c.effect, Effect::PortaUp(3));
        assert_eq!(c.effect2, Effect::SetSpeed(5));
        assert!(song.patterns[0].cell(1, 0).is_empty());

        match &song.instruments[0].config {
            InstrumentConfig::FutureComposer(fc) => {
                assert_eq!(fc.volume, 48);
                assert_eq!(fc.speed, 2);
                assert_eq!(fc.vibrato_delay, 3);
                let wave = fc.waveform.as_ref().unwrap();
                assert_eq!(wave.data.len(), 16);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_sequence_length_is_rejected() {
        let mut data = make_minimal_fc14();
        data[4..8].copy_from_slice(&14u32.to_be_bytes());
        assert!(FutureComposer.probe(&data).is_none());
    }
}
