//! Instrument definitions, one configuration shape per synthesis kind.

use alloc::vec::Vec;

use crate::sample::{LoopRange, SampleData, Waveform};
use crate::text::{truncated, Name};

/// Synthesis kind tag. Always agrees with the populated [`InstrumentConfig`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SynthKind {
    Sampler,
    Opl,
    FutureComposer,
    SoundMon,
    Ahx,
    SidMon2,
    Fred,
    RobHubbard,
    Sawteeth,
    SidMon1,
    DigitalMugician,
    DavidWhittaker,
}

impl SynthKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SynthKind::Sampler => "sampler",
            SynthKind::Opl => "opl",
            SynthKind::FutureComposer => "future-composer",
            SynthKind::SoundMon => "soundmon",
            SynthKind::Ahx => "ahx",
            SynthKind::SidMon2 => "sidmon2",
            SynthKind::Fred => "fred",
            SynthKind::RobHubbard => "rob-hubbard",
            SynthKind::Sawteeth => "sawteeth",
            SynthKind::SidMon1 => "sidmon1",
            SynthKind::DigitalMugician => "digital-mugician",
            SynthKind::DavidWhittaker => "david-whittaker",
        }
    }
}

/// An instrument definition.
#[derive(Clone, Debug, PartialEq)]
pub struct Instrument {
    /// 1-based, unique within a song
    pub id: u16,
    pub name: Name,
    pub config: InstrumentConfig,
}

impl Instrument {
    pub fn new(id: u16, name: &str, config: InstrumentConfig) -> Self {
        Self {
            id,
            name: truncated(name),
            config,
        }
    }

    /// A silent sampler, used wherever a slot could not be extracted.
    pub fn placeholder(id: u16, name: &str) -> Self {
        Self::new(id, name, InstrumentConfig::Sampler(SamplerConfig::silent()))
    }

    pub fn kind(&self) -> SynthKind {
        self.config.kind()
    }

    /// Default volume (0-64). Placeholders report 0.
    pub fn volume(&self) -> u8 {
        self.config.volume()
    }

    /// Returns true for silent samplers with no PCM.
    pub fn is_placeholder(&self) -> bool {
        matches!(&self.config, InstrumentConfig::Sampler(s) if s.data.is_empty() && s.volume == 0)
    }
}

/// Kind-specific configuration payload.
#[derive(Clone, Debug, PartialEq)]
pub enum InstrumentConfig {
    Sampler(SamplerConfig),
    Opl(OplConfig),
    FutureComposer(FutureComposerConfig),
    SoundMon(SoundMonConfig),
    Ahx(AhxConfig),
    SidMon2(SidMon2Config),
    Fred(FredConfig),
    RobHubbard(RobHubbardConfig),
    Sawteeth(SawteethConfig),
    SidMon1(SidMon1Config),
    DigitalMugician(DigitalMugicianConfig),
    DavidWhittaker(DavidWhittakerConfig),
}

impl InstrumentConfig {
    pub fn kind(&self) -> SynthKind {
        match self {
            InstrumentConfig::Sampler(_) => SynthKind::Sampler,
            InstrumentConfig::Opl(_) => SynthKind::Opl,
            InstrumentConfig::FutureComposer(_) => SynthKind::FutureComposer,
            InstrumentConfig::SoundMon(_) => SynthKind::SoundMon,
            InstrumentConfig::Ahx(_) => SynthKind::Ahx,
            InstrumentConfig::SidMon2(_) => SynthKind::SidMon2,
            InstrumentConfig::Fred(_) => SynthKind::Fred,
            InstrumentConfig::RobHubbard(_) => SynthKind::RobHubbard,
            InstrumentConfig::Sawteeth(_) => SynthKind::Sawteeth,
            InstrumentConfig::SidMon1(_) => SynthKind::SidMon1,
            InstrumentConfig::DigitalMugician(_) => SynthKind::DigitalMugician,
            InstrumentConfig::DavidWhittaker(_) => SynthKind::DavidWhittaker,
        }
    }

    pub fn volume(&self) -> u8 {
        let v = match self {
            InstrumentConfig::Sampler(c) => c.volume,
            InstrumentConfig::Opl(c) => c.volume,
            InstrumentConfig::FutureComposer(c) => c.volume,
            InstrumentConfig::SoundMon(c) => c.volume,
            InstrumentConfig::Ahx(c) => c.volume,
            InstrumentConfig::SidMon2(c) => c.adsr.attack_max / 4,
            InstrumentConfig::Fred(c) => c.envelope_volume,
            InstrumentConfig::RobHubbard(c) => c.volume,
            InstrumentConfig::Sawteeth(c) => {
                let peak = c.amplitude.points.iter().map(|p| p.value).max().unwrap_or(0);
                (peak as u16 * 64 / 255) as u8
            }
            InstrumentConfig::SidMon1(c) => c.attack_max,
            InstrumentConfig::DigitalMugician(c) => c.volume,
            InstrumentConfig::DavidWhittaker(c) => c.volume,
        };
        v.min(64)
    }
}

/// PCM sampler.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SamplerConfig {
    pub data: SampleData,
    pub loop_range: Option<LoopRange>,
    /// Playback rate of the base note in Hz (8363 for most Amiga formats)
    pub sample_rate: u32,
    /// Default volume (0-64)
    pub volume: u8,
    /// Finetune (-8 to +7)
    pub finetune: i8,
    /// Default panning (-64 to +64), `None` to use the channel pan
    pub pan: Option<i8>,
}

impl SamplerConfig {
    pub fn silent() -> Self {
        Self {
            sample_rate: 8363,
            ..Self::default()
        }
    }
}

/// Two-operator OPL2 patch.
///
/// Register order: modulator/carrier characteristic, modulator/carrier
/// scaling+level, modulator/carrier attack+decay, modulator/carrier
/// sustain+release, modulator/carrier waveform, feedback+connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OplConfig {
    pub registers: [u8; 11],
    pub volume: u8,
}

/// Future Composer volume macro with its resolved frequency macro.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FutureComposerConfig {
    pub volume: u8,
    /// Ticks per volume-macro step
    pub speed: u8,
    pub frequency_macro: u8,
    pub vibrato_speed: u8,
    pub vibrato_depth: u8,
    pub vibrato_delay: u8,
    /// Raw volume macro bytes (values and `0xE0..` commands)
    pub volume_sequence: Vec<u8>,
    /// Raw frequency macro bytes
    pub frequency_sequence: Vec<u8>,
    /// First waveform selected by the frequency macro
    pub waveform: Option<Waveform>,
}

/// One SoundMon modulation block (ADSR, LFO, EG or MOD).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SoundMonModulator {
    pub control: u8,
    pub table: u8,
    pub length: u16,
    pub delay: u8,
    pub speed: u8,
    pub depth: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SoundMonConfig {
    pub volume: u8,
    pub wave_table: u8,
    /// Wave length in bytes
    pub wave_length: u16,
    pub adsr: SoundMonModulator,
    pub lfo: SoundMonModulator,
    pub eg: SoundMonModulator,
    pub modulation: SoundMonModulator,
    pub fx_control: u8,
    pub fx_speed: u8,
    pub fx_delay: u8,
    /// Contents of the synth table named by `wave_table`
    pub waveform: Option<Waveform>,
}

/// AHX volume envelope, in frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AhxEnvelope {
    pub attack_frames: u8,
    pub attack_volume: u8,
    pub decay_frames: u8,
    pub decay_volume: u8,
    pub sustain_frames: u8,
    pub release_frames: u8,
    pub release_volume: u8,
}

/// One step of an AHX play list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AhxPlistEntry {
    pub note: u8,
    pub fixed: bool,
    pub waveform: u8,
    pub fx: [u8; 2],
    pub params: [u8; 2],
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AhxConfig {
    pub volume: u8,
    /// Wave length exponent (0-5, 4 << n samples)
    pub wave_length: u8,
    pub envelope: AhxEnvelope,
    pub filter_lower: u8,
    pub filter_upper: u8,
    pub filter_speed: u8,
    pub square_lower: u8,
    pub square_upper: u8,
    pub square_speed: u8,
    pub vibrato_delay: u8,
    pub vibrato_depth: u8,
    pub vibrato_speed: u8,
    pub hard_cut_release: bool,
    pub hard_cut_frames: u8,
    pub plist_speed: u8,
    pub plist: Vec<AhxPlistEntry>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SidMon2Adsr {
    pub attack_max: u8,
    pub attack_speed: u8,
    pub decay_min: u8,
    pub decay_speed: u8,
    pub sustain: u8,
    pub release_min: u8,
    pub release_speed: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SidMon2Config {
    /// Wave list: sample numbers stepped through at `wave_speed`
    pub waves: Vec<u8>,
    pub wave_speed: u8,
    pub wave_delay: u8,
    pub arpeggio: Vec<i8>,
    pub arpeggio_speed: u8,
    pub arpeggio_delay: u8,
    pub vibrato: Vec<i8>,
    pub vibrato_speed: u8,
    pub vibrato_delay: u8,
    pub pitch_bend: i8,
    pub pitch_bend_delay: u8,
    pub adsr: SidMon2Adsr,
    /// PCM of the first wave-list entry
    pub waveform: Option<Waveform>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FredSynthType {
    /// Pulse-width modulation of a square wave
    #[default]
    Pulse,
    /// Blend between two halves of the waveform
    Blend,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FredConfig {
    pub synth_type: FredSynthType,
    /// Period multiplier relative to 1024
    pub relative: u16,
    pub vibrato_delay: u8,
    pub vibrato_speed: u8,
    pub vibrato_depth: u8,
    pub envelope_volume: u8,
    pub attack_speed: u8,
    pub attack_volume: u8,
    pub decay_speed: u8,
    pub decay_volume: u8,
    pub sustain_time: u8,
    pub release_speed: u8,
    pub release_volume: u8,
    pub arpeggio: [i8; 16],
    pub arpeggio_speed: u8,
    pub arpeggio_limit: u8,
    pub pulse_rate_neg: i8,
    pub pulse_rate_pos: u8,
    pub pulse_speed: u8,
    pub pulse_pos_low: u8,
    pub pulse_pos_high: u8,
    pub pulse_delay: u8,
    pub blend_rate: u8,
    pub blend_delay: u8,
    pub waveform: Option<Waveform>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RobHubbardConfig {
    pub volume: u8,
    /// Period divisor derived from the stored playback rate
    pub relative: u16,
    pub sample_rate: u32,
    pub waveform: Waveform,
}

/// SidMon 1 wavetable voice: ADSR, arpeggio and a phase-shift LFO.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SidMon1Config {
    pub attack_speed: u8,
    /// 0-64
    pub attack_max: u8,
    pub decay_speed: u8,
    pub decay_min: u8,
    /// Ticks held at `decay_min`
    pub sustain: u8,
    pub release_speed: u8,
    pub release_min: u8,
    /// Waveform number modulating the period, 0 when off
    pub phase_shift: u8,
    pub phase_speed: u8,
    /// Period-table offset, already scaled by 67 (0-1005)
    pub finetune: u16,
    pub pitch_fall: i8,
    /// Semitone offsets stepped once per tick
    pub arpeggio: [u8; 16],
    /// 32-byte main wave
    pub waveform: Option<Waveform>,
    /// Contents of the `phase_shift` wave
    pub phase_wave: Vec<i8>,
}

/// Digital Mugician wavetable instrument.
///
/// Sample-based instruments (wave numbers 32 and up) are imported as
/// samplers instead.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DigitalMugicianConfig {
    /// Wave number (0-31)
    pub wave: u8,
    /// Loop length in bytes, at most 128
    pub wave_length: u16,
    pub volume: u8,
    pub volume_speed: u8,
    pub volume_loop: bool,
    /// Semitone offsets from the shared arpeggio table
    pub arpeggio: Vec<i8>,
    pub pitch: u8,
    pub pitch_delay: u8,
    pub pitch_speed: u8,
    pub pitch_loop: bool,
    pub finetune: u8,
    /// Wave effect (blend, morph, filter...) applied between `sources`
    pub effect: u8,
    pub effect_step: u8,
    pub effect_speed: u8,
    pub sources: [u8; 2],
    pub waveform: Option<Waveform>,
}

/// David Whittaker sample with its period tuning.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DavidWhittakerConfig {
    pub volume: u8,
    /// Period multiplier relative to 1024
    pub relative: u16,
    pub sample_rate: u32,
    pub waveform: Waveform,
}

/// One step of a Sawteeth instrument's wave sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SawteethStep {
    /// Note is relative to the played note
    pub relative: bool,
    pub waveform: u8,
    pub note: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SawteethConfig {
    pub filter: Envelope,
    pub amplitude: Envelope,
    pub filter_mode: u8,
    pub clip_mode: u8,
    pub boost: u8,
    pub vibrato_speed: u8,
    pub vibrato_depth: u8,
    pub pwm_speed: u8,
    pub pwm_depth: u8,
    pub resonance: u8,
    /// Ticks per wave-sequence step
    pub ticks_per_step: u8,
    pub loop_step: u8,
    pub steps: Vec<SawteethStep>,
}

/// A breakpoint envelope.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Envelope {
    pub points: Vec<EnvelopePoint>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, tick: u16, value: u8) {
        self.points.push(EnvelopePoint { tick, value });
    }

    /// Get the interpolated value at a given tick.
    pub fn value_at(&self, tick: u16) -> u8 {
        let Some(first) = self.points.first() else {
            return 0;
        };

        let mut prev = first;
        for point in &self.points {
            if point.tick > tick {
                if point.tick == prev.tick {
                    return point.value;
                }
                let t = (tick.saturating_sub(prev.tick)) as i32;
                let d = (point.tick - prev.tick) as i32;
                let v = prev.value as i32 + (point.value as i32 - prev.value as i32) * t / d;
                return v as u8;
            }
            prev = point;
        }

        prev.value
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopePoint {
    pub tick: u16,
    pub value: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_interpolation() {
        let mut env = Envelope::new();
        env.add_point(0, 64);
        env.add_point(100, 0);

        assert_eq!(env.value_at(0), 64);
        assert_eq!(env.value_at(50), 32);
        assert_eq!(env.value_at(100), 0);
        assert_eq!(env.value_at(200), 0);
    }

    #[test]
    fn placeholder_is_silent_sampler() {
        let inst = Instrument::placeholder(3, "missing");
        assert_eq!(inst.kind(), SynthKind::Sampler);
        assert_eq!(inst.volume(), 0);
        assert!(inst.is_placeholder());
        assert_eq!(inst.id, 3);
    }

    #[test]
    fn kind_follows_payload() {
        let opl = Instrument::new(
            1,
            "fm",
            InstrumentConfig::Opl(OplConfig { registers: [0; 11], volume: 64 }),
        );
        assert_eq!(opl.kind(), SynthKind::Opl);
        assert_eq!(opl.kind().as_str(), "opl");
        assert!(!opl.is_placeholder());
    }

    #[test]
    fn sawteeth_volume_uses_amplitude_peak() {
        let mut amplitude = Envelope::new();
        amplitude.add_point(0, 255);
        amplitude.add_point(10, 0);
        let cfg = InstrumentConfig::Sawteeth(SawteethConfig { amplitude, ..Default::default() });
        assert_eq!(cfg.volume(), 64);
    }

    #[test]
    fn volume_is_capped_for_every_kind() {
        let sid1 = InstrumentConfig::SidMon1(SidMon1Config { attack_max: 200, ..Default::default() });
        assert_eq!(sid1.volume(), 64);
        assert_eq!(sid1.kind().as_str(), "sidmon1");

        let dw = InstrumentConfig::DavidWhittaker(DavidWhittakerConfig { volume: 40, ..Default::default() });
        assert_eq!(dw.volume(), 40);
        assert_eq!(dw.kind(), SynthKind::DavidWhittaker);
    }
}
