//! Normalized song model for modgrid.
//!
//! Every format decoder emits this model, and every downstream consumer
//! (pattern editor, instrument editor, synthesis engines) reads it. The
//! types are plain owned data with no interior mutability, so a finished
//! [`Song`] can be handed across threads freely.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod effects;
mod instrument;
mod pattern;
pub mod period;
mod sample;
mod song;
mod text;

pub use effects::Effect;
pub use instrument::{
    AhxConfig, AhxEnvelope, AhxPlistEntry, DavidWhittakerConfig, DigitalMugicianConfig, Envelope,
    EnvelopePoint, FredConfig, FredSynthType, FutureComposerConfig, Instrument, InstrumentConfig,
    OplConfig, RobHubbardConfig, SamplerConfig, SawteethConfig, SawteethStep, SidMon1Config,
    SidMon2Adsr, SidMon2Config, SoundMonConfig, SoundMonModulator, SynthKind,
};
pub use pattern::{Cell, Channel, ImportMetadata, Note, Pattern};
pub use sample::{LoopMode, LoopRange, SampleData, Waveform};
pub use song::{FormatSummary, PlaybackFormat, Song};
pub use text::{truncated, Name};
