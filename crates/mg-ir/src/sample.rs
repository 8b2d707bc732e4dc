//! PCM sample data and loop ranges.

use alloc::vec::Vec;

/// Sample audio data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SampleData {
    /// 8-bit mono samples
    Mono8(Vec<i8>),
    /// 16-bit mono samples
    Mono16(Vec<i16>),
}

impl Default for SampleData {
    fn default() -> Self {
        SampleData::Mono8(Vec::new())
    }
}

impl SampleData {
    /// Get the number of sample frames.
    pub fn len(&self) -> usize {
        match self {
            SampleData::Mono8(v) => v.len(),
            SampleData::Mono16(v) => v.len(),
        }
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a sample value at position, scaled to 16 bits.
    pub fn get_mono(&self, pos: usize) -> i16 {
        match self {
            SampleData::Mono8(v) => v.get(pos).copied().unwrap_or(0) as i16 * 256,
            SampleData::Mono16(v) => v.get(pos).copied().unwrap_or(0),
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            SampleData::Mono8(_) => 8,
            SampleData::Mono16(_) => 16,
        }
    }
}

/// How a loop repeats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopMode {
    #[default]
    Forward,
    /// Bidirectional
    PingPong,
}

/// An active loop, in sample frames. Always `start < end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopRange {
    pub start: u32,
    pub end: u32,
    pub mode: LoopMode,
}

impl LoopRange {
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Never true for a validated range; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// A short PCM waveform embedded in a chip-synthesis instrument.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Waveform {
    pub data: Vec<i8>,
    pub loop_range: Option<LoopRange>,
}
