//! PCM decoding and sampler instrument extraction.

use log::warn;
use mg_ir::{Instrument, InstrumentConfig, LoopMode, LoopRange, SampleData, SamplerConfig, Waveform};

/// How raw sample bytes are stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PcmEncoding {
    #[default]
    Signed8,
    Unsigned8,
    /// Signed byte differences, running sum wraps at 8 bits
    Delta8,
    Signed16Le,
    Signed16Be,
    /// Signed 16-bit little-endian differences
    Delta16Le,
}

impl PcmEncoding {
    pub fn bytes_per_frame(self) -> usize {
        match self {
            PcmEncoding::Signed8 | PcmEncoding::Unsigned8 | PcmEncoding::Delta8 => 1,
            PcmEncoding::Signed16Le | PcmEncoding::Signed16Be | PcmEncoding::Delta16Le => 2,
        }
    }
}

/// Decode raw bytes into sample frames. A trailing odd byte of 16-bit
/// data is ignored.
pub fn decode_pcm(bytes: &[u8], encoding: PcmEncoding) -> SampleData {
    match encoding {
        PcmEncoding::Signed8 => SampleData::Mono8(bytes.iter().map(|&b| b as i8).collect()),
        PcmEncoding::Unsigned8 => {
            SampleData::Mono8(bytes.iter().map(|&b| b.wrapping_sub(0x80) as i8).collect())
        }
        PcmEncoding::Delta8 => {
            let mut acc = 0i8;
            SampleData::Mono8(
                bytes
                    .iter()
                    .map(|&b| {
                        acc = acc.wrapping_add(b as i8);
                        acc
                    })
                    .collect(),
            )
        }
        PcmEncoding::Signed16Le => SampleData::Mono16(
            bytes.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect(),
        ),
        PcmEncoding::Signed16Be => SampleData::Mono16(
            bytes.chunks_exact(2).map(|c| i16::from_be_bytes([c[0], c[1]])).collect(),
        ),
        PcmEncoding::Delta16Le => {
            let mut acc = 0i16;
            SampleData::Mono16(
                bytes
                    .chunks_exact(2)
                    .map(|c| {
                        acc = acc.wrapping_add(i16::from_le_bytes([c[0], c[1]]));
                        acc
                    })
                    .collect(),
            )
        }
    }
}

/// Accept a forward loop only if `start < end <= length`.
pub fn validate_loop(start: u32, end: u32, length: u32) -> Option<LoopRange> {
    validate_loop_mode(start, end, length, LoopMode::Forward)
}

pub fn validate_loop_mode(start: u32, end: u32, length: u32, mode: LoopMode) -> Option<LoopRange> {
    if start < end && end <= length {
        Some(LoopRange { start, end, mode })
    } else {
        warn!("discarding loop {start}..{end} for sample of {length} frames");
        None
    }
}

/// One raw sample-table record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleRecord {
    pub name: String,
    /// Byte offset of the PCM data in the buffer
    pub offset: usize,
    /// PCM length in bytes
    pub length: usize,
    /// Loop start/end in frames, before validation
    pub loop_points: Option<(u32, u32)>,
    pub loop_mode: LoopMode,
    pub encoding: PcmEncoding,
    pub sample_rate: u32,
    /// 0-64
    pub volume: u8,
    pub finetune: i8,
    pub pan: Option<i8>,
}

impl Default for SampleRecord {
    fn default() -> Self {
        Self {
            name: String::new(),
            offset: 0,
            length: 0,
            loop_points: None,
            loop_mode: LoopMode::Forward,
            encoding: PcmEncoding::Signed8,
            sample_rate: mg_ir::period::BASE_RATE,
            volume: 64,
            finetune: 0,
            pan: None,
        }
    }
}

/// PCM bytes for `offset..offset+length`, clipped to the buffer.
///
/// `None` when nothing of the range is inside the buffer.
fn clipped<'a>(data: &'a [u8], offset: usize, length: usize, what: &str) -> Option<&'a [u8]> {
    if length == 0 || offset >= data.len() {
        return None;
    }
    let end = offset.saturating_add(length);
    if end > data.len() {
        warn!(
            "{what}: truncated, {} of {length} bytes present",
            data.len() - offset
        );
    }
    Some(&data[offset..end.min(data.len())])
}

/// Build a sampler instrument, or a silent placeholder when the record
/// has no usable PCM.
pub fn extract_sampler(id: u16, record: &SampleRecord, data: &[u8]) -> Instrument {
    let Some(bytes) = clipped(data, record.offset, record.length, &record.name) else {
        if record.length > 0 {
            warn!(
                "sample {id} '{}': data at {:#x} is outside the file",
                record.name, record.offset
            );
        }
        return Instrument::placeholder(id, &record.name);
    };

    let pcm = decode_pcm(bytes, record.encoding);
    if pcm.is_empty() {
        return Instrument::placeholder(id, &record.name);
    }
    let frames = pcm.len() as u32;
    let loop_range = record
        .loop_points
        .and_then(|(start, end)| validate_loop_mode(start, end, frames, record.loop_mode));

    Instrument::new(
        id,
        &record.name,
        InstrumentConfig::Sampler(SamplerConfig {
            data: pcm,
            loop_range,
            sample_rate: record.sample_rate,
            volume: record.volume.min(64),
            finetune: record.finetune,
            pan: record.pan,
        }),
    )
}

/// Extract every record, numbering instruments from 1.
pub fn extract_all(records: &[SampleRecord], data: &[u8]) -> Vec<Instrument> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| extract_sampler(i as u16 + 1, r, data))
        .collect()
}

/// Read a short signed 8-bit waveform embedded in a synth instrument.
pub fn read_waveform(
    data: &[u8],
    offset: usize,
    length: usize,
    loop_points: Option<(u32, u32)>,
) -> Option<Waveform> {
    let bytes = clipped(data, offset, length, "waveform")?;
    let len = bytes.len() as u32;
    Some(Waveform {
        data: bytes.iter().map(|&b| b as i8).collect(),
        loop_range: loop_points.and_then(|(s, e)| validate_loop(s, e, len)),
    })
}
