//! Paul Shields modules: three offset tables, imported as metadata only.

use log::debug;
use mg_ir::{PlaybackFormat, Song};

use super::{load_standalone, placeholder_instruments};
use crate::assembler::SongBuilder;
use crate::cursor::BinaryRead;
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const HEADER_SIZE: usize = 10;
const SAMPLE_RECORD: usize = 16;

/// Song, sample and pattern table offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tables {
    song: usize,
    samples: usize,
    patterns: usize,
}

impl Tables {
    fn read(data: &[u8]) -> Result<Self, FormatError> {
        Ok(Self {
            song: data.u16be_at(4)? as usize,
            samples: data.u16be_at(6)? as usize,
            patterns: data.u16be_at(8)? as usize,
        })
    }

    fn is_plausible(&self, len: usize) -> bool {
        let offsets = [self.song, self.samples, self.patterns];
        offsets.iter().all(|&o| o != 0 && o % 2 == 0 && o < len)
            && self.song < self.samples
            && self.samples < self.patterns
    }
}

pub struct PaulShields;

impl Loader for PaulShields {
    fn id(&self) -> &'static str {
        "ps"
    }

    fn name(&self) -> &'static str {
        "Paul Shields"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["ps"],
            prefixes: &["ps"],
            required: true,
        }
    }

    fn min_size(&self) -> usize {
        HEADER_SIZE
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        if data.slice_at(0, 4).ok()? != [0; 4] {
            return None;
        }
        Tables::read(data).ok()?.is_plausible(data.len()).then_some(4)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        let tables = Tables::read(data)?;
        if !tables.is_plausible(data.len()) {
            return Err(FormatError::InvalidHeader {
                format: "Paul Shields",
                reason: format!("bad table offsets {tables:?}"),
            });
        }
        let count = (tables.patterns - tables.samples) / SAMPLE_RECORD;
        debug!("Paul Shields: {count} samples, tables {tables:?}");

        Ok(SongBuilder::new("ps", PlaybackFormat::Mod, 4)
            .instruments(placeholder_instruments(count, "Sample"))
            .original_counts(4, 0, count as u16)
            .build(ctx))
    }
}

pub fn load_paul_shields(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&PaulShields, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(song: u16, samples: u16, patterns: u16) -> Vec<u8> {
        let mut data = vec![0u8; 0x100];
        data[4..6].copy_from_slice(&song.to_be_bytes());
        data[6..8].copy_from_slice(&samples.to_be_bytes());
        data[8..10].copy_from_slice(&patterns.to_be_bytes());
        data
    }

    #[test]
    fn counts_sample_records() {
        let data = header(0x10, 0x20, 0x50);
        assert_eq!(PaulShields.probe(&data), Some(4));
        let song = load_paul_shields(&data).unwrap();
        assert_eq!(song.instruments.len(), 3);
        assert_eq!(song.instruments[2].name.as_str(), "Sample 3");
        assert_eq!(song.patterns.len(), 1);
    }

    #[test]
    fn rejects_bad_offsets() {
        assert_eq!(PaulShields.probe(&header(0x20, 0x10, 0x50)), None);
        assert_eq!(PaulShields.probe(&header(0x10, 0x21, 0x50)), None);
        assert_eq!(PaulShields.probe(&header(0x10, 0x20, 0x200)), None);
        let mut data = header(0x10, 0x20, 0x50);
        data[0] = 1;
        assert_eq!(PaulShields.probe(&data), None);
    }
}
