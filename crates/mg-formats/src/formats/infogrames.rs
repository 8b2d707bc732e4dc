//! Infogrames (`.dum`) modules. Samples live in a companion file, so only
//! the song header is read.

use log::debug;
use mg_ir::{PlaybackFormat, Song};

use super::{load_standalone, name_or, placeholder_instruments};
use crate::assembler::SongBuilder;
use crate::cursor::{parse_string, BinaryRead};
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::FormatError;

const FORMAT_TAG: u8 = 0x0F;

/// Marker plus the subsong and instrument counts.
const HEADER_SIZE: usize = 6;

/// Offset of the `00 0F` marker that ends the name.
fn header_offset(data: &[u8]) -> Option<usize> {
    let off = data.u16be_at(0).ok()? as usize;
    if off < 4 || off % 2 != 0 || off + HEADER_SIZE > data.len() {
        return None;
    }
    (data.slice_at(off, 2).ok()? == [0, FORMAT_TAG]).then_some(off)
}

pub struct Infogrames;

impl Loader for Infogrames {
    fn id(&self) -> &'static str {
        "dum"
    }

    fn name(&self) -> &'static str {
        "Infogrames"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["dum"],
            prefixes: &["dum"],
            required: true,
        }
    }

    fn min_size(&self) -> usize {
        10
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        header_offset(data).map(|_| 3)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        let off = header_offset(data).ok_or_else(|| FormatError::InvalidHeader {
            format: "Infogrames",
            reason: "missing 00 0F marker".into(),
        })?;
        let subsongs = data.u16be_at(off + 2)?;
        let count = data.u16be_at(off + 4)?;
        let name = name_or(parse_string(&data[2..off]), || "Infogrames".into());
        debug!("Infogrames: '{name}', {subsongs} subsongs, {count} instruments");

        Ok(SongBuilder::new("dum", PlaybackFormat::Mod, 4)
            .name(name)
            .instruments(placeholder_instruments(count as usize, "Instrument"))
            .original_counts(4, 0, count)
            .build(ctx))
    }
}

pub fn load_infogrames(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&Infogrames, data)
}
