//! Sean Conran: relocatable player, imported as metadata only.

use log::{debug, warn};
use mg_ir::{PlaybackFormat, Song};

use super::{load_standalone, placeholder_instruments, require_len};
use crate::assembler::SongBuilder;
use crate::cursor::{BinaryRead, ByteCursor};
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::scanner::{op, scan, OpcodeRule, Operand, ScanWindow};
use crate::FormatError;

const BRA_W: u16 = 0x6000;
const LEA_A0: u16 = 0x41FA;
const MAX_SAMPLES: usize = 64;

/// `CMPI.W #n,D0`
const SUBSONG_COUNT: OpcodeRule = OpcodeRule {
    name: "scr subsong count",
    pattern: &[op(0, 0x0C40)],
    operand: Operand::Immediate16 { at: 2 },
};

/// `LEA d16(PC),A0` past the entry table
const LENGTH_TABLE: OpcodeRule = OpcodeRule {
    name: "scr sample lengths",
    pattern: &[op(0, LEA_A0)],
    operand: Operand::PcRelative16 { at: 2 },
};

pub struct SeanConran;

impl Loader for SeanConran {
    fn id(&self) -> &'static str {
        "scr"
    }

    fn name(&self) -> &'static str {
        "Sean Conran"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["scr"],
            prefixes: &["scr"],
            required: true,
        }
    }

    fn min_size(&self) -> usize {
        12
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        let bra = |at| data.u16be_at(at).is_ok_and(|w| w == BRA_W);
        (bra(0) && bra(4) && data.u16be_at(8).ok()? == LEA_A0).then_some(3)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        require_len("Sean Conran", data, self.min_size())?;

        let subsongs = scan(data, ScanWindow::new(0, 2048), &SUBSONG_COUNT).map(|h| h.value);
        let lengths = scan(data, ScanWindow::new(12, 2048), &LENGTH_TABLE)
            .map(|h| sample_lengths(data, h.value as usize));
        match (subsongs, &lengths) {
            (Some(n), Some(l)) => debug!("Sean Conran: {n} subsongs, {} samples", l.len()),
            _ => warn!("Sean Conran: player tables not found, importing metadata only"),
        }
        let count = lengths.map_or(0, |l| l.len());

        Ok(SongBuilder::new("scr", PlaybackFormat::Mod, 4)
            .instruments(placeholder_instruments(count, "Sample"))
            .original_counts(4, 0, count as u16)
            .build(ctx))
    }
}

pub fn load_sean_conran(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&SeanConran, data)
}

/// u32 lengths up to a zero terminator.
fn sample_lengths(data: &[u8], table: usize) -> Vec<u32> {
    let Ok(mut cur) = ByteCursor::at(data, table) else {
        return Vec::new();
    };
    let mut lengths = Vec::new();
    while lengths.len() < MAX_SAMPLES {
        match cur.read_u32_be() {
            Ok(0) | Err(_) => break,
            Ok(len) => lengths.push(len),
        }
    }
    lengths
}
