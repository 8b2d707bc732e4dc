//! Rob Hubbard modules: the replay routine with its sample bank attached.
//!
//! The note data is only reachable by running the player, so patterns are
//! left blank. Samples are recovered from the table the player code points at.

use log::{debug, warn};
use mg_ir::{period, Instrument, InstrumentConfig, PlaybackFormat, RobHubbardConfig, Song, Waveform};

use super::{load_standalone, placeholder_instruments, require_len};
use crate::assembler::SongBuilder;
use crate::cursor::{BinaryRead, ByteCursor};
use crate::extractor::validate_loop;
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::scanner::{op, op_masked, scan, OpcodeRule, Operand, ScanWindow};
use crate::FormatError;

const BRA_W: u16 = 0x6000;
const SCAN_WINDOW: ScanWindow = ScanWindow::new(44, 1024);

/// `MOVEQ #n,D7; LEA d16(PC),A0`: D7 is the sample count minus one
const SAMPLE_TABLE: OpcodeRule = OpcodeRule {
    name: "rh sample table",
    pattern: &[op_masked(0, 0x7E00, 0xFF00), op(2, 0x41FA)],
    operand: Operand::PcRelative16 { at: 4 },
};

pub struct RobHubbard;

impl Loader for RobHubbard {
    fn id(&self) -> &'static str {
        "rh"
    }

    fn name(&self) -> &'static str {
        "Rob Hubbard"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["rh", "rhp"],
            prefixes: &["rh"],
            required: true,
        }
    }

    fn min_size(&self) -> usize {
        64
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        let branch = |at: usize| {
            data.u16be_at(at).is_ok_and(|w| w == BRA_W)
                && data.i16be_at(at + 2).is_ok_and(|d| d > 0 && d % 2 == 0)
        };
        (branch(0) && branch(4)).then_some(2)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        require_len("Rob Hubbard", data, self.min_size())?;

        let instruments = match scan(data, SCAN_WINDOW, &SAMPLE_TABLE) {
            Some(hit) => {
                let count = data.u8_at(hit.at + 1)? as usize + 1;
                let table = hit.value as usize;
                debug!("Rob Hubbard: {count} samples at {table:#x}");
                read_samples(data, table, count)
            }
            None => {
                warn!("Rob Hubbard: opcode pattern '{}' not found, importing metadata only", SAMPLE_TABLE.name);
                Vec::new()
            }
        };
        let stored = instruments.len() as u16;
        let instruments = if instruments.is_empty() {
            placeholder_instruments(1, "Sample")
        } else {
            instruments
        };

        Ok(SongBuilder::new("rh", PlaybackFormat::RobHubbard, 4)
            .instruments(instruments)
            .original_counts(4, 0, stored)
            .build(ctx))
    }
}

pub fn load_rob_hubbard(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&RobHubbard, data)
}

/// Sequential records: header followed directly by its PCM.
fn read_samples(data: &[u8], table: usize, count: usize) -> Vec<Instrument> {
    let mut cur = match ByteCursor::at(data, table) {
        Ok(cur) => cur,
        Err(_) => return Vec::new(),
    };
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let id = i as u16 + 1;
        match read_sample(&mut cur, id) {
            Ok(inst) => out.push(inst),
            Err(e) => {
                warn!("Rob Hubbard: sample {id}: {e}");
                break;
            }
        }
    }
    out
}

fn read_sample(cur: &mut ByteCursor<'_>, id: u16) -> Result<Instrument, FormatError> {
    let length = cur.read_u32_be()? as usize;
    let rate = cur.read_u16_be()?;
    let loop_offset = cur.read_i16_be()?;
    let volume = cur.read_u16_be()?.min(64) as u8;
    let pcm = cur.read_bytes(length.min(cur.remaining()))?;
    let name = format!("Sample {id}");
    if pcm.is_empty() {
        return Ok(Instrument::placeholder(id, &name));
    }

    let frames = pcm.len() as u32;
    let loop_range = (loop_offset >= 0)
        .then(|| validate_loop(loop_offset as u32, frames, frames))
        .flatten();
    let (sample_rate, relative) = if rate > 0 {
        let relative = (period::NTSC_CLOCK / rate as u32).min(u16::MAX as u32) as u16;
        (rate as u32, relative)
    } else {
        (period::BASE_RATE, 0)
    };

    Ok(Instrument::new(
        id,
        &name,
        InstrumentConfig::RobHubbard(RobHubbardConfig {
            volume,
            relative,
            sample_rate,
            waveform: Waveform {
                data: pcm.iter().map(|&b| b as i8).collect(),
                loop_range,
            },
        }),
    ))
}
