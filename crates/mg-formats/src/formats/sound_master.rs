//! Sound Master: relocatable player, imported as metadata only.

use log::{debug, warn};
use mg_ir::{PlaybackFormat, Song};

use super::{load_standalone, placeholder_instruments, require_len};
use crate::assembler::SongBuilder;
use crate::cursor::BinaryRead;
use crate::registry::{DecodeContext, Loader, NameHint};
use crate::scanner::{op, scan_all, OpcodeRule, OpcodeWord, Operand, ScanWindow};
use crate::FormatError;

const BRA_W: u16 = 0x6000;
const SCAN_WINDOW: ScanWindow = ScanWindow::new(0, 2048);
const MAX_SAMPLES: u32 = 64;

/// `LEA d16(PC),A1; MOVE.W #imm,D0`
const LEA_MOVE: &[OpcodeWord] = &[op(0, 0x43FA), op(4, 0x303C)];

const INFO_TABLE: OpcodeRule = OpcodeRule {
    name: "sound master info table",
    pattern: LEA_MOVE,
    operand: Operand::PcRelative16 { at: 2 },
};

const SAMPLE_COUNT: OpcodeRule = OpcodeRule {
    name: "sound master sample count",
    pattern: LEA_MOVE,
    operand: Operand::Immediate16 { at: 6 },
};

pub struct SoundMaster;

impl Loader for SoundMaster {
    fn id(&self) -> &'static str {
        "sm"
    }

    fn name(&self) -> &'static str {
        "Sound Master"
    }

    fn hint(&self) -> NameHint {
        NameHint {
            extensions: &["sm"],
            prefixes: &["sm"],
            required: true,
        }
    }

    fn min_size(&self) -> usize {
        16
    }

    fn check(&self, data: &[u8]) -> Option<u32> {
        let entries = [0, 4, 8].iter().all(|&at| {
            data.u16be_at(at).is_ok_and(|w| w == BRA_W)
                && data.i16be_at(at + 2).is_ok_and(|d| d > 0 && d % 2 == 0)
        });
        entries.then_some(3)
    }

    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
        require_len("Sound Master", data, self.min_size())?;

        let (speed, count) = match scan_all(data, SCAN_WINDOW, &[INFO_TABLE, SAMPLE_COUNT]) {
            Ok(hits) => {
                let speed = data.u8_at(hits[0].value as usize)?;
                let count = hits[1].value.min(MAX_SAMPLES);
                debug!("Sound Master: speed {speed}, {count} samples");
                (speed, count)
            }
            Err(failure) => {
                warn!("Sound Master: {failure}, importing metadata only");
                (6, 0)
            }
        };

        Ok(SongBuilder::new("sm", PlaybackFormat::Mod, 4)
            .instruments(placeholder_instruments(count as usize, "Sample"))
            .speed(speed)
            .original_counts(4, 0, count as u16)
            .build(ctx))
    }
}

pub fn load_sound_master(data: &[u8]) -> Result<Song, FormatError> {
    load_standalone(&SoundMaster, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_minimal_sm() -> Vec<u8> {
        let mut data = vec![0u8; 0x60];
        for at in [0, 4, 8] {
            data[at..at + 4].copy_from_slice(&[0x60, 0x00, 0x00, 0x20]);
        }
        // lea info(pc),a1; move.w #5,d0
        data[0x20..0x28].copy_from_slice(&[0x43, 0xFA, 0x00, 0x2E, 0x30, 0x3C, 0x00, 0x05]);
        data[0x50] = 4;
        data
    }

    #[test]
    fn reads_speed_and_sample_count() {
        let data = make_minimal_sm();
        assert_eq!(SoundMaster.probe(&data), Some(3));
        let song = load_sound_master(&data).unwrap();
        assert_eq!(song.initial_speed, 4);
        assert_eq!(song.instruments.len(), 5);
        assert!(song.instruments.iter().all(|i| i.is_placeholder()));
        assert!(song.patterns[0].is_blank());
    }

    #[test]
    fn unmatched_player_still_imports() {
        let mut data = make_minimal_sm();
        data[0x24] = 0;
        let song = load_sound_master(&data).unwrap();
        assert_eq!(song.initial_speed, 6);
        assert_eq!(song.instruments.len(), 1);
    }

    #[test]
    fn needs_three_entry_branches() {
        let mut data = make_minimal_sm();
        data[8] = 0x4E;
        assert_eq!(SoundMaster.probe(&data), None);
    }
}
