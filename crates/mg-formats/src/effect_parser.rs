//! Effect translation tables.
//!
//! One total function per native command space. Commands with no common
//! equivalent (filter toggles, envelope triggers and the like) map to
//! `Effect::None`.

use mg_ir::Effect;

fn nibbles(param: u8) -> (u8, u8) {
    ((param >> 4) & 0x0F, param & 0x0F)
}

/// Convert volume slide parameter to signed value.
pub fn param_to_slide(param: u8) -> i8 {
    let (up, down) = nibbles(param);
    if up > 0 {
        up as i8
    } else {
        -(down as i8)
    }
}

/// ProTracker command (0x0-0xF).
pub fn protracker(cmd: u8, param: u8) -> Effect {
    match cmd {
        0x0 if param != 0 => {
            let (x, y) = nibbles(param);
            Effect::Arpeggio { x, y }
        }
        0x1 => Effect::PortaUp(param),
        0x2 => Effect::PortaDown(param),
        0x3 => Effect::TonePorta(param),
        0x4 => {
            let (speed, depth) = nibbles(param);
            Effect::Vibrato { speed, depth }
        }
        0x5 => Effect::TonePortaVolSlide(param_to_slide(param)),
        0x6 => Effect::VibratoVolSlide(param_to_slide(param)),
        0x7 => {
            let (speed, depth) = nibbles(param);
            Effect::Tremolo { speed, depth }
        }
        0x8 => Effect::SetPan(param),
        0x9 => Effect::SampleOffset(param),
        0xA => Effect::VolumeSlide(param_to_slide(param)),
        0xB => Effect::PositionJump(param),
        0xC => Effect::SetVolume(param.min(64)),
        0xD => Effect::PatternBreak(((param >> 4) * 10 + (param & 0x0F)).min(63)),
        0xE => protracker_extended(param),
        0xF => {
            if param < 32 {
                Effect::SetSpeed(param)
            } else {
                Effect::SetTempo(param)
            }
        }
        _ => Effect::None,
    }
}

/// ProTracker extended command (Exy).
pub fn protracker_extended(param: u8) -> Effect {
    let (cmd, val) = nibbles(param);

    match cmd {
        0x1 => Effect::FinePortaUp(val),
        0x2 => Effect::FinePortaDown(val),
        0x4 => Effect::SetVibratoWaveform(val),
        0x5 => Effect::SetFinetune(if val > 7 { val as i8 - 16 } else { val as i8 }),
        0x6 => Effect::PatternLoop(val),
        0x7 => Effect::SetTremoloWaveform(val),
        0x8 => Effect::SetPanPosition(val),
        0x9 => Effect::RetriggerNote(val),
        0xA => Effect::FineVolumeSlideUp(val),
        0xB => Effect::FineVolumeSlideDown(val),
        0xC => Effect::NoteCut(val),
        0xD => Effect::NoteDelay(val),
        0xE => Effect::PatternDelay(val),
        _ => Effect::None,
    }
}

/// XM command numbering (Real Tracker 2).
pub fn xm(cmd: u8, param: u8) -> Effect {
    match cmd {
        0x00..=0x0F => protracker(cmd, param),
        0x10 => Effect::SetGlobalVolume(param.min(64)),
        0x11 => Effect::GlobalVolumeSlide(param_to_slide(param)),
        0x14 => Effect::KeyOff(param),
        0x15 => Effect::SetEnvelopePosition(param),
        0x19 => Effect::PanningSlide(param_to_slide(param)),
        0x1B => {
            let (volume_change, interval) = nibbles(param);
            Effect::Retrigger { interval, volume_change }
        }
        0x1D => {
            let (on, off) = nibbles(param);
            Effect::Tremor { on, off }
        }
        0x21 => match nibbles(param) {
            (1, v) => Effect::ExtraFinePortaUp(v),
            (2, v) => Effect::ExtraFinePortaDown(v),
            _ => Effect::None,
        },
        _ => Effect::None,
    }
}

/// SoundFX command (1-8).
pub fn soundfx(cmd: u8, param: u8) -> Effect {
    match cmd {
        0x1 => {
            let (x, y) = nibbles(param);
            Effect::Arpeggio { x, y }
        }
        0x2 => match nibbles(param) {
            (0, down) => Effect::PortaDown(down),
            (up, _) => Effect::PortaUp(up),
        },
        0x5 => Effect::FineVolumeSlideUp(param.min(15)),
        0x6 => Effect::FineVolumeSlideDown(param.min(15)),
        0x7 => Effect::PortaUp(param),
        0x8 => Effect::PortaDown(param),
        // 3/4 toggle the LED filter
        _ => Effect::None,
    }
}

/// Oktalyzer command.
pub fn oktalyzer(cmd: u8, param: u8) -> Effect {
    match cmd {
        1 => Effect::PortaDown(param),
        2 => Effect::PortaUp(param),
        10..=12 => {
            let (x, y) = nibbles(param);
            Effect::Arpeggio { x, y }
        }
        25 => Effect::PositionJump(param),
        28 => Effect::SetSpeed((param & 0x0F).max(1)),
        31 => match param {
            0x00..=0x40 => Effect::SetVolume(param),
            0x41..=0x50 => Effect::VolumeSlide(-((param - 0x40) as i8)),
            0x51..=0x60 => Effect::VolumeSlide((param - 0x50) as i8),
            0x61..=0x70 => Effect::FineVolumeSlideDown(param - 0x60),
            0x71..=0x80 => Effect::FineVolumeSlideUp(param - 0x70),
            _ => Effect::None,
        },
        // note slides, filter and release have no common equivalent
        _ => Effect::None,
    }
}

/// Chuck Biscuits command: 1..=0x10 are ProTracker 0-F, 0x11..=0x1F are E1-EF.
pub fn cba(cmd: u8, param: u8) -> Effect {
    match cmd {
        0x01..=0x10 => protracker(cmd - 1, param),
        0x11..=0x1F => protracker_extended(((cmd - 0x10) << 4) | (param & 0x0F)),
        _ => Effect::None,
    }
}

/// AHX track command (0-F).
pub fn ahx(fx: u8, param: u8) -> Effect {
    match fx {
        0x1 => Effect::PortaUp(param),
        0x2 => Effect::PortaDown(param),
        0x3 => Effect::TonePorta(param),
        0x5 => Effect::TonePortaVolSlide(param_to_slide(param)),
        0xA => Effect::VolumeSlide(param_to_slide(param)),
        0xB => Effect::PositionJump(param),
        0xC => match param {
            0x00..=0x40 => Effect::SetVolume(param),
            0x50..=0x90 => Effect::SetGlobalVolume(param - 0x50),
            _ => Effect::None,
        },
        0xD => Effect::PatternBreak(((param >> 4) * 10 + (param & 0x0F)).min(63)),
        0xE => match nibbles(param) {
            (0x1, v) => Effect::FinePortaUp(v),
            (0x2, v) => Effect::FinePortaDown(v),
            (0xA, v) => Effect::FineVolumeSlideUp(v),
            (0xB, v) => Effect::FineVolumeSlideDown(v),
            (0xC, v) => Effect::NoteCut(v),
            (0xD, v) => Effect::NoteDelay(v),
            _ => Effect::None,
        },
        0xF => Effect::SetSpeed(param),
        // 0 position-jump high bits, 4 filter, 9 square offset and the
        // envelope/hard-cut commands are synth-only
        _ => Effect::None,
    }
}

/// SoundMon command (low nibble of the second cell byte).
pub fn soundmon(fx: u8, param: i8) -> Effect {
    let p = param as u8;
    match fx {
        0x0 if p != 0 => {
            let (x, y) = nibbles(p);
            Effect::Arpeggio { x, y }
        }
        0x1 => Effect::SetVolume(p.min(64)),
        0x2 => Effect::SetSpeed(p.max(1)),
        0x4 => Effect::PortaUp(param.unsigned_abs()),
        0x5 => Effect::PortaDown(param.unsigned_abs()),
        0x6 => Effect::Vibrato { speed: 0, depth: p.min(15) },
        0x7 => Effect::PositionJump(p),
        _ => Effect::None,
    }
}

/// SidMon II effect byte (0x70-0x7F).
pub fn sidmon2(cmd: u8, param: u8) -> Effect {
    match cmd {
        0x70 => {
            let (x, y) = nibbles(param);
            Effect::Arpeggio { x, y }
        }
        0x71 => Effect::PortaUp(param),
        0x72 => Effect::PortaDown(param),
        0x73 => Effect::VolumeSlide(param.min(15) as i8),
        0x74 => Effect::VolumeSlide(-(param.min(15) as i8)),
        0x7C => Effect::SetVolume(param.min(64)),
        0x7F => Effect::SetSpeed((param & 0x0F).max(1)),
        _ => Effect::None,
    }
}

/// SidMon 1 row effect: SidMon II numbering without the `0x70` bias.
pub fn sidmon1(effect: u8, param: u8) -> Effect {
    match effect {
        0 if param == 0 => Effect::None,
        0x00..=0x0F => sidmon2(0x70 + effect, param),
        _ => Effect::None,
    }
}

/// Digital Mugician row effect. The pitch bend parameter is signed.
pub fn digital_mugician(effect: u8, param: u8) -> Effect {
    match effect {
        0x01 => match param as i8 {
            0 => Effect::None,
            b if b < 0 => Effect::PortaUp(b.unsigned_abs()),
            b => Effect::PortaDown(b as u8),
        },
        0x42 => Effect::SetVolume(param.min(64)),
        0x43 => Effect::PositionJump(param),
        0x44 => Effect::PatternBreak(0),
        0x45 => Effect::SetSpeed((param & 0x0F).max(1)),
        _ => Effect::None,
    }
}

/// Sawteeth part effect byte: high nibble command, low nibble value.
pub fn sawteeth(eff: u8) -> Effect {
    match nibbles(eff) {
        (0x1, v) => Effect::PortaUp(v),
        (0x2, v) => Effect::PortaDown(v),
        (0xC, v) => Effect::SetVolume((v as u16 * 64 / 15) as u8),
        _ => Effect::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protracker_speed_tempo_split() {
        assert_eq!(protracker(0xF, 6), Effect::SetSpeed(6));
        assert_eq!(protracker(0xF, 125), Effect::SetTempo(125));
        assert_eq!(protracker(0x0, 0), Effect::None);
        assert_eq!(protracker(0xD, 0x32), Effect::PatternBreak(32));
    }

    #[test]
    fn slides_prefer_up_nibble() {
        assert_eq!(param_to_slide(0x40), 4);
        assert_eq!(param_to_slide(0x05), -5);
        assert_eq!(param_to_slide(0x45), 4);
    }

    #[test]
    fn xm_extends_protracker() {
        assert_eq!(xm(0x0C, 0x20), Effect::SetVolume(0x20));
        assert_eq!(xm(0x14, 3), Effect::KeyOff(3));
        assert_eq!(xm(0x21, 0x13), Effect::ExtraFinePortaUp(3));
        assert_eq!(xm(0x1B, 0x21), Effect::Retrigger { interval: 1, volume_change: 2 });
        assert_eq!(xm(0x30, 0x00), Effect::None);
    }

    #[test]
    fn oktalyzer_volume_ranges() {
        assert_eq!(oktalyzer(31, 0x20), Effect::SetVolume(0x20));
        assert_eq!(oktalyzer(31, 0x43), Effect::VolumeSlide(-3));
        assert_eq!(oktalyzer(31, 0x55), Effect::VolumeSlide(5));
        assert_eq!(oktalyzer(31, 0x62), Effect::FineVolumeSlideDown(2));
        assert_eq!(oktalyzer(31, 0x7F), Effect::FineVolumeSlideUp(15));
        assert_eq!(oktalyzer(31, 0x90), Effect::None);
        assert_eq!(oktalyzer(15, 1), Effect::None);
    }

    #[test]
    fn cba_offsets_commands() {
        assert_eq!(cba(0x10, 6), Effect::SetSpeed(6));
        assert_eq!(cba(0x0D, 0x30), Effect::SetVolume(0x30));
        assert_eq!(cba(0x1C, 0x02), Effect::NoteCut(2));
        assert_eq!(cba(0x00, 0xFF), Effect::None);
    }

    #[test]
    fn every_command_byte_translates() {
        // Total over the whole byte range, never panics
        for cmd in 0..=255u8 {
            for param in [0u8, 0x0F, 0x40, 0x99, 0xFF] {
                let _ = protracker(cmd, param);
                let _ = xm(cmd, param);
                let _ = soundfx(cmd, param);
                let _ = oktalyzer(cmd, param);
                let _ = cba(cmd, param);
                let _ = ahx(cmd, param);
                let _ = soundmon(cmd, param as i8);
                let _ = sidmon2(cmd, param);
                let _ = sidmon1(cmd, param);
                let _ = digital_mugician(cmd, param);
            }
            let _ = sawteeth(cmd);
        }
    }

    #[test]
    fn sidmon1_drops_the_bias() {
        assert_eq!(sidmon1(0x0C, 40), Effect::SetVolume(40));
        assert_eq!(sidmon1(0x00, 0x37), Effect::Arpeggio { x: 3, y: 7 });
        assert_eq!(sidmon1(0x00, 0x00), Effect::None);
        assert_eq!(sidmon1(0x7C, 40), Effect::None);
    }

    #[test]
    fn mugician_bend_sign_picks_direction() {
        assert_eq!(digital_mugician(0x01, 0xFC), Effect::PortaUp(4));
        assert_eq!(digital_mugician(0x01, 0x04), Effect::PortaDown(4));
        assert_eq!(digital_mugician(0x01, 0x00), Effect::None);
        assert_eq!(digital_mugician(0x45, 0x23), Effect::SetSpeed(3));
        assert_eq!(digital_mugician(0x40, 0x00), Effect::None);
    }

    #[test]
    fn ahx_volume_and_global() {
        assert_eq!(ahx(0xC, 0x40), Effect::SetVolume(0x40));
        assert_eq!(ahx(0xC, 0x60), Effect::SetGlobalVolume(0x10));
        assert_eq!(ahx(0xC, 0x45), Effect::None);
        assert_eq!(ahx(0x4, 0x10), Effect::None);
    }
}
