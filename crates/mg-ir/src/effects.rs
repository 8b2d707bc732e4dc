//! Common effect vocabulary shared by every imported format.

/// Effect column command.
///
/// Every format's native command space is translated into this enum.
/// [`Effect::code`] renders a value in XM numbering for display and for
/// engines that still speak effect bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Effect {
    #[default]
    None,

    // === Arpeggio & Portamento ===
    /// Arpeggio: cycle between note, note+x, note+y each tick
    Arpeggio { x: u8, y: u8 },
    /// Slide pitch up by amount per tick
    PortaUp(u8),
    /// Slide pitch down by amount per tick
    PortaDown(u8),
    /// Slide toward target note
    TonePorta(u8),
    /// Vibrato with speed and depth
    Vibrato { speed: u8, depth: u8 },
    /// Tone portamento + volume slide
    TonePortaVolSlide(i8),
    /// Vibrato + volume slide
    VibratoVolSlide(i8),

    // === Tremolo & Volume ===
    Tremolo { speed: u8, depth: u8 },
    /// Set channel panning (0-255)
    SetPan(u8),
    /// Set sample offset (in 256-byte units)
    SampleOffset(u8),
    /// Volume slide up (positive) or down (negative) per tick
    VolumeSlide(i8),
    /// Jump to order position
    PositionJump(u8),
    /// Set channel volume (0-64)
    SetVolume(u8),
    /// Break to row in next pattern
    PatternBreak(u8),

    // === Extended effects ===
    FinePortaUp(u8),
    FinePortaDown(u8),
    /// Set vibrato waveform (0=sine, 1=ramp, 2=square)
    SetVibratoWaveform(u8),
    /// Set finetune (-8 to +7)
    SetFinetune(i8),
    /// Pattern loop (0=set start, n=loop n times)
    PatternLoop(u8),
    SetTremoloWaveform(u8),
    /// Coarse panning position (0-15)
    SetPanPosition(u8),
    /// Retrigger note every n ticks
    RetriggerNote(u8),
    FineVolumeSlideUp(u8),
    FineVolumeSlideDown(u8),
    /// Cut note after n ticks
    NoteCut(u8),
    /// Delay note by n ticks
    NoteDelay(u8),
    /// Delay pattern by n rows
    PatternDelay(u8),

    // === Speed & Tempo ===
    /// Set ticks per row
    SetSpeed(u8),
    /// Set BPM tempo
    SetTempo(u8),

    // === Global / XM ===
    /// Set global volume (0-64)
    SetGlobalVolume(u8),
    GlobalVolumeSlide(i8),
    /// Release the note after n ticks
    KeyOff(u8),
    SetEnvelopePosition(u8),
    PanningSlide(i8),
    /// Retrigger with an XM volume-change code (0-15)
    Retrigger { interval: u8, volume_change: u8 },
    Tremor { on: u8, off: u8 },
    ExtraFinePortaUp(u8),
    ExtraFinePortaDown(u8),
}

fn nibbles(hi: u8, lo: u8) -> u8 {
    (hi.min(15) << 4) | lo.min(15)
}

fn slide_param(amount: i8) -> u8 {
    if amount >= 0 {
        nibbles(amount as u8, 0)
    } else {
        nibbles(0, amount.unsigned_abs())
    }
}

impl Effect {
    /// Returns the variant name as a static string (ignoring parameters).
    pub fn name(&self) -> &'static str {
        match self {
            Effect::None => "None",
            Effect::Arpeggio { .. } => "Arpeggio",
            Effect::PortaUp(_) => "PortaUp",
            Effect::PortaDown(_) => "PortaDown",
            Effect::TonePorta(_) => "TonePorta",
            Effect::Vibrato { .. } => "Vibrato",
            Effect::TonePortaVolSlide(_) => "TonePortaVolSlide",
            Effect::VibratoVolSlide(_) => "VibratoVolSlide",
            Effect::Tremolo { .. } => "Tremolo",
            Effect::SetPan(_) => "SetPan",
            Effect::SampleOffset(_) => "SampleOffset",
            Effect::VolumeSlide(_) => "VolumeSlide",
            Effect::PositionJump(_) => "PositionJump",
            Effect::SetVolume(_) => "SetVolume",
            Effect::PatternBreak(_) => "PatternBreak",
            Effect::FinePortaUp(_) => "FinePortaUp",
            Effect::FinePortaDown(_) => "FinePortaDown",
            Effect::SetVibratoWaveform(_) => "SetVibratoWaveform",
            Effect::SetFinetune(_) => "SetFinetune",
            Effect::PatternLoop(_) => "PatternLoop",
            Effect::SetTremoloWaveform(_) => "SetTremoloWaveform",
            Effect::SetPanPosition(_) => "SetPanPosition",
            Effect::RetriggerNote(_) => "RetriggerNote",
            Effect::FineVolumeSlideUp(_) => "FineVolumeSlideUp",
            Effect::FineVolumeSlideDown(_) => "FineVolumeSlideDown",
            Effect::NoteCut(_) => "NoteCut",
            Effect::NoteDelay(_) => "NoteDelay",
            Effect::PatternDelay(_) => "PatternDelay",
            Effect::SetSpeed(_) => "SetSpeed",
            Effect::SetTempo(_) => "SetTempo",
            Effect::SetGlobalVolume(_) => "SetGlobalVolume",
            Effect::GlobalVolumeSlide(_) => "GlobalVolumeSlide",
            Effect::KeyOff(_) => "KeyOff",
            Effect::SetEnvelopePosition(_) => "SetEnvelopePosition",
            Effect::PanningSlide(_) => "PanningSlide",
            Effect::Retrigger { .. } => "Retrigger",
            Effect::Tremor { .. } => "Tremor",
            Effect::ExtraFinePortaUp(_) => "ExtraFinePortaUp",
            Effect::ExtraFinePortaDown(_) => "ExtraFinePortaDown",
        }
    }

    /// Render as an XM-numbered `(effect code, parameter)` pair.
    ///
    /// Codes above 0x0F follow XM letter order (G = 0x10, ..., X = 0x21).
    pub fn code(&self) -> (u8, u8) {
        match *self {
            Effect::None => (0x00, 0x00),
            Effect::Arpeggio { x, y } => (0x00, nibbles(x, y)),
            Effect::PortaUp(v) => (0x01, v),
            Effect::PortaDown(v) => (0x02, v),
            Effect::TonePorta(v) => (0x03, v),
            Effect::Vibrato { speed, depth } => (0x04, nibbles(speed, depth)),
            Effect::TonePortaVolSlide(s) => (0x05, slide_param(s)),
            Effect::VibratoVolSlide(s) => (0x06, slide_param(s)),
            Effect::Tremolo { speed, depth } => (0x07, nibbles(speed, depth)),
            Effect::SetPan(v) => (0x08, v),
            Effect::SampleOffset(v) => (0x09, v),
            Effect::VolumeSlide(s) => (0x0A, slide_param(s)),
            Effect::PositionJump(v) => (0x0B, v),
            Effect::SetVolume(v) => (0x0C, v.min(64)),
            Effect::PatternBreak(row) => (0x0D, nibbles(row / 10, row % 10)),
            Effect::FinePortaUp(v) => (0x0E, nibbles(0x1, v)),
            Effect::FinePortaDown(v) => (0x0E, nibbles(0x2, v)),
            Effect::SetVibratoWaveform(v) => (0x0E, nibbles(0x4, v)),
            Effect::SetFinetune(v) => (0x0E, nibbles(0x5, (v as u8) & 0x0F)),
            Effect::PatternLoop(v) => (0x0E, nibbles(0x6, v)),
            Effect::SetTremoloWaveform(v) => (0x0E, nibbles(0x7, v)),
            Effect::SetPanPosition(v) => (0x0E, nibbles(0x8, v)),
            Effect::RetriggerNote(v) => (0x0E, nibbles(0x9, v)),
            Effect::FineVolumeSlideUp(v) => (0x0E, nibbles(0xA, v)),
            Effect::FineVolumeSlideDown(v) => (0x0E, nibbles(0xB, v)),
            Effect::NoteCut(v) => (0x0E, nibbles(0xC, v)),
            Effect::NoteDelay(v) => (0x0E, nibbles(0xD, v)),
            Effect::PatternDelay(v) => (0x0E, nibbles(0xE, v)),
            Effect::SetSpeed(v) => (0x0F, v.min(0x1F)),
            Effect::SetTempo(v) => (0x0F, v.max(0x20)),
            Effect::SetGlobalVolume(v) => (0x10, v.min(64)),
            Effect::GlobalVolumeSlide(s) => (0x11, slide_param(s)),
            Effect::KeyOff(v) => (0x14, v),
            Effect::SetEnvelopePosition(v) => (0x15, v),
            Effect::PanningSlide(s) => (0x19, slide_param(s)),
            Effect::Retrigger { interval, volume_change } => {
                (0x1B, nibbles(volume_change, interval))
            }
            Effect::Tremor { on, off } => (0x1D, nibbles(on, off)),
            Effect::ExtraFinePortaUp(v) => (0x21, nibbles(0x1, v)),
            Effect::ExtraFinePortaDown(v) => (0x21, nibbles(0x2, v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slides_encode_direction_in_nibble() {
        assert_eq!(Effect::VolumeSlide(4).code(), (0x0A, 0x40));
        assert_eq!(Effect::VolumeSlide(-3).code(), (0x0A, 0x03));
        assert_eq!(Effect::VolumeSlide(-128).code(), (0x0A, 0x0F));
    }

    #[test]
    fn speed_and_tempo_share_f_without_overlap() {
        assert_eq!(Effect::SetSpeed(40).code(), (0x0F, 0x1F));
        assert_eq!(Effect::SetTempo(10).code(), (0x0F, 0x20));
        assert_eq!(Effect::SetTempo(125).code(), (0x0F, 125));
    }

    #[test]
    fn extended_commands_use_e_page() {
        assert_eq!(Effect::NoteCut(3).code(), (0x0E, 0xC3));
        assert_eq!(Effect::SetFinetune(-1).code(), (0x0E, 0x5F));
        assert_eq!(Effect::PatternBreak(32).code(), (0x0D, 0x32));
    }
}
