//! Text rendering of pattern cells for the inspection CLI.

use mg_ir::{Cell, Effect, Note};

const NOTE_NAMES: [&str; 12] = [
    "C-", "C#", "D-", "D#", "E-", "F-", "F#", "G-", "G#", "A-", "A#", "B-",
];

/// `C-4 01 40 C20 ...`: note, instrument, volume, both effect slots.
pub fn format_cell(cell: &Cell) -> String {
    format!(
        "{} {} {} {} {}",
        format_note(cell.note),
        format_instrument(cell.instrument),
        format_volume(cell.volume),
        format_effect(&cell.effect),
        format_effect(&cell.effect2),
    )
}

pub fn format_note(note: Note) -> String {
    match (note, note.octave(), note.semitone()) {
        (Note::On(_), Some(octave), Some(semitone)) => {
            format!("{}{}", NOTE_NAMES[semitone as usize], octave)
        }
        (Note::Off, ..) => "===".to_string(),
        _ => "---".to_string(),
    }
}

pub fn format_instrument(inst: u8) -> String {
    if inst > 0 {
        format!("{inst:02X}")
    } else {
        "..".to_string()
    }
}

pub fn format_volume(volume: Option<u8>) -> String {
    volume.map_or_else(|| "..".to_string(), |v| format!("{v:02}"))
}

/// XM-style command letter and parameter.
pub fn format_effect(effect: &Effect) -> String {
    if *effect == Effect::None {
        return "...".to_string();
    }
    let (cmd, param) = effect.code();
    let letter = char::from_digit(cmd as u32, 36).map_or('?', |c| c.to_ascii_uppercase());
    format!("{letter}{param:02X}")
}
