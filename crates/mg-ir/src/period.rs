//! Shared, read-only pitch tables.
//!
//! Amiga formats store pitch as a Paula period. The note scale of this
//! crate pins period 856 to `On(36)`, 428 to `On(48)` and 214 to `On(60)`.

use crate::pattern::Note;

/// Paula clock on PAL machines.
pub const PAL_CLOCK: u32 = 3_546_895;

/// Paula clock on NTSC machines.
pub const NTSC_CLOCK: u32 = 3_579_545;

/// Playback rate of an unmodified sample at period 428.
pub const BASE_RATE: u32 = 8363;

/// Note value of the first entry of [`PERIODS`].
pub const PERIOD_TABLE_FIRST_NOTE: u8 = 36;

/// ProTracker periods for three octaves, C-1 through B-3 in Amiga notation.
pub static PERIODS: [u16; 36] = [
    856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453, // Octave 1
    428, 404, 381, 360, 339, 320, 302, 285, 269, 254, 240, 226, // Octave 2
    214, 202, 190, 180, 170, 160, 151, 143, 135, 127, 120, 113, // Octave 3
];

/// Convert an Amiga period to the nearest note. Period 0 means no note.
pub fn period_to_note(period: u16) -> Note {
    if period == 0 {
        return Note::None;
    }

    let mut best_note = 0;
    let mut best_diff = u32::MAX;
    for (i, &p) in PERIODS.iter().enumerate() {
        let diff = (period as i32 - p as i32).unsigned_abs();
        if diff < best_diff {
            best_diff = diff;
            best_note = i;
        }
    }

    Note::On(best_note as u8 + PERIOD_TABLE_FIRST_NOTE)
}

/// Convert a note to an Amiga period, extending the table by octave shifts.
pub fn note_to_period(note: Note) -> u16 {
    let Note::On(n) = note else {
        return 0;
    };
    let offset = n as i16 - PERIOD_TABLE_FIRST_NOTE as i16;
    let semitone = offset.rem_euclid(12) as usize;
    let octave = offset.div_euclid(12);
    let base = PERIODS[semitone] as u32;
    if octave >= 0 {
        (base >> octave as u32).max(1) as u16
    } else {
        (base << (-octave) as u32).min(u16::MAX as u32) as u16
    }
}

/// Apply a ProTracker finetune (-8..=7, eighths of a semitone) to a rate.
pub fn finetune_rate(rate: u32, finetune: i8) -> u32 {
    if finetune == 0 {
        return rate;
    }
    let factor = libm::powf(2.0, finetune as f32 / 96.0);
    (rate as f32 * factor) as u32
}

/// Playback rate in Hz for a sample replayed at `period`.
pub fn period_to_rate(period: u16) -> u32 {
    if period == 0 {
        return 0;
    }
    PAL_CLOCK / period as u32
}
