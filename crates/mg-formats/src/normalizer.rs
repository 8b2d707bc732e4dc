//! Event-stream to row-grid conversion.
//!
//! Formats like SidMon II, Fred Editor and Sawteeth store each channel as
//! a list of (duration, note-or-command) events. The normalizer walks that
//! list with a row cursor and writes a conventional grid column: a note
//! occupies the first row of its span and the rest stay empty, since the
//! renderer holds the note until the next event.

use log::{trace, warn};
use mg_ir::{Cell, Effect, Note};

use crate::assembler::MAX_ROWS;

/// Channel-major pattern contents: `grid[channel][row]`.
pub type Grid = Vec<Vec<Cell>>;

/// One decoded stream event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// Note (or `Note::None` for a rest) lasting `duration` ticks.
    Note { note: Note, duration: u32 },
    /// Current instrument for following notes (1-based, 0 clears).
    Instrument(u8),
    /// Volume (0-64) for the next written row.
    Volume(u8),
    /// Change ticks per row and emit `SetSpeed`.
    Speed(u8),
    /// Change ticks per row silently (timebase-only formats such as MIDI).
    TicksPerRow(u32),
    /// Effect for the next written row.
    Effect(Effect),
    /// End or loop marker: stop here.
    End,
}

/// Output column of [`normalize`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizedColumn {
    pub cells: Vec<Cell>,
    /// An `End` event was reached.
    pub ended: bool,
    /// The row cap cut the stream short.
    pub truncated: bool,
}

struct State {
    ticks_per_row: u32,
    instrument: u8,
    volume: Option<u8>,
    effects: [Effect; 2],
    pending: usize,
}

impl State {
    fn push_effect(&mut self, effect: Effect) {
        if effect == Effect::None {
            return;
        }
        if self.pending < self.effects.len() {
            self.effects[self.pending] = effect;
            self.pending += 1;
        } else {
            // Newest wins the second slot.
            self.effects[1] = effect;
        }
    }

    fn has_pending(&self) -> bool {
        self.volume.is_some() || self.pending > 0
    }

    fn take_cell(&mut self, note: Note) -> Cell {
        let mut cell = Cell::empty();
        cell.note = note;
        if matches!(note, Note::On(_)) {
            cell.instrument = self.instrument;
        }
        cell.volume = self.volume.take();
        cell.effect = self.effects[0];
        cell.effect2 = self.effects[1];
        self.effects = [Effect::None; 2];
        self.pending = 0;
        cell
    }
}

/// Rows consumed by an event of `duration` ticks.
pub fn rows_for(duration: u32, ticks_per_row: u32) -> u32 {
    duration.div_ceil(ticks_per_row.max(1)).max(1)
}

/// Convert one channel's event stream into a grid column.
///
/// Deterministic: the same events, speed and cap always give the same
/// column. At most `max_rows` rows are emitted.
pub fn normalize(events: &[StreamEvent], ticks_per_row: u32, max_rows: u32) -> NormalizedColumn {
    let mut state = State {
        ticks_per_row: ticks_per_row.max(1),
        instrument: 0,
        volume: None,
        effects: [Effect::None; 2],
        pending: 0,
    };
    let mut out = NormalizedColumn::default();
    let cap = max_rows as usize;

    for event in events {
        match *event {
            StreamEvent::Note { note, duration } => {
                if out.cells.len() >= cap {
                    out.truncated = true;
                    break;
                }
                let rows = rows_for(duration, state.ticks_per_row) as usize;
                let cell = state.take_cell(note);
                out.cells.push(cell);

                let fill = (rows - 1).min(cap - out.cells.len());
                out.cells.extend(std::iter::repeat(Cell::empty()).take(fill));
                if fill < rows - 1 {
                    out.truncated = true;
                    break;
                }
            }
            StreamEvent::Instrument(i) => state.instrument = i,
            StreamEvent::Volume(v) => state.volume = Some(v.min(64)),
            StreamEvent::Speed(s) => {
                state.ticks_per_row = s.max(1) as u32;
                state.push_effect(Effect::SetSpeed(s.max(1)));
            }
            StreamEvent::TicksPerRow(t) => state.ticks_per_row = t.max(1),
            StreamEvent::Effect(e) => state.push_effect(e),
            StreamEvent::End => {
                out.ended = true;
                break;
            }
        }
    }

    // Commands after the last note still land on a row of their own.
    if state.has_pending() && out.cells.len() < cap && !out.truncated {
        out.cells.push(state.take_cell(Note::None));
    }

    trace!(
        "normalized {} events into {} rows (ended={}, truncated={})",
        events.len(),
        out.cells.len(),
        out.ended,
        out.truncated
    );
    out
}

/// Append one block of per-voice columns, padding every voice to the
/// tallest so the channels stay in step.
pub fn append_aligned(columns: &mut [Vec<Cell>], block: Vec<Vec<Cell>>) {
    let height = block.iter().map(Vec::len).max().unwrap_or(0);
    for (column, mut cells) in columns.iter_mut().zip(block) {
        cells.resize(height, Cell::empty());
        column.append(&mut cells);
    }
}

/// Cut equal-time channel columns into fixed-height grids.
///
/// Columns shorter than the longest are padded with empty rows, as is the
/// tail of the last grid. Always yields at least one grid.
pub fn slice_columns(columns: &[Vec<Cell>], rows_per_pattern: u16) -> Vec<Grid> {
    let height = (rows_per_pattern as usize).clamp(1, MAX_ROWS);
    if height < rows_per_pattern as usize {
        warn!("{rows_per_pattern} rows per pattern requested, cutting at {MAX_ROWS}");
    }
    let total = columns.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let count = total.div_ceil(height);

    (0..count)
        .map(|p| {
            let start = p * height;
            columns
                .iter()
                .map(|col| {
                    let mut slice: Vec<Cell> =
                        col.iter().skip(start).take(height).copied().collect();
                    slice.resize(height, Cell::empty());
                    slice
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn note(n: u8, duration: u32) -> StreamEvent {
        StreamEvent::Note { note: Note::On(n), duration }
    }

    #[test]
    fn note_spans_ceil_rows() {
        let events = [
            StreamEvent::Instrument(2),
            note(48, 6),
            note(50, 7),
            note(52, 1),
        ];
        let col = normalize(&events, 6, 64);
        assert_eq!(col.cells.len(), 1 + 2 + 1);
        assert_eq!(col.cells[0].note, Note::On(48));
        assert_eq!(col.cells[0].instrument, 2);
        assert_eq!(col.cells[1].note, Note::On(50));
        assert!(col.cells[2].is_empty());
        assert_eq!(col.cells[3].note, Note::On(52));
        assert!(!col.ended);
    }

    #[test]
    fn zero_duration_still_takes_a_row() {
        let col = normalize(&[note(48, 0), note(49, 0)], 6, 64);
        assert_eq!(col.cells.len(), 2);
    }

    #[test]
    fn speed_change_emits_effect_and_rescales() {
        let events = [StreamEvent::Speed(3), note(48, 6), note(50, 3)];
        let col = normalize(&events, 6, 64);
        assert_eq!(col.cells[0].effect, Effect::SetSpeed(3));
        assert_eq!(col.cells.len(), 2 + 1);
    }

    #[test]
    fn volume_and_effects_attach_to_next_row_only() {
        let events = [
            StreamEvent::Volume(40),
            StreamEvent::Effect(Effect::PortaUp(2)),
            StreamEvent::Effect(Effect::SetVolume(10)),
            note(48, 12),
            note(49, 6),
        ];
        let col = normalize(&events, 6, 64);
        assert_eq!(col.cells[0].volume, Some(40));
        assert_eq!(col.cells[0].effect, Effect::PortaUp(2));
        assert_eq!(col.cells[0].effect2, Effect::SetVolume(10));
        assert_eq!(col.cells[2].volume, None);
        assert_eq!(col.cells[2].effect, Effect::None);
    }

    #[test]
    fn end_terminates_and_rest_has_no_instrument() {
        let events = [
            StreamEvent::Instrument(1),
            StreamEvent::Note { note: Note::None, duration: 6 },
            StreamEvent::End,
            note(60, 6),
        ];
        let col = normalize(&events, 6, 64);
        assert!(col.ended);
        assert_eq!(col.cells.len(), 1);
        assert_eq!(col.cells[0].instrument, 0);
    }

    #[test]
    fn row_cap_truncates_runaway_streams() {
        let events = vec![note(48, 600); 10];
        let col = normalize(&events, 6, 150);
        assert_eq!(col.cells.len(), 150);
        assert!(col.truncated);
    }

    #[test]
    fn trailing_commands_get_a_row() {
        let col = normalize(&[note(48, 6), StreamEvent::Speed(4)], 6, 64);
        assert_eq!(col.cells.len(), 2);
        assert_eq!(col.cells[1].effect, Effect::SetSpeed(4));
    }

    #[test]
    fn deterministic_output() {
        let events = [
            StreamEvent::Instrument(3),
            note(40, 5),
            StreamEvent::Speed(2),
            StreamEvent::Effect(Effect::VolumeSlide(-2)),
            note(41, 9),
            StreamEvent::Note { note: Note::Off, duration: 4 },
            StreamEvent::End,
        ];
        let a = normalize(&events, 6, 64);
        let b = normalize(&events, 6, 64);
        assert_eq!(a, b);
    }

    #[test]
    fn aligned_blocks_keep_voices_in_step() {
        let mut columns = vec![Vec::new(); 2];
        let on = |n| Cell { note: Note::On(n), ..Cell::empty() };
        append_aligned(&mut columns, vec![vec![on(1), Cell::empty(), Cell::empty()], vec![on(2)]]);
        append_aligned(&mut columns, vec![vec![on(3)], vec![on(4)]]);
        assert_eq!(columns[0].len(), 4);
        assert_eq!(columns[1].len(), 4);
        assert_eq!(columns[1][3].note, Note::On(4));
        assert!(columns[1][1].is_empty());
    }

    #[test]
    fn slices_pad_to_fixed_height() {
        let mut long = vec![Cell::empty(); 70];
        long[65].note = Note::On(1);
        let short = vec![Cell::empty(); 3];
        let grids = slice_columns(&[long, short], 64);
        assert_eq!(grids.len(), 2);
        assert_eq!(grids[1].len(), 2);
        assert_eq!(grids[1][0].len(), 64);
        assert_eq!(grids[1][1].len(), 64);
        assert_eq!(grids[1][0][1].note, Note::On(1));
    }

    #[test]
    fn empty_columns_still_yield_one_grid() {
        let grids = slice_columns(&[vec![], vec![]], 64);
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0][0].len(), 64);
    }

    #[test]
    fn oversized_slices_flow_into_next_grid() {
        let mut col = vec![Cell::empty(); 300];
        col[280].note = Note::On(7);
        let grids = slice_columns(&[col], 1000);
        assert_eq!(grids.len(), 2);
        assert_eq!(grids[0][0].len(), MAX_ROWS);
        assert_eq!(grids[1][0][280 - MAX_ROWS].note, Note::On(7));
    }
}
