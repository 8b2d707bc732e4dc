//! modgrid: import tracker and chip-music modules into one song model.
//!
//! Decoding lives in [`mg_formats`]; the song model in [`mg_ir`]. This
//! crate adds the text rendering used by the `mg-cli` inspection tool.

pub mod cell_format;

pub use mg_formats::{detect, import, import_with_options, preview, FormatError, ImportOptions};
pub use mg_ir::{FormatSummary, Song};
