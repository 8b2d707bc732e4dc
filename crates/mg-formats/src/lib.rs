//! Module format detection and decoders for modgrid.
//!
//! Turns a byte buffer plus its filename into an [`mg_ir::Song`]. The
//! pipeline is: registry probe, optional opcode scan for relocatable
//! player binaries, per-format decode, effect translation and event
//! normalization, sample extraction, and final song assembly.
//!
//! Decoders never touch the filesystem and share no mutable state, so
//! imports may run concurrently on independent threads.

pub mod assembler;
pub mod cursor;
pub mod effect_parser;
pub mod extractor;
pub mod formats;
pub mod normalizer;
mod registry;
pub mod scanner;

pub use assembler::{PanScheme, SongBuilder};
pub use formats::{
    load_ahx, load_c67, load_cba, load_david_whittaker, load_digital_mugician, load_fc,
    load_fred, load_hippel_coso, load_hively, load_infogrames, load_midi_loriciel, load_mod,
    load_okt, load_paul_shields, load_rob_hubbard, load_rtm, load_sawteeth, load_sean_conran,
    load_sfx, load_sidmon1, load_sidmon2, load_sound_master, load_soundmon,
};
pub use registry::{
    detect, import, import_with_options, loader_by_id, loaders, preview, DecodeContext, Loader,
    NameHint,
};

/// Error type for format parsing.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// No registered format accepted the buffer.
    #[error("unrecognized module format")]
    Unrecognized,
    /// The buffer cannot hold even the minimal header.
    #[error("{format}: file too short ({got} bytes, need at least {needed})")]
    TooShort {
        format: &'static str,
        needed: usize,
        got: usize,
    },
    /// A bounds-checked read ran off the end of the buffer.
    #[error("unexpected end of data at offset {offset:#x}")]
    UnexpectedEof { offset: usize },
    /// The minimal header is present but unusable.
    #[error("{format}: invalid header: {reason}")]
    InvalidHeader {
        format: &'static str,
        reason: String,
    },
    #[error("header parse failed: {0}")]
    Binary(#[from] binrw::Error),
}

/// Tunables for one import.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportOptions {
    /// Height of patterns cut from event streams, and of placeholder patterns
    pub rows_per_pattern: u16,
    /// Cap on rows the normalizer emits for one channel timeline
    pub max_rows_per_channel: u32,
    /// Fixed import timestamp (unix seconds); `None` reads the wall clock
    pub timestamp: Option<i64>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            rows_per_pattern: 64,
            max_rows_per_channel: 64 * 256,
            timestamp: None,
        }
    }
}

impl ImportOptions {
    /// Import timestamp to stamp into pattern metadata.
    pub fn resolve_timestamp(&self) -> i64 {
        self.timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp())
    }
}
