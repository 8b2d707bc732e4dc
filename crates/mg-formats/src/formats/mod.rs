//! One decoder per format family.

use mg_ir::{Instrument, Song};

use crate::registry::{DecodeContext, Loader};
use crate::{FormatError, ImportOptions};

pub mod ahx;
pub mod cba;
pub mod cdfm67;
pub mod david_whittaker;
pub mod digital_mugician;
pub mod fred;
pub mod future_composer;
pub mod hippel_coso;
pub mod hively;
pub mod infogrames;
pub mod midi_loriciel;
pub mod oktalyzer;
pub mod paul_shields;
pub mod protracker;
pub mod rob_hubbard;
pub mod rtm;
pub mod sawteeth;
pub mod sean_conran;
pub mod sidmon1;
pub mod sidmon2;
pub mod sound_master;
pub mod soundfx;
pub mod soundmon;

pub use ahx::load_ahx;
pub use cba::load_cba;
pub use cdfm67::load_c67;
pub use david_whittaker::load_david_whittaker;
pub use digital_mugician::load_digital_mugician;
pub use fred::load_fred;
pub use future_composer::load_fc;
pub use hippel_coso::load_hippel_coso;
pub use hively::load_hively;
pub use infogrames::load_infogrames;
pub use midi_loriciel::load_midi_loriciel;
pub use oktalyzer::load_okt;
pub use paul_shields::load_paul_shields;
pub use protracker::load_mod;
pub use rob_hubbard::load_rob_hubbard;
pub use rtm::load_rtm;
pub use sawteeth::load_sawteeth;
pub use sean_conran::load_sean_conran;
pub use sidmon1::load_sidmon1;
pub use sidmon2::load_sidmon2;
pub use sound_master::load_sound_master;
pub use soundfx::load_sfx;
pub use soundmon::load_soundmon;

/// Decode with default options and no filename.
fn load_standalone(loader: &dyn Loader, data: &[u8]) -> Result<Song, FormatError> {
    let options = ImportOptions::default();
    loader.load(data, &DecodeContext::new("", &options))
}

/// Hard failure when the buffer cannot hold the minimal header.
fn require_len(format: &'static str, data: &[u8], needed: usize) -> Result<(), FormatError> {
    if data.len() < needed {
        return Err(FormatError::TooShort {
            format,
            needed,
            got: data.len(),
        });
    }
    Ok(())
}

/// Silent instruments for formats whose instrument data cannot be extracted.
fn placeholder_instruments(count: usize, label: &str) -> Vec<Instrument> {
    (0..count.max(1))
        .map(|i| Instrument::placeholder(i as u16 + 1, &format!("{label} {}", i + 1)))
        .collect()
}

/// Text of a name field with a fallback for empty names.
fn name_or(name: String, fallback: impl FnOnce() -> String) -> String {
    if name.is_empty() {
        fallback()
    } else {
        name
    }
}
