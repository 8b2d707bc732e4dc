//! Format registry: picks the decoder for a buffer.
//!
//! Each [`Loader`] pairs a filename hint with a structural probe. The
//! probe is authoritative; the hint only gates formats whose structural
//! check is too weak to trust on its own, and breaks ties otherwise.

use log::{debug, info};
use mg_ir::{FormatSummary, Song};

use crate::formats;
use crate::{FormatError, ImportOptions};

/// Filename conventions for a format.
///
/// Matches `name.ext` and Amiga-style `prefix.name`, case-insensitively,
/// on the last path component only.
#[derive(Clone, Copy, Debug)]
pub struct NameHint {
    pub extensions: &'static [&'static str],
    pub prefixes: &'static [&'static str],
    /// Only probe buffers whose filename matches.
    pub required: bool,
}

impl NameHint {
    pub fn matches(&self, filename: &str) -> bool {
        let base = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(filename)
            .to_ascii_lowercase();

        let ext_match = base
            .rsplit_once('.')
            .is_some_and(|(_, ext)| self.extensions.contains(&ext));
        let prefix_match = base
            .split_once('.')
            .is_some_and(|(prefix, _)| self.prefixes.contains(&prefix));

        ext_match || prefix_match
    }
}

/// Per-import inputs shared by every pipeline stage.
#[derive(Clone, Copy, Debug)]
pub struct DecodeContext<'a> {
    /// Used for provenance metadata only
    pub filename: &'a str,
    pub options: &'a ImportOptions,
}

impl<'a> DecodeContext<'a> {
    pub fn new(filename: &'a str, options: &'a ImportOptions) -> Self {
        Self { filename, options }
    }
}

/// One supported format family.
pub trait Loader: Sync {
    /// Short id, also used as the provenance tag
    fn id(&self) -> &'static str;

    /// Human-readable format label
    fn name(&self) -> &'static str;

    fn hint(&self) -> NameHint;

    /// Smallest buffer that can hold the minimal header.
    fn min_size(&self) -> usize;

    /// Structural check on a buffer of at least `min_size` bytes.
    ///
    /// Returns the number of constraints checked when the buffer is
    /// accepted, used to rank competing formats.
    fn check(&self, data: &[u8]) -> Option<u32>;

    /// Decode an accepted buffer.
    fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError>;

    /// Size gate plus structural check.
    fn probe(&self, data: &[u8]) -> Option<u32> {
        if data.len() < self.min_size() {
            return None;
        }
        self.check(data)
    }
}

static LOADERS: &[&dyn Loader] = &[
    &formats::protracker::ProTracker,
    &formats::soundfx::SoundFx,
    &formats::cdfm67::Cdfm67,
    &formats::cba::ChuckBiscuits,
    &formats::rtm::RealTracker,
    &formats::oktalyzer::Oktalyzer,
    &formats::future_composer::FutureComposer,
    &formats::soundmon::SoundMon,
    &formats::ahx::Ahx,
    &formats::hively::Hively,
    &formats::sidmon2::SidMon2,
    &formats::sidmon1::SidMon1,
    &formats::digital_mugician::DigitalMugician,
    &formats::hippel_coso::HippelCoso,
    &formats::fred::FredEditor,
    &formats::rob_hubbard::RobHubbard,
    &formats::david_whittaker::DavidWhittaker,
    &formats::sound_master::SoundMaster,
    &formats::paul_shields::PaulShields,
    &formats::sean_conran::SeanConran,
    &formats::infogrames::Infogrames,
    &formats::midi_loriciel::MidiLoriciel,
    &formats::sawteeth::Sawteeth,
];

/// Every registered loader, in declaration order.
pub fn loaders() -> &'static [&'static dyn Loader] {
    LOADERS
}

/// Look up a loader by its short id.
pub fn loader_by_id(id: &str) -> Option<&'static dyn Loader> {
    LOADERS.iter().copied().find(|l| l.id().eq_ignore_ascii_case(id))
}

fn select<'l>(
    candidates: &[&'l dyn Loader],
    filename: &str,
    data: &[u8],
) -> Option<&'l dyn Loader> {
    let mut best: Option<(u32, bool, &'l dyn Loader)> = None;

    for &loader in candidates {
        let hint = loader.hint();
        let named = hint.matches(filename);
        if hint.required && !named {
            continue;
        }
        let Some(score) = loader.probe(data) else {
            continue;
        };
        debug!("{}: accepted by {} (specificity {score})", filename, loader.id());

        // Earlier declarations win exact ties.
        let better = match best {
            None => true,
            Some((s, n, _)) => (score, named) > (s, n),
        };
        if better {
            best = Some((score, named, loader));
        }
    }

    best.map(|(_, _, loader)| loader)
}

/// Pick the best-matching decoder, or `None` if nothing accepts the buffer.
pub fn detect(filename: &str, data: &[u8]) -> Option<&'static dyn Loader> {
    select(LOADERS, filename, data)
}

/// Detect and decode with default options.
pub fn import(filename: &str, data: &[u8]) -> Result<Song, FormatError> {
    import_with_options(filename, data, &ImportOptions::default())
}

pub fn import_with_options(
    filename: &str,
    data: &[u8],
    options: &ImportOptions,
) -> Result<Song, FormatError> {
    let loader = detect(filename, data).ok_or(FormatError::Unrecognized)?;
    info!("{}: importing as {}", filename, loader.name());
    let ctx = DecodeContext::new(filename, options);
    loader.load(data, &ctx)
}

/// Decode and summarize for an import-preview dialog.
pub fn preview(filename: &str, data: &[u8]) -> Result<FormatSummary, FormatError> {
    let loader = detect(filename, data).ok_or(FormatError::Unrecognized)?;
    let options = ImportOptions::default();
    let song = loader.load(data, &DecodeContext::new(filename, &options))?;
    Ok(song.summary(loader.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_ir::PlaybackFormat;

    struct Fake {
        id: &'static str,
        score: Option<u32>,
        required: bool,
    }

    impl Loader for Fake {
        fn id(&self) -> &'static str {
            self.id
        }
        fn name(&self) -> &'static str {
            self.id
        }
        fn hint(&self) -> NameHint {
            NameHint {
                extensions: &["fk"],
                prefixes: &["fk"],
                required: self.required,
            }
        }
        fn min_size(&self) -> usize {
            4
        }
        fn check(&self, _data: &[u8]) -> Option<u32> {
            self.score
        }
        fn load(&self, _data: &[u8], _ctx: &DecodeContext) -> Result<Song, FormatError> {
            Ok(Song::new(self.id, PlaybackFormat::Mod))
        }
    }

    #[test]
    fn hint_matches_extension_and_prefix() {
        let hint = NameHint {
            extensions: &["rh"],
            prefixes: &["rh"],
            required: true,
        };
        assert!(hint.matches("Tune.RH"));
        assert!(hint.matches("mods/rh.commando"));
        assert!(hint.matches("C:\\music\\RH.Zoids"));
        assert!(!hint.matches("rhythm.mod"));
        assert!(!hint.matches("rh"));
        assert!(!hint.matches("dir.rh/song.mod"));
    }

    #[test]
    fn higher_specificity_wins() {
        let weak = Fake { id: "weak", score: Some(2), required: false };
        let strong = Fake { id: "strong", score: Some(5), required: false };
        let picked = select(&[&weak, &strong], "x.bin", &[0; 8]).unwrap();
        assert_eq!(picked.id(), "strong");
    }

    #[test]
    fn ties_go_to_declaration_order() {
        let a = Fake { id: "a", score: Some(3), required: false };
        let b = Fake { id: "b", score: Some(3), required: false };
        assert_eq!(select(&[&a, &b], "x.bin", &[0; 8]).unwrap().id(), "a");
        assert_eq!(select(&[&b, &a], "x.bin", &[0; 8]).unwrap().id(), "b");
    }

    #[test]
    fn name_breaks_specificity_ties() {
        let a = Fake { id: "a", score: Some(3), required: false };
        let b = Fake { id: "b", score: Some(3), required: false };
        struct Named(Fake);
        impl Loader for Named {
            fn id(&self) -> &'static str {
                self.0.id
            }
            fn name(&self) -> &'static str {
                self.0.id
            }
            fn hint(&self) -> NameHint {
                NameHint { extensions: &["zz"], prefixes: &[], required: false }
            }
            fn min_size(&self) -> usize {
                0
            }
            fn check(&self, data: &[u8]) -> Option<u32> {
                self.0.check(data)
            }
            fn load(&self, data: &[u8], ctx: &DecodeContext) -> Result<Song, FormatError> {
                self.0.load(data, ctx)
            }
        }
        let named_b = Named(b);
        assert_eq!(select(&[&a, &named_b], "song.zz", &[0; 8]).unwrap().id(), "b");
    }

    #[test]
    fn required_hint_gates_detection() {
        let gated = Fake { id: "gated", score: Some(9), required: true };
        assert!(select(&[&gated], "song.mod", &[0; 8]).is_none());
        assert!(select(&[&gated], "song.fk", &[0; 8]).is_some());
    }

    #[test]
    fn short_buffers_fail_the_size_gate() {
        let fake = Fake { id: "f", score: Some(1), required: false };
        assert!(fake.probe(&[0; 3]).is_none());
        assert!(fake.probe(&[0; 4]).is_some());
    }

    #[test]
    fn registry_ids_are_unique() {
        let mut ids: Vec<_> = loaders().iter().map(|l| l.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), loaders().len());
        assert!(loader_by_id("SAW").is_some());
    }

    #[test]
    fn unrecognized_buffer_is_an_error() {
        assert!(matches!(import("noise.bin", &[0x55; 32]), Err(FormatError::Unrecognized)));
    }
}
