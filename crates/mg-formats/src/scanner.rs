//! Opcode-pattern scanner for relocatable 68000 player binaries.
//!
//! Some formats ship as the replay routine plus its data, assembled as
//! position-independent code. Table addresses are only present as
//! operands of `LEA d16(PC),An` and friends, so each decoder lists the
//! instruction words that precede the operand it needs and the scanner
//! resolves them the way the CPU would.

use log::trace;

use crate::cursor::BinaryRead;

/// One expected instruction word, relative to the candidate site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpcodeWord {
    pub offset: usize,
    pub word: u16,
    pub mask: u16,
}

/// Exact-match opcode word.
pub const fn op(offset: usize, word: u16) -> OpcodeWord {
    OpcodeWord { offset, word, mask: 0xFFFF }
}

/// Opcode word compared under `mask` (e.g. `MOVEQ` with any immediate).
pub const fn op_masked(offset: usize, word: u16, mask: u16) -> OpcodeWord {
    OpcodeWord { offset, word, mask }
}

/// How to read the value a rule is after.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    /// `d16(PC)`: target = address of the displacement word + sign-extended d16.
    PcRelative16 { at: usize },
    /// A single byte, e.g. the immediate of `MOVEQ` at `at = 1`.
    Immediate8 { at: usize },
    Immediate16 { at: usize },
    Immediate32 { at: usize },
}

/// A named opcode sequence plus the operand it locates.
#[derive(Clone, Copy, Debug)]
pub struct OpcodeRule {
    pub name: &'static str,
    pub pattern: &'static [OpcodeWord],
    pub operand: Operand,
}

/// Byte range of candidate sites, clipped to the buffer when scanning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanWindow {
    pub start: usize,
    pub end: usize,
}

impl ScanWindow {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A matched rule: site offset and resolved operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanHit {
    pub at: usize,
    /// Absolute buffer offset for PC-relative operands, raw value otherwise
    pub value: u32,
}

/// The first rule that found nothing usable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanFailure {
    pub rule: &'static str,
}

impl std::fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "opcode pattern '{}' not found", self.rule)
    }
}

fn matches_at(data: &[u8], site: usize, pattern: &[OpcodeWord]) -> bool {
    pattern.iter().all(|w| {
        data.u16be_at(site + w.offset)
            .is_ok_and(|v| v & w.mask == w.word & w.mask)
    })
}

fn resolve(data: &[u8], site: usize, operand: Operand) -> Option<u32> {
    match operand {
        Operand::PcRelative16 { at } => {
            let ext = site + at;
            let disp = data.i16be_at(ext).ok()? as i64;
            let target = ext as i64 + disp;
            (0..data.len() as i64).contains(&target).then_some(target as u32)
        }
        Operand::Immediate8 { at } => data.u8_at(site + at).ok().map(u32::from),
        Operand::Immediate16 { at } => data.u16be_at(site + at).ok().map(u32::from),
        Operand::Immediate32 { at } => data.u32be_at(site + at).ok(),
    }
}

/// First site in `window` where `rule` matches with an in-bounds operand.
pub fn scan(data: &[u8], window: ScanWindow, rule: &OpcodeRule) -> Option<ScanHit> {
    let start = (window.start + 1) & !1;
    let end = window.end.min(data.len());

    let hit = (start..end).step_by(2).find_map(|site| {
        if !matches_at(data, site, rule.pattern) {
            return None;
        }
        let value = resolve(data, site, rule.operand);
        if value.is_none() {
            trace!("{}: match at {site:#x} but operand out of range", rule.name);
        }
        value.map(|value| ScanHit { at: site, value })
    });

    if let Some(h) = hit {
        trace!("{}: hit at {:#x} -> {:#x}", rule.name, h.at, h.value);
    }
    hit
}

/// Apply every rule in order; fails on the first rule without a hit.
pub fn scan_all(
    data: &[u8],
    window: ScanWindow,
    rules: &[OpcodeRule],
) -> Result<Vec<ScanHit>, ScanFailure> {
    rules
        .iter()
        .map(|rule| scan(data, window, rule).ok_or(ScanFailure { rule: rule.name }))
        .collect()
}
