//! Minimal synthetic modules, one per format family.

#![allow(dead_code)]

pub fn put16(data: &mut [u8], at: usize, v: u16) {
    data[at..at + 2].copy_from_slice(&v.to_be_bytes());
}

pub fn put32(data: &mut [u8], at: usize, v: u32) {
    data[at..at + 4].copy_from_slice(&v.to_be_bytes());
}

/// 4-channel `M.K.` module: one pattern, one 32-byte sample, C-3 on row 0.
pub fn mod_file() -> Vec<u8> {
    let mut data = vec![0u8; 1084 + 1024 + 32];
    data[..4].copy_from_slice(b"tune");
    put16(&mut data, 20 + 22, 16);
    data[20 + 25] = 64;
    data[950] = 1;
    data[1080..1084].copy_from_slice(b"M.K.");
    data[1084..1088].copy_from_slice(&[0x01, 0xAC, 0x10, 0x00]);
    data
}

/// CDFM67 header with `pcm_len` bytes in sample slot 1 and one empty pattern.
pub fn c67_file(pcm_len: u32, loop_end: u32) -> Vec<u8> {
    let mut data = vec![0u8; 2978];
    data[0] = 6;
    let samples = 2 + 32 * 13;
    data[samples + 4..samples + 8].copy_from_slice(&pcm_len.to_le_bytes());
    data[samples + 12..samples + 16].copy_from_slice(&loop_end.to_le_bytes());
    for slot in 1..32 {
        let o = samples + slot * 16 + 12;
        data[o..o + 4].copy_from_slice(&0xFFFFFu32.to_le_bytes());
    }
    let orders = samples + 32 * 16 + 32 * 13 + 32 * 11;
    data[orders + 1..orders + 256].fill(0xFF);
    let lengths = orders + 256 + 128 * 4;
    data[lengths..lengths + 4].copy_from_slice(&1u32.to_le_bytes());
    data.push(0x60);
    data.extend((0..pcm_len).map(|i| i as u8));
    data
}

/// AHX v0: one position, one four-row track, one instrument.
pub fn ahx_file() -> Vec<u8> {
    let mut data = b"THX\0".to_vec();
    data.extend_from_slice(&[0, 0, 0, 1, 0, 0, 4, 0, 1, 0]);
    data.extend_from_slice(&[0; 8]);
    data.extend_from_slice(&[0x04, 0x10, 0x00]);
    data.extend_from_slice(&[0; 9]);
    let mut inst = [0u8; 22];
    inst[0] = 64;
    inst[1] = 0x02;
    data.extend_from_slice(&inst);
    let names = data.len() as u16;
    put16(&mut data, 4, names);
    data.extend_from_slice(b"ahx\0lead\0");
    data
}

fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut c = tag.to_vec();
    c.extend_from_slice(&(body.len() as u32).to_be_bytes());
    c.extend_from_slice(body);
    c
}

/// Oktalyzer with four plain channels and one 8-byte sample.
pub fn okt_file() -> Vec<u8> {
    let mut data = b"OKTASONG".to_vec();
    data.extend(chunk(b"CMOD", &[0; 8]));
    let mut samp = vec![0u8; 32];
    samp[20..24].copy_from_slice(&8u32.to_be_bytes());
    samp[29] = 64;
    data.extend(chunk(b"SAMP", &samp));
    data.extend(chunk(b"SPEE", &6u16.to_be_bytes()));
    data.extend(chunk(b"PLEN", &1u16.to_be_bytes()));
    data.extend(chunk(b"PATT", &[0u8; 128]));
    let mut pbod = 2u16.to_be_bytes().to_vec();
    pbod.extend_from_slice(&[13, 0, 0, 0]);
    pbod.extend_from_slice(&[0; 28]);
    data.extend(chunk(b"PBOD", &pbod));
    data.extend(chunk(b"SBOD", &[1, 2, 3, 4, 5, 6, 7, 8]));
    data
}

/// Sawteeth v1200: one channel, one part, one instrument.
pub fn saw_file() -> Vec<u8> {
    let mut data = b"SWTD".to_vec();
    data.extend_from_slice(&[0x04, 0xB0, 0x03, 0x72]);
    data.extend_from_slice(&[1, 0, 255, 0, 1, 0, 0, 0, 0, 0, 0, 0]);
    data.extend_from_slice(&[1, 6, 2, 1, 0, 49, 0, 0, 0]);
    data.push(2);
    data.extend_from_slice(&[1, 0, 255, 1, 0, 64]);
    data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1, 1, 0, 0x01, 0]);
    data.push(0);
    data.extend_from_slice(b"saw\0\0");
    data
}

/// Single-track SMF at 96 ppqn with two notes on channel 1.
pub fn midi_file() -> Vec<u8> {
    let track = [
        0x00, 0xC0, 0x10, //
        0x00, 0x90, 0x3C, 0x7F, //
        0x60, 0x80, 0x3C, 0x00, //
        0x00, 0x90, 0x40, 0x50, //
        0x60, 0x80, 0x40, 0x00, //
        0x00, 0xFF, 0x2F, 0x00,
    ];
    let mut data = b"MThd".to_vec();
    data.extend_from_slice(&[0, 0, 0, 6, 0, 0, 0, 1, 0, 96]);
    data.extend_from_slice(b"MTrk");
    data.extend_from_slice(&(track.len() as u32).to_be_bytes());
    data.extend_from_slice(&track);
    data
}

/// Infogrames header: name, `00 0F` marker, one subsong, two instruments.
pub fn dum_file() -> Vec<u8> {
    let mut data = vec![0x00, 0x08];
    data.extend_from_slice(b"dum\0\0\0");
    data.extend_from_slice(&[0x00, 0x0F, 0x00, 0x01, 0x00, 0x02, 0, 0]);
    data
}

/// Rob Hubbard player stub with a one-sample bank.
pub fn rh_file() -> Vec<u8> {
    let mut data = vec![0u8; 0x80];
    data[0..8].copy_from_slice(&[0x60, 0x00, 0x00, 0x10, 0x60, 0x00, 0x00, 0x20]);
    data[44..50].copy_from_slice(&[0x7E, 0x00, 0x41, 0xFA, 0x00, 0x50]);
    data.extend_from_slice(&[0, 0, 0, 4, 0x1F, 0x40, 0xFF, 0xFF, 0, 64, 1, 2, 3, 4]);
    data
}

/// Fred Editor player stub: one note on channel 0, one 16-byte sample.
pub fn fred_file() -> Vec<u8> {
    const DATA: usize = 0x40;
    const SAMPLES: usize = 0x900;
    const PATTERNS: usize = 0x940;
    const TRACKS: usize = 0x980;
    const PCM: usize = 0xA00;

    let mut data = vec![0u8; PCM + 16];
    for i in 0..4 {
        put16(&mut data, i * 4, 0x4EFA);
    }
    put16(&mut data, 16, 0x123A);
    put16(&mut data, 18, (DATA + 0x895 - 18) as u16);
    put16(&mut data, 20, 0xB001);
    put16(&mut data, 22, 0x214A);
    put16(&mut data, 26, 0x47FA);
    put16(&mut data, 28, (-28i16) as u16);

    data[DATA + 0x897] = 6;
    put32(&mut data, DATA + 0x8A2, SAMPLES as u32);
    put32(&mut data, DATA + 0x8A6, PATTERNS as u32);
    put32(&mut data, DATA + 0x8AA, TRACKS as u32);

    put32(&mut data, SAMPLES, PCM as u32);
    put16(&mut data, SAMPLES + 4, 0xFFFF);
    put16(&mut data, SAMPLES + 6, 8);
    put16(&mut data, SAMPLES + 8, 1024);
    data[SAMPLES + 14] = 64;

    data[PATTERNS..PATTERNS + 5].copy_from_slice(&[0x83, 0, 0xFF, 25, 0x80]);
    put16(&mut data, TRACKS, 8);
    for ch in 1..4 {
        put16(&mut data, TRACKS + ch * 2, 12);
    }
    put16(&mut data, TRACKS + 8, 0);
    put16(&mut data, TRACKS + 10, 0xFFFF);
    put16(&mut data, TRACKS + 12, 0xFFFF);
    data
}

/// SoundFX: one 16-byte sample, a note with arpeggio on channel 0.
pub fn sfx_file() -> Vec<u8> {
    let mut data = vec![0u8; 660 + 1024 + 16];
    put32(&mut data, 0, 16);
    data[60..64].copy_from_slice(b"SONG");
    put16(&mut data, 64, 14565);
    data[80..85].copy_from_slice(b"snare");
    data[80 + 25] = 40;
    data[530] = 1;
    data[660..664].copy_from_slice(&[0x00, 0xD6, 0x11, 0x37]);
    data
}

/// Chuck Biscuits: four channels, one looped delta sample, one pattern.
pub fn cba_file() -> Vec<u8> {
    let mut data = vec![0u8; 333];
    data[..4].copy_from_slice(b"CBA\xF9");
    data[4..9].copy_from_slice(b"lotus");
    data[36] = 0x1A;
    data[39] = 4;
    data[41] = 1;
    data[42] = 1;
    data[43] = 6;
    data[44] = 125;

    let mut sample = [0u8; 48];
    sample[..4].copy_from_slice(b"kick");
    sample[32] = 0x08;
    sample[33] = 50;
    sample[34..36].copy_from_slice(&8363u16.to_le_bytes());
    sample[36..40].copy_from_slice(&4u32.to_le_bytes());
    sample[44..48].copy_from_slice(&4u32.to_le_bytes());
    data.extend_from_slice(&sample);

    let mut pattern = vec![0u8; 64 * 4 * 5];
    pattern[..5].copy_from_slice(&[1, 37, 33, 0x03, 0x03]);
    data.extend_from_slice(&pattern);
    data.extend_from_slice(&[10, 5, 0xFB, 1]);
    data
}

fn rtm_object(tag: &[u8; 4], name: &str, size: u16) -> Vec<u8> {
    let mut o = vec![0u8; 42];
    o[..4].copy_from_slice(tag);
    o[4] = 0x20;
    o[5..5 + name.len()].copy_from_slice(name.as_bytes());
    o[37] = 0x1A;
    o[38..40].copy_from_slice(&0x0112u16.to_le_bytes());
    o[40..42].copy_from_slice(&size.to_le_bytes());
    o
}

/// Real Tracker 2: two channels, one four-row pattern, one instrument.
pub fn rtm_file() -> Vec<u8> {
    let mut data = rtm_object(b"RTMM", "rt song", 130);
    let mut song = vec![0u8; 130];
    song[52..54].copy_from_slice(&1u16.to_le_bytes());
    song[54] = 2;
    song[55] = 1;
    song[56..58].copy_from_slice(&1u16.to_le_bytes());
    song[58..60].copy_from_slice(&1u16.to_le_bytes());
    song[60] = 6;
    song[61] = 125;
    song[94..98].copy_from_slice(&2u32.to_le_bytes());
    data.extend_from_slice(&song);
    data.extend_from_slice(&0u16.to_le_bytes());

    let packed = [0x0E, 48, 1, 0x0F, 0x00];
    data.extend(rtm_object(b"RTND", "", 9));
    data.extend_from_slice(&0u16.to_le_bytes());
    data.push(2);
    data.extend_from_slice(&4u16.to_le_bytes());
    data.extend_from_slice(&(packed.len() as u32).to_le_bytes());
    data.extend_from_slice(&packed);

    data.extend(rtm_object(b"RTIN", "piano", 1));
    data.push(1);
    data.extend(rtm_object(b"RTSM", "", 26));
    let mut sample = [0u8; 26];
    sample[3] = 40;
    sample[4..8].copy_from_slice(&4u32.to_le_bytes());
    sample[20..24].copy_from_slice(&22050u32.to_le_bytes());
    data.extend_from_slice(&sample);
    data.extend_from_slice(&[1, 2, 3, 4]);
    data
}

/// Offset where FC14 sample and wave data start in [`fc_file`].
const FC_SAMPLES: usize = 100 + 80 + 13 + 64 + 64 + 64;

/// Future Composer 1.4: one step, one pattern, one macro on wavetable 0.
pub fn fc_file() -> Vec<u8> {
    let seq = 180;
    let pat = seq + 13;
    let freq = pat + 64;
    let vol = freq + 64;
    let mut data = vec![0u8; FC_SAMPLES + 16];
    data[..4].copy_from_slice(b"FC14");
    for (at, v) in [
        (4, 13),
        (8, pat),
        (12, 64),
        (16, freq),
        (20, 64),
        (24, vol),
        (28, 64),
        (32, FC_SAMPLES),
        (36, FC_SAMPLES),
    ] {
        put32(&mut data, at, v as u32);
    }
    data[100] = 8;
    data[seq + 12] = 5;
    data[pat..pat + 4].copy_from_slice(&[13, 0x00, 0x49, 0]);
    data[freq..freq + 3].copy_from_slice(&[0xE2, 10, 0xE1]);
    data[vol..vol + 6].copy_from_slice(&[2, 0, 1, 2, 3, 48]);
    for (i, b) in data[FC_SAMPLES..].iter_mut().enumerate() {
        *b = i as u8;
    }
    data
}

/// SoundMon V.3 with one synth table: a synth and a sampled instrument.
pub fn bp_file() -> Vec<u8> {
    let mut data = vec![0u8; 512];
    data[..4].copy_from_slice(b"demo");
    data[26..30].copy_from_slice(b"V.3\x01");
    put16(&mut data, 30, 1);
    data[32] = 0xFF;
    put16(&mut data, 34, 16);
    data[32 + 29] = 40;
    data[64..69].copy_from_slice(b"snare");
    put16(&mut data, 64 + 24, 4);
    data[64 + 31] = 64;

    let mut step = [0u8; 16];
    step[..2].copy_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&step);
    let mut pattern = [0u8; 48];
    pattern[..3].copy_from_slice(&[13, 0x10, 0x00]);
    data.extend_from_slice(&pattern);
    data.extend((0..64).map(|i| i as u8));
    data.extend_from_slice(&[5; 8]);
    data
}

/// SidMon II: one position, one instrument on one sample, one pattern.
pub fn sid2_file() -> Vec<u8> {
    let pattern = [1, 1, 0xFD, 13, 0];
    let mut data = vec![0u8; 90];
    data[3] = 4;
    put16(&mut data, 4, 64);
    put32(&mut data, 14, 4);
    put32(&mut data, 26, 32);
    put32(&mut data, 30, 16);
    put32(&mut data, 50, pattern.len() as u32);
    data[58..86].copy_from_slice(b"SIDMON II - THE MIDI VERSION");

    data.extend_from_slice(&[0; 12]);
    let mut inst = [0u8; 32];
    inst[2] = 1;
    inst[16] = 255;
    data.extend_from_slice(&inst);
    data.extend_from_slice(&[0; 16]);
    let mut sample = [0u8; 64];
    put16(&mut sample, 4, 8);
    data.extend_from_slice(&sample);
    data.extend_from_slice(&0u16.to_be_bytes());
    data.extend_from_slice(&pattern);
    data.push(0);
    data.extend((0..16).map(|i| i as u8));
    data
}

/// Sound Master player stub: speed 4, five samples.
pub fn sm_file() -> Vec<u8> {
    let mut data = vec![0u8; 0x60];
    for at in [0, 4, 8] {
        data[at..at + 4].copy_from_slice(&[0x60, 0x00, 0x00, 0x20]);
    }
    data[0x20..0x28].copy_from_slice(&[0x43, 0xFA, 0x00, 0x2E, 0x30, 0x3C, 0x00, 0x05]);
    data[0x50] = 4;
    data
}

/// Paul Shields offset tables: three sample records.
pub fn ps_file() -> Vec<u8> {
    let mut data = vec![0u8; 0x100];
    put16(&mut data, 4, 0x10);
    put16(&mut data, 6, 0x20);
    put16(&mut data, 8, 0x50);
    data
}

/// Sean Conran player stub: three subsongs, two sample lengths.
pub fn scr_file() -> Vec<u8> {
    let mut data = vec![0u8; 0x40];
    data[0..12].copy_from_slice(&[0x60, 0, 0, 0x10, 0x60, 0, 0, 0x20, 0x41, 0xFA, 0, 0x30]);
    data[0x10..0x18].copy_from_slice(&[0x0C, 0x40, 0x00, 0x03, 0x41, 0xFA, 0x00, 0x1A]);
    data[0x30..0x3C].copy_from_slice(&[0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 0, 0]);
    data
}

/// HivelyTracker: five voices, one position, track 0 empty, one instrument.
pub fn hvl_file() -> Vec<u8> {
    let mut data = b"HVL\x01".to_vec();
    data.extend_from_slice(&[0, 0]);
    data.extend_from_slice(&(0x8000u16 | 1).to_be_bytes());
    data.extend_from_slice(&(1u16 << 10).to_be_bytes());
    data.extend_from_slice(&[4, 1, 1, 0, 100, 2]);
    data.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    data.extend_from_slice(&[1, 1, 0xC0, 0x20, 0x00]);
    data.extend_from_slice(&[0x3F; 3]);
    let mut inst = [0u8; 22];
    inst[0] = 48;
    inst[1] = 0x02;
    inst[21] = 1;
    data.extend_from_slice(&inst);
    data.extend_from_slice(&[0x00, 0x01, 0x18, 0, 0]);
    let names = data.len() as u16;
    put16(&mut data, 4, names);
    data.extend_from_slice(b"hvl\0lead\0");
    data
}

/// Jochen Hippel COSO: one song step, one pattern, one volume sequence on sample 0.
pub fn coso_file() -> Vec<u8> {
    const FREQ0: usize = 84;
    const VOL0: usize = 87;
    const PAT0: usize = 95;
    const PCM: usize = 103;
    let mut data = vec![0u8; PCM + 16];
    data[..4].copy_from_slice(b"COSO");
    data[32..36].copy_from_slice(b"TFMX");
    for (i, v) in [50u32, 52, 54, 56, 68, 74, PCM as u32].iter().enumerate() {
        put32(&mut data, 4 + i * 4, *v);
    }
    put16(&mut data, 46, 1);
    put16(&mut data, 48, 1);
    put16(&mut data, 50, FREQ0 as u16);
    put16(&mut data, 52, VOL0 as u16);
    put16(&mut data, 54, PAT0 as u16);
    data[68 + 5] = 3;
    data[74 + 5] = 8;
    data[FREQ0..FREQ0 + 3].copy_from_slice(&[0xE2, 0, 0xE1]);
    data[VOL0..VOL0 + 8].copy_from_slice(&[2, 0, 1, 2, 3, 48, 32, 0xE1]);
    data[PAT0..PAT0 + 8].copy_from_slice(&[12, 0x00, 0xFE, 2, 24, 0x00, 0xFF, 0xFF]);
    for (i, b) in data[PCM..].iter_mut().enumerate() {
        *b = i as u8;
    }
    data
}

pub const SID1_BASE: usize = 64;

/// SidMon 1.0: marker at `SID1_BASE`, one pattern of two rows on every voice.
pub fn sid1_file() -> Vec<u8> {
    let mut data = vec![0u8; SID1_BASE];
    let rel = [32u32, 38, 44, 50, 56, 56, 88, 88, 152, 152, 156];
    for (i, r) in rel.iter().enumerate() {
        put32(&mut data, SID1_BASE - 44 + i * 4, *r);
    }
    data.extend_from_slice(b" SID-MON BY R.v.VLIET  (c) 1988 ");
    for _ in 0..4 {
        data.extend_from_slice(&[0; 6]);
    }
    let mut inst = [0u8; 32];
    inst[21] = 64;
    data.extend_from_slice(&inst);
    data.extend((0..32).map(|i| i as u8));
    data.extend_from_slice(&[0x80; 32]);
    data.extend_from_slice(&[0; 4]);
    data.extend_from_slice(&[1, 1, 0, 0, 12, 13, 0, 0, 0, 6]);
    data
}

pub const DMU_TABLES: usize = 204;

/// Digital Mugician: one song step on track 0, one synth and one sampled instrument.
pub fn dmu_file() -> Vec<u8> {
    let mut data = vec![0u8; DMU_TABLES];
    data[..24].copy_from_slice(b" MUGICIAN/SOFTEYES 1990 ");
    put16(&mut data, 26, 1);
    put32(&mut data, 28, 1);
    put32(&mut data, 60, 2);
    put32(&mut data, 64, 1);
    put32(&mut data, 68, 1);
    put32(&mut data, 72, 8);
    data[76..80].copy_from_slice(&[0, 0, 6, 1]);
    data[80..84].copy_from_slice(b"demo");
    data.extend_from_slice(&[0; 8]);
    let mut track = vec![0u8; 256];
    track[..4].copy_from_slice(&[1, 1, 0x42, 40]);
    track[4..8].copy_from_slice(&[13, 2, 0, 0]);
    data.extend_from_slice(&track);
    data.extend_from_slice(&[0, 16, 48, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    data.extend_from_slice(&[32, 0, 64, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    data.extend((0..128).map(|i| i as u8));
    let mut sample = [0u8; 32];
    put32(&mut sample, 4, 8);
    data.extend_from_slice(&sample);
    data.extend_from_slice(&[0, 20, 40, 60, 80, 60, 40, 20]);
    data
}

/// David Whittaker player stub: DMA setup, one sample, one note on voice 0.
pub fn dw_file() -> Vec<u8> {
    let mut data = vec![0u8; 0x60];
    put16(&mut data, 0, 0x6000);
    put16(&mut data, 2, 0x000E);
    for (i, w) in [0x33FC, 0x800F, 0x00DF, 0xF096].iter().enumerate() {
        put16(&mut data, 16 + i * 2, *w);
    }
    for (i, w) in [0x47FA, 0x0060 - 26, 0x7E00].iter().enumerate() {
        put16(&mut data, 24 + i * 2, *w);
    }
    for (i, w) in [0x45FA, 0x0040 - 32, 0x7003].iter().enumerate() {
        put16(&mut data, 30 + i * 2, *w);
    }
    for (i, w) in [6, 0x4C, 0x4A, 0x4A, 0x4A, 0xFFFF, 0x50, 0].iter().enumerate() {
        put16(&mut data, 0x40 + i * 2, *w);
    }
    data[0x50..0x54].copy_from_slice(&[0xA0, 13, 0x00, 0xFF]);
    data.extend_from_slice(&[0, 0, 0, 4, 0xFF, 0xFF, 0xFF, 0xFF, 0x1F, 0x40, 0, 64, 1, 2, 3, 4]);
    data
}

/// Every fixture with a filename its format accepts and the expected loader id.
pub fn all() -> Vec<(&'static str, Vec<u8>, &'static str)> {
    vec![
        ("tune.mod", mod_file(), "mod"),
        ("tune.sfx", sfx_file(), "sfx"),
        ("tune.c67", c67_file(100, 50), "c67"),
        ("tune.cba", cba_file(), "cba"),
        ("tune.rtm", rtm_file(), "rtm"),
        ("tune.okt", okt_file(), "okt"),
        ("tune.fc", fc_file(), "fc"),
        ("tune.bp", bp_file(), "bp"),
        ("tune.ahx", ahx_file(), "ahx"),
        ("tune.sid2", sid2_file(), "sid2"),
        ("tune.st", saw_file(), "saw"),
        ("tune.mid", midi_file(), "midi"),
        ("tune.dum", dum_file(), "dum"),
        ("rh.tune", rh_file(), "rh"),
        ("fred.tune", fred_file(), "fred"),
        ("tune.sm", sm_file(), "sm"),
        ("tune.ps", ps_file(), "ps"),
        ("tune.scr", scr_file(), "scr"),
        ("tune.hvl", hvl_file(), "hvl"),
        ("tune.hipc", coso_file(), "coso"),
        ("tune.sid1", sid1_file(), "sid1"),
        ("tune.dmu", dmu_file(), "dmu"),
        ("dw.tune", dw_file(), "dw"),
    ]
}

/// Shortest prefix of each fixture that still holds its fixed header.
///
/// For formats whose probe checks table offsets against the file size,
/// this runs up to the last table the probe looks at.
pub fn header_len(id: &str) -> usize {
    match id {
        "mod" => 1084,
        "sfx" => 660,
        "c67" => 2978,
        "cba" => 333,
        "rtm" => 42 + 130,
        "okt" => 16,
        "fc" => FC_SAMPLES,
        "bp" => 512,
        "ahx" => 14,
        "sid2" => 90,
        "saw" => 9,
        "midi" => 14,
        "dum" => 14,
        "rh" => 64,
        "fred" => 16,
        "sm" => 16,
        "ps" => 0x51,
        "scr" => 12,
        "hvl" => 16,
        "coso" => 50,
        "sid1" => SID1_BASE + 32,
        "dmu" => DMU_TABLES,
        "dw" => 32,
        other => panic!("no fixture for {other}"),
    }
}
