// A TrueType font assembled in memory: `.notdef`, space, a triangular 'A'
// and an 'O' with a hole. 1000 units per em, no hinting instructions.

#![allow(dead_code)]

use ipanema::{FaceId, FontBlob, FontContext, RasterConfig};

pub const UNITS_PER_EM: u16 = 1000;
pub const GLYPH_SPACE: u32 = 1;
pub const GLYPH_A: u32 = 2;
pub const GLYPH_O: u32 = 3;

/// Advance widths in font units, by glyph id.
pub const ADVANCES: [u16; 4] = [500, 250, 600, 700];

pub const FAMILY: &str = "Ipanema Test";
pub const POSTSCRIPT_NAME: &str = "IpanemaTest-Regular";

struct Writer(Vec<u8>);

impl Writer {
    fn new() -> Self {
        Writer(Vec::new())
    }

    fn u16(&mut self, v: u16) -> &mut Self {
        self.0.extend_from_slice(&v.to_be_bytes());
        self
    }

    fn i16(&mut self, v: i16) -> &mut Self {
        self.0.extend_from_slice(&v.to_be_bytes());
        self
    }

    fn u32(&mut self, v: u32) -> &mut Self {
        self.0.extend_from_slice(&v.to_be_bytes());
        self
    }

    fn zeros(&mut self, n: usize) -> &mut Self {
        self.0.resize(self.0.len() + n, 0);
        self
    }

    fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.0.extend_from_slice(b);
        self
    }

    fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.0)
    }
}

fn head() -> Vec<u8> {
    Writer::new()
        .u32(0x0001_0000)
        .u32(0x0001_0000)
        .u32(0)
        .u32(0x5F0F_3CF5)
        .u16(0x0003)
        .u16(UNITS_PER_EM)
        .zeros(16)
        .i16(50)
        .i16(0)
        .i16(600)
        .i16(700)
        .u16(0)
        .u16(8)
        .i16(2)
        // Short loca offsets.
        .i16(0)
        .i16(0)
        .finish()
}

fn hhea() -> Vec<u8> {
    Writer::new()
        .u32(0x0001_0000)
        .i16(800)
        .i16(-200)
        .i16(0)
        .u16(700)
        .i16(0)
        .i16(50)
        .i16(600)
        .i16(1)
        .i16(0)
        .i16(0)
        .zeros(8)
        .i16(0)
        .u16(ADVANCES.len() as u16)
        .finish()
}

fn maxp() -> Vec<u8> {
    Writer::new()
        .u32(0x0001_0000)
        .u16(ADVANCES.len() as u16)
        .u16(8)
        .u16(2)
        .u16(0)
        .u16(0)
        .u16(2)
        .zeros(16)
        .finish()
}

fn hmtx() -> Vec<u8> {
    let lsb = [0i16, 0, 50, 100];
    let mut w = Writer::new();
    for (advance, lsb) in ADVANCES.iter().zip(lsb) {
        w.u16(*advance).i16(lsb);
    }
    w.finish()
}

/// A simple glyph from absolute on-curve points, one slice per contour.
fn simple_glyph(contours: &[&[(i16, i16)]]) -> Vec<u8> {
    let points: Vec<(i16, i16)> = contours.iter().flat_map(|c| c.iter().copied()).collect();
    let x_min = points.iter().map(|p| p.0).min().unwrap_or(0);
    let x_max = points.iter().map(|p| p.0).max().unwrap_or(0);
    let y_min = points.iter().map(|p| p.1).min().unwrap_or(0);
    let y_max = points.iter().map(|p| p.1).max().unwrap_or(0);

    let mut w = Writer::new();
    w.i16(contours.len() as i16)
        .i16(x_min)
        .i16(y_min)
        .i16(x_max)
        .i16(y_max);
    let mut end = 0u16;
    for contour in contours {
        end += contour.len() as u16;
        w.u16(end - 1);
    }
    w.u16(0);
    for _ in &points {
        // On curve, both coordinates as 16-bit deltas.
        w.bytes(&[0x01]);
    }
    let mut prev = 0i16;
    for p in &points {
        w.i16(p.0 - prev);
        prev = p.0;
    }
    prev = 0;
    for p in &points {
        w.i16(p.1 - prev);
        prev = p.1;
    }
    let mut data = w.finish();
    if data.len() % 2 == 1 {
        data.push(0);
    }
    data
}

fn glyf_and_loca() -> (Vec<u8>, Vec<u8>) {
    let a = simple_glyph(&[&[(50, 0), (300, 700), (550, 0)]]);
    let o = simple_glyph(&[
        &[(100, 0), (100, 700), (600, 700), (600, 0)],
        &[(200, 100), (500, 100), (500, 600), (200, 600)],
    ]);
    let glyphs: [&[u8]; 4] = [&[], &[], &a, &o];

    let mut glyf = Vec::new();
    let mut loca = Writer::new();
    for glyph in glyphs {
        loca.u16((glyf.len() / 2) as u16);
        glyf.extend_from_slice(glyph);
    }
    loca.u16((glyf.len() / 2) as u16);
    (glyf, loca.finish())
}

fn cmap() -> Vec<u8> {
    let ranges: [(u16, u16); 4] = [(0x20, 1), (0x41, 2), (0x4F, 3), (0xFFFF, 0)];
    let seg_count = ranges.len() as u16;
    let mut w = Writer::new();
    w.u16(0).u16(1).u16(3).u16(1).u32(12);
    w.u16(4)
        .u16(16 + seg_count * 8)
        .u16(0)
        .u16(seg_count * 2)
        .u16(8)
        .u16(2)
        .u16(0);
    for (code, _) in ranges {
        w.u16(code);
    }
    w.u16(0);
    for (code, _) in ranges {
        w.u16(code);
    }
    for (code, glyph) in ranges {
        let delta = if code == 0xFFFF {
            1
        } else {
            glyph.wrapping_sub(code)
        };
        w.u16(delta);
    }
    w.zeros(ranges.len() * 2);
    w.finish()
}

fn os2() -> Vec<u8> {
    Writer::new()
        .u16(4)
        .i16(500)
        .u16(400)
        .u16(5)
        .u16(0)
        .zeros(16)
        .i16(50)
        .i16(300)
        .i16(0)
        .zeros(10)
        .zeros(16)
        .bytes(b"IPNM")
        .u16(0x0040)
        .u16(0x20)
        .u16(0x4F)
        .i16(800)
        .i16(-200)
        .i16(0)
        .u16(800)
        .u16(200)
        .zeros(8)
        .i16(500)
        .i16(700)
        .u16(0)
        .u16(0x20)
        .u16(1)
        .finish()
}

fn name() -> Vec<u8> {
    let records = [(1u16, FAMILY), (2, "Regular"), (6, POSTSCRIPT_NAME)];
    let encoded: Vec<Vec<u8>> = records
        .iter()
        .map(|(_, s)| s.encode_utf16().flat_map(|u| u.to_be_bytes()).collect())
        .collect();

    let mut w = Writer::new();
    w.u16(0)
        .u16(records.len() as u16)
        .u16(6 + 12 * records.len() as u16);
    let mut offset = 0u16;
    for ((id, _), data) in records.iter().zip(&encoded) {
        w.u16(3).u16(1).u16(0x0409).u16(*id).u16(data.len() as u16).u16(offset);
        offset += data.len() as u16;
    }
    for data in &encoded {
        w.bytes(data);
    }
    w.finish()
}

fn post() -> Vec<u8> {
    Writer::new()
        .u32(0x0003_0000)
        .u32(0)
        .i16(-100)
        .i16(50)
        .u32(0)
        .zeros(16)
        .finish()
}

fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// The font file.
pub fn font_data() -> Vec<u8> {
    let (glyf, loca) = glyf_and_loca();
    // Sorted by tag.
    let tables: [(&[u8; 4], Vec<u8>); 10] = [
        (b"OS/2", os2()),
        (b"cmap", cmap()),
        (b"glyf", glyf),
        (b"head", head()),
        (b"hhea", hhea()),
        (b"hmtx", hmtx()),
        (b"loca", loca),
        (b"maxp", maxp()),
        (b"name", name()),
        (b"post", post()),
    ];

    let mut w = Writer::new();
    w.u32(0x0001_0000)
        .u16(tables.len() as u16)
        .u16(128)
        .u16(3)
        .u16(tables.len() as u16 * 16 - 128);

    let mut offset = 12 + 16 * tables.len();
    for (tag, data) in &tables {
        w.bytes(&tag[..])
            .u32(checksum(data))
            .u32(offset as u32)
            .u32(data.len() as u32);
        offset += (data.len() + 3) & !3;
    }
    for (_, data) in &tables {
        w.bytes(data);
        let padded = (data.len() + 3) & !3;
        w.zeros(padded - data.len());
    }
    w.finish()
}

pub fn face_id() -> FaceId {
    FaceId::memory(FontBlob::new(font_data()), 0)
}

pub fn context() -> FontContext {
    FontContext::new(RasterConfig::default())
}

pub fn context_with(config: RasterConfig) -> FontContext {
    FontContext::new(config)
}
