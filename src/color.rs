//! Pixel formats, packed color values and the 8-bit blenders used by the
//! inks. All blend math is integer-exact.

use serde::{Deserialize, Serialize};

/// A packed pixel value. Its layout depends on the [`PixelFormat`] of the
/// image it belongs to.
pub type ColorValue = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// `r | g<<8 | b<<16 | a<<24`
    Rgb,
    /// `v | a<<8`
    Grayscale,
    /// Palette index
    Indexed,
}

impl PixelFormat {
    /// Bytes needed to store one pixel in this format
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb => 4,
            PixelFormat::Grayscale => 2,
            PixelFormat::Indexed => 1,
        }
    }
}

pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> ColorValue {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

pub const fn rgba_getr(c: ColorValue) -> u8 {
    (c & 0xff) as u8
}

pub const fn rgba_getg(c: ColorValue) -> u8 {
    ((c >> 8) & 0xff) as u8
}

pub const fn rgba_getb(c: ColorValue) -> u8 {
    ((c >> 16) & 0xff) as u8
}

pub const fn rgba_geta(c: ColorValue) -> u8 {
    ((c >> 24) & 0xff) as u8
}

pub const fn graya(v: u8, a: u8) -> ColorValue {
    (v as u32) | ((a as u32) << 8)
}

pub const fn graya_getv(c: ColorValue) -> u8 {
    (c & 0xff) as u8
}

pub const fn graya_geta(c: ColorValue) -> u8 {
    ((c >> 8) & 0xff) as u8
}

pub const RGBA_RGB_MASK: u32 = 0x00ff_ffff;
pub const RGBA_A_MASK: u32 = 0xff00_0000;
pub const GRAYA_A_MASK: u32 = 0xff00;

/// `a*b/255` rounded, valid for negative `a`
#[inline]
pub fn mul_un8(a: i32, b: i32) -> i32 {
    let t = a * b + 0x80;
    ((t >> 8) + t) >> 8
}

fn pack_rgba(r: i32, g: i32, b: i32, a: i32) -> ColorValue {
    rgba(r as u8, g as u8, b as u8, a as u8)
}

/// Rec. 709 luma of an rgb triple, 0..=255
pub fn rgb_luma(r: u8, g: u8, b: u8) -> i32 {
    (r as i32 * 2126 + g as i32 * 7152 + b as i32 * 722) / 10000
}

pub fn rgba_luma(c: ColorValue) -> i32 {
    rgb_luma(rgba_getr(c), rgba_getg(c), rgba_getb(c))
}

/// Porter-Duff "source over backdrop" with the source alpha scaled by
/// `opacity`.
pub fn rgba_blender_normal(backdrop: ColorValue, src: ColorValue, opacity: i32) -> ColorValue {
    if backdrop & RGBA_A_MASK == 0 {
        let a = mul_un8(rgba_geta(src) as i32, opacity);
        return (src & RGBA_RGB_MASK) | ((a as u32) << 24);
    } else if src & RGBA_A_MASK == 0 {
        return backdrop;
    }

    let br = rgba_getr(backdrop) as i32;
    let bg = rgba_getg(backdrop) as i32;
    let bb = rgba_getb(backdrop) as i32;
    let ba = rgba_geta(backdrop) as i32;

    let sr = rgba_getr(src) as i32;
    let sg = rgba_getg(src) as i32;
    let sb = rgba_getb(src) as i32;
    let sa = mul_un8(rgba_geta(src) as i32, opacity);

    let ra = sa + ba - mul_un8(ba, sa);
    let rr = br + (sr - br) * sa / ra;
    let rg = bg + (sg - bg) * sa / ra;
    let rb = bb + (sb - bb) * sa / ra;

    pack_rgba(rr, rg, rb, ra)
}

/// Linear interpolation of every channel (alpha included) towards `src`.
/// Color channels come straight from the opaque side when the other one
/// is fully transparent.
pub fn rgba_blender_merge(backdrop: ColorValue, src: ColorValue, opacity: i32) -> ColorValue {
    let br = rgba_getr(backdrop) as i32;
    let bg = rgba_getg(backdrop) as i32;
    let bb = rgba_getb(backdrop) as i32;
    let ba = rgba_geta(backdrop) as i32;

    let sr = rgba_getr(src) as i32;
    let sg = rgba_getg(src) as i32;
    let sb = rgba_getb(src) as i32;
    let sa = rgba_geta(src) as i32;

    let (mut rr, mut rg, mut rb) = if ba == 0 {
        (sr, sg, sb)
    } else if sa == 0 {
        (br, bg, bb)
    } else {
        (
            br + mul_un8(sr - br, opacity),
            bg + mul_un8(sg - bg, opacity),
            bb + mul_un8(sb - bb, opacity),
        )
    };
    let ra = ba + mul_un8(sa - ba, opacity);
    if ra == 0 {
        rr = 0;
        rg = 0;
        rb = 0;
    }

    pack_rgba(rr, rg, rb, ra)
}

/// Black or white, whichever contrasts with the backdrop. Used for marquee
/// feedback.
pub fn rgba_blender_neg_bw(backdrop: ColorValue, _src: ColorValue, _opacity: i32) -> ColorValue {
    if backdrop & RGBA_A_MASK == 0 {
        rgba(0, 0, 0, 255)
    } else if rgba_luma(backdrop) < 128 {
        rgba(255, 255, 255, 255)
    } else {
        rgba(0, 0, 0, 255)
    }
}

pub fn graya_blender_normal(backdrop: ColorValue, src: ColorValue, opacity: i32) -> ColorValue {
    if backdrop & GRAYA_A_MASK == 0 {
        let a = mul_un8(graya_geta(src) as i32, opacity);
        return (src & 0xff) | ((a as u32) << 8);
    } else if src & GRAYA_A_MASK == 0 {
        return backdrop;
    }

    let bv = graya_getv(backdrop) as i32;
    let ba = graya_geta(backdrop) as i32;
    let sv = graya_getv(src) as i32;
    let sa = mul_un8(graya_geta(src) as i32, opacity);

    let ra = ba + sa - mul_un8(ba, sa);
    let rv = bv + (sv - bv) * sa / ra;

    graya(rv as u8, ra as u8)
}

pub fn graya_blender_merge(backdrop: ColorValue, src: ColorValue, opacity: i32) -> ColorValue {
    let bv = graya_getv(backdrop) as i32;
    let ba = graya_geta(backdrop) as i32;
    let sv = graya_getv(src) as i32;
    let sa = graya_geta(src) as i32;

    let mut rv = if ba == 0 {
        sv
    } else if sa == 0 {
        bv
    } else {
        bv + mul_un8(sv - bv, opacity)
    };
    let ra = ba + mul_un8(sa - ba, opacity);
    if ra == 0 {
        rv = 0;
    }

    graya(rv as u8, ra as u8)
}

pub fn graya_blender_neg_bw(backdrop: ColorValue, _src: ColorValue, _opacity: i32) -> ColorValue {
    if backdrop & GRAYA_A_MASK == 0 {
        graya(0, 255)
    } else if graya_getv(backdrop) < 128 {
        graya(255, 255)
    } else {
        graya(0, 255)
    }
}

/// Per-channel interpolation between two RGBA colors, `t` in 0..=255
pub fn rgba_lerp(a: ColorValue, b: ColorValue, t: i32) -> ColorValue {
    let mix = |ca: u8, cb: u8| (ca as i32 + mul_un8(cb as i32 - ca as i32, t)) as u8;
    rgba(
        mix(rgba_getr(a), rgba_getr(b)),
        mix(rgba_getg(a), rgba_getg(b)),
        mix(rgba_getb(a), rgba_getb(b)),
        mix(rgba_geta(a), rgba_geta(b)),
    )
}

pub fn graya_lerp(a: ColorValue, b: ColorValue, t: i32) -> ColorValue {
    let mix = |ca: u8, cb: u8| (ca as i32 + mul_un8(cb as i32 - ca as i32, t)) as u8;
    graya(
        mix(graya_getv(a), graya_getv(b)),
        mix(graya_geta(a), graya_geta(b)),
    )
}

/// Converts an RGBA value into an egui color for display
pub fn rgba_to_color32(c: ColorValue) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(rgba_getr(c), rgba_getg(c), rgba_getb(c), rgba_geta(c))
}
