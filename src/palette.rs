use serde::{Deserialize, Serialize};

use crate::color::{rgba, rgba_geta, rgba_getb, rgba_getg, rgba_getr, ColorValue};

/// Indexed color table. Entries are packed RGBA values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    entries: Vec<ColorValue>,
}

impl Default for Palette {
    fn default() -> Self {
        Self::grayscale_ramp(256)
    }
}

impl Palette {
    pub fn new(entries: Vec<ColorValue>) -> Self {
        Self { entries }
    }

    /// `n` opaque grays from black to white
    pub fn grayscale_ramp(n: usize) -> Self {
        let n = n.clamp(1, 256);
        let entries = (0..n)
            .map(|i| {
                let v = if n == 1 { 0 } else { (i * 255 / (n - 1)) as u8 };
                rgba(v, v, v, 255)
            })
            .collect();
        Self { entries }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[ColorValue] {
        &self.entries
    }

    /// Color of entry `i`, transparent black for out-of-range indexes
    pub fn entry(&self, i: usize) -> ColorValue {
        self.entries.get(i).copied().unwrap_or(0)
    }

    pub fn set_entry(&mut self, i: usize, color: ColorValue) {
        if i >= self.entries.len() {
            self.entries.resize(i + 1, rgba(0, 0, 0, 255));
        }
        self.entries[i] = color;
    }

    /// First index holding exactly `color`, skipping `mask_index`
    pub fn find_exact_match(&self, color: ColorValue, mask_index: Option<usize>) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .find(|(i, c)| Some(*i) != mask_index && **c == color)
            .map(|(i, _)| i)
    }

    /// Nearest entry by squared RGBA distance, skipping `mask_index`
    pub fn find_bestfit(&self, r: u8, g: u8, b: u8, a: u8, mask_index: Option<usize>) -> usize {
        let mut best = 0;
        let mut best_dist = i64::MAX;
        for (i, &c) in self.entries.iter().enumerate() {
            if Some(i) == mask_index {
                continue;
            }
            let dr = rgba_getr(c) as i64 - r as i64;
            let dg = rgba_getg(c) as i64 - g as i64;
            let db = rgba_getb(c) as i64 - b as i64;
            let da = rgba_geta(c) as i64 - a as i64;
            let dist = dr * dr * 3 + dg * dg * 4 + db * db * 2 + da * da;
            if dist < best_dist {
                best = i;
                best_dist = dist;
                if dist == 0 {
                    break;
                }
            }
        }
        best
    }
}

/// Maps RGBA colors back to palette indexes. Fully transparent colors map
/// to the mask index.
#[derive(Debug, Clone)]
pub struct RgbMap {
    palette: Palette,
    mask_index: Option<usize>,
}

impl RgbMap {
    pub fn new(palette: Palette, mask_index: Option<usize>) -> Self {
        Self { palette, mask_index }
    }

    pub fn map_color(&self, c: ColorValue) -> ColorValue {
        let a = rgba_geta(c);
        if a == 0 {
            if let Some(mask) = self.mask_index {
                return mask as ColorValue;
            }
        }
        self.palette
            .find_bestfit(rgba_getr(c), rgba_getg(c), rgba_getb(c), a, self.mask_index)
            as ColorValue
    }
}

/// Index-to-index table used by the shading ink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remap {
    map: Vec<u8>,
}

impl Remap {
    pub fn identity(n: usize) -> Self {
        Self {
            map: (0..n.min(256)).map(|i| i as u8).collect(),
        }
    }

    /// Shading ramp: each color of `ramp` maps to its neighbour in the
    /// `step` direction, the ends stay put.
    pub fn from_ramp(ramp: &[u8], step: i32) -> Self {
        let mut remap = Self::identity(256);
        let last = ramp.len() as i32 - 1;
        for (i, &idx) in ramp.iter().enumerate() {
            let j = (i as i32 + step).clamp(0, last.max(0));
            remap.map[idx as usize] = ramp[j as usize];
        }
        remap
    }

    pub fn map(&self, i: ColorValue) -> ColorValue {
        self.map.get(i as usize).map(|&v| v as ColorValue).unwrap_or(i)
    }

    pub fn set(&mut self, from: u8, to: u8) {
        if let Some(v) = self.map.get_mut(from as usize) {
            *v = to;
        }
    }
}
