use log::{debug, warn};
use uuid::Uuid;

use crate::document::Document;
use crate::geometry::{Rect, Region};
use crate::image::Image;
use crate::layer::LayerId;
use crate::selection::Mask;

/// Pixels of an image layer before and after a gesture
#[derive(Debug, Clone, PartialEq)]
pub struct CelPatch {
    pub bounds: Rect,
    pub before: Image,
    pub after: Image,
}

/// One edited tile of a tilemap layer
#[derive(Debug, Clone, PartialEq)]
pub struct TilePatch {
    pub index: u32,
    pub before: Image,
    pub after: Image,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaskPatch {
    pub before: Mask,
    pub after: Mask,
}

/// Everything one gesture changed, applied and reverted as a unit
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub label: String,
    pub layer: LayerId,
    pub cel: Option<CelPatch>,
    pub tiles: Vec<TilePatch>,
    pub mask: Option<MaskPatch>,
    /// New slice added by the slice tool
    pub slice: Option<Rect>,
    /// Canvas area to redraw when the transaction is applied or reverted
    pub dirty: Region,
}

impl Transaction {
    pub fn new(id: Uuid, label: &str, layer: LayerId) -> Self {
        Self {
            id,
            label: label.to_string(),
            layer,
            cel: None,
            tiles: Vec::new(),
            mask: None,
            slice: None,
            dirty: Region::new(),
        }
    }

    /// Whether applying the transaction would change nothing
    pub fn is_empty(&self) -> bool {
        self.cel.is_none() && self.tiles.is_empty() && self.mask.is_none() && self.slice.is_none()
    }

    pub fn apply(&self, doc: &mut Document) {
        debug!("Applying '{}' ({})", self.label, self.id);
        self.write(doc, false);
    }

    pub fn revert(&self, doc: &mut Document) {
        debug!("Reverting '{}' ({})", self.label, self.id);
        self.write(doc, true);
    }

    fn write(&self, doc: &mut Document, undo: bool) {
        if let Some(mask) = &self.mask {
            doc.set_mask(if undo { mask.before.clone() } else { mask.after.clone() });
        }
        if let Some(rect) = self.slice {
            if undo {
                doc.remove_slice(rect);
            } else {
                doc.add_slice(rect);
            }
        }
        if self.cel.is_none() && self.tiles.is_empty() {
            return;
        }

        let Some(layer) = doc.layer_mut(self.layer) else {
            warn!("Layer {} of '{}' doesn't exist anymore", self.layer, self.label);
            return;
        };
        if let Some(cel) = &self.cel {
            let pixels = if undo { &cel.before } else { &cel.after };
            if let Some(image) = layer.image_mut() {
                image.copy_from(pixels, cel.bounds.x, cel.bounds.y, pixels.bounds());
            }
        }
        if let Some(tilemap) = layer.tilemap_mut() {
            for patch in &self.tiles {
                let pixels = if undo { &patch.before } else { &patch.after };
                tilemap.set_tile_image(patch.index, pixels.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PixelFormat;

    #[test]
    fn test_apply_and_revert_cel() {
        let mut doc = Document::new(PixelFormat::Indexed, 8, 8);
        let layer = doc.add_layer("Layer 1").unwrap();
        let before = doc.layer(layer).unwrap().image().unwrap().clone();

        let bounds = Rect::new(2, 3, 5, 1);
        let mut tx = Transaction::new(Uuid::new_v4(), "pencil", layer);
        assert!(tx.is_empty());
        tx.cel = Some(CelPatch {
            bounds,
            before: before.crop(bounds, 0).unwrap(),
            after: Image::from_pixels(PixelFormat::Indexed, 5, 1, vec![1; 5]),
        });
        assert!(!tx.is_empty());

        tx.apply(&mut doc);
        let image = doc.layer(layer).unwrap().image().unwrap();
        assert_eq!(image.get_pixel(2, 3), 1);
        assert_eq!(image.get_pixel(6, 3), 1);
        assert_eq!(image.get_pixel(7, 3), 0);

        tx.revert(&mut doc);
        assert_eq!(doc.layer(layer).unwrap().image().unwrap(), &before);
    }

    #[test]
    fn test_mask_and_slice() {
        let mut doc = Document::new(PixelFormat::Rgb, 8, 8);
        let layer = doc.add_layer("Layer 1").unwrap();
        let mut tx = Transaction::new(Uuid::new_v4(), "marquee", layer);
        tx.mask = Some(MaskPatch {
            before: Mask::new(),
            after: Mask::from_rect(Rect::new(1, 1, 3, 3)),
        });
        tx.slice = Some(Rect::new(0, 0, 2, 2));

        tx.apply(&mut doc);
        assert_eq!(doc.mask().selected_count(), 9);
        assert_eq!(doc.slices(), &[Rect::new(0, 0, 2, 2)]);

        tx.revert(&mut doc);
        assert!(doc.mask().is_empty());
        assert!(doc.slices().is_empty());
    }
}
