pub mod align;
pub mod circles;
pub mod fiducials;
pub mod localize;
pub mod verifier;

use crate::Corner;

/// Detected marker centres keyed by logical corner. At most one marker per
/// corner; insertion order for downstream consumers is TL, TR, BL, BR.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarkerSet {
    pub top_left: Option<(f32, f32)>,
    pub top_right: Option<(f32, f32)>,
    pub bottom_left: Option<(f32, f32)>,
    pub bottom_right: Option<(f32, f32)>,
}

impl MarkerSet {
    pub fn get(&self, corner: Corner) -> Option<(f32, f32)> {
        match corner {
            Corner::TopLeft => self.top_left,
            Corner::TopRight => self.top_right,
            Corner::BottomLeft => self.bottom_left,
            Corner::BottomRight => self.bottom_right,
        }
    }

    pub fn is_free(&self, corner: Corner) -> bool {
        self.get(corner).is_none()
    }

    /// Assigns a centre to a corner; a corner that already holds a marker
    /// keeps its first assignment.
    pub fn assign(&mut self, corner: Corner, centre: (f32, f32)) -> bool {
        let slot = match corner {
            Corner::TopLeft => &mut self.top_left,
            Corner::TopRight => &mut self.top_right,
            Corner::BottomLeft => &mut self.bottom_left,
            Corner::BottomRight => &mut self.bottom_right,
        };
        if slot.is_none() {
            *slot = Some(centre);
            true
        } else {
            false
        }
    }

    pub fn count(&self) -> u32 {
        Corner::ALL
            .iter()
            .filter(|&&c| self.get(c).is_some())
            .count() as u32
    }

    /// Corners with their centres in TL, TR, BL, BR order.
    pub fn in_order(&self) -> [(Corner, Option<(f32, f32)>); 4] {
        Corner::ALL.map(|c| (c, self.get(c)))
    }
}
