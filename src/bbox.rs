use crate::config::Anchor;
use crate::PrecisionType;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in screen space, `(x, y)` being the top-left corner.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: PrecisionType,
    pub y: PrecisionType,
    pub width: PrecisionType,
    pub height: PrecisionType,
}

impl BBox {
    pub fn new(
        x: PrecisionType,
        y: PrecisionType,
        width: PrecisionType,
        height: PrecisionType,
    ) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box of the given size whose centre is `(cx, cy)`.
    pub fn from_center(
        cx: PrecisionType,
        cy: PrecisionType,
        width: PrecisionType,
        height: PrecisionType,
    ) -> Self {
        Self::new(cx - width / 2., cy - height / 2., width, height)
    }

    pub fn center(&self) -> (PrecisionType, PrecisionType) {
        (self.x + self.width / 2., self.y + self.height / 2.)
    }

    /// Observation `[u, v, w, h]` where `(u, v)` is the tracked anchor point.
    pub fn convert_to_z(
        &self,
        anchor: Anchor,
    ) -> (PrecisionType, PrecisionType, PrecisionType, PrecisionType) {
        let (u, v) = match anchor {
            Anchor::Center => self.center(),
            Anchor::TopLeft => (self.x, self.y),
        };
        (u, v, self.width, self.height)
    }

    /// Build BBox from `&[u, v, vu, vv, w, h]`
    pub fn from_x(x: &[PrecisionType], anchor: Anchor) -> Self {
        let (u, v, width, height) = (x[0], x[1], x[4], x[5]);
        match anchor {
            Anchor::Center => Self::from_center(u, v, width, height),
            Anchor::TopLeft => Self::new(u, v, width, height),
        }
    }
}
