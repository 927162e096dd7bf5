use crate::shared::constants::{MASK_CLASS_ID, NO_MASK_CLASS_ID};

/// Axis-aligned box in frame pixel coordinates, `(x1, y1)` top-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Intersection over union; 0.0 for disjoint or degenerate boxes.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Clamp to `[0, width) x [0, height)` and round to integer pixels.
    ///
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn to_pixels(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        if width == 0 || height == 0 {
            return None;
        }
        let max_x = (width - 1) as f64;
        let max_y = (height - 1) as f64;
        let x1 = self.x1.round().clamp(0.0, max_x);
        let y1 = self.y1.round().clamp(0.0, max_y);
        let x2 = self.x2.round().clamp(0.0, max_x);
        let y2 = self.y2.round().clamp(0.0, max_y);
        if x2 < x1 || y2 < y1 || self.x2 < 0.0 || self.y2 < 0.0 || self.x1 > max_x || self.y1 > max_y {
            return None;
        }
        Some((x1 as u32, y1 as u32, x2 as u32, y2 as u32))
    }
}

/// What the model believes it saw inside a box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaskClass {
    Mask,
    NoMask,
    Unknown(u32),
}

impl MaskClass {
    pub fn from_id(class_id: u32) -> Self {
        match class_id {
            MASK_CLASS_ID => MaskClass::Mask,
            NO_MASK_CLASS_ID => MaskClass::NoMask,
            other => MaskClass::Unknown(other),
        }
    }

    pub fn label(&self) -> String {
        match self {
            MaskClass::Mask => "Mask".to_string(),
            MaskClass::NoMask => "NoMask".to_string(),
            MaskClass::Unknown(id) => format!("Class {id}"),
        }
    }
}

/// One classified, localized object found in a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_id: u32, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
        }
    }

    pub fn class(&self) -> MaskClass {
        MaskClass::from_id(self.class_id)
    }

    /// Text drawn above the box, e.g. `"NoMask: 0.87"`.
    pub fn label(&self) -> String {
        format!("{}: {:.2}", self.class().label(), self.confidence)
    }
}
