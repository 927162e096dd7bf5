use crate::detection::domain::detection::MaskClass;

/// RGB triple.
pub type Rgb = [u8; 3];

pub const GREEN: Rgb = [0, 255, 0];
pub const RED: Rgb = [255, 0, 0];
pub const WHITE: Rgb = [255, 255, 255];

/// Box and label-bar color for a class.
pub fn class_color(class: MaskClass) -> Rgb {
    match class {
        MaskClass::Mask => GREEN,
        MaskClass::NoMask => RED,
        MaskClass::Unknown(_) => WHITE,
    }
}

/// Label text color that stays readable on `background`.
pub fn text_color(background: Rgb) -> Rgb {
    let luma = 0.299 * background[0] as f32
        + 0.587 * background[1] as f32
        + 0.114 * background[2] as f32;
    if luma > 160.0 {
        [0, 0, 0]
    } else {
        WHITE
    }
}
