//! TrueType label rendering over `ab_glyph`.

use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use thiserror::Error;

use crate::annotation::domain::palette::Rgb;
use crate::shared::frame::Frame;

/// Fonts tried by [`LabelFont::discover`], in order.
const WELL_KNOWN_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum FontError {
    #[error("failed to read font {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid font data in {path}")]
    Invalid { path: PathBuf },
}

pub struct LabelFont {
    font: FontVec,
    scale: PxScale,
}

impl LabelFont {
    pub fn load(path: &Path, size: f32) -> Result<Self, FontError> {
        let bytes = std::fs::read(path).map_err(|source| FontError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let font = FontVec::try_from_vec(bytes).map_err(|_| FontError::Invalid {
            path: path.to_path_buf(),
        })?;
        Ok(Self {
            font,
            scale: PxScale::from(size),
        })
    }

    /// First well-known system font that loads, if any.
    pub fn discover(size: f32) -> Option<Self> {
        WELL_KNOWN_FONTS.iter().find_map(|candidate| {
            let path = Path::new(candidate);
            if !path.exists() {
                return None;
            }
            match Self::load(path, size) {
                Ok(font) => {
                    log::debug!("Using label font {}", path.display());
                    Some(font)
                }
                Err(e) => {
                    log::debug!("Skipping font: {e}");
                    None
                }
            }
        })
    }

    /// Pixel height of one line of text.
    pub fn line_height(&self) -> u32 {
        self.font.as_scaled(self.scale).height().ceil().max(1.0) as u32
    }

    /// Horizontal extent of `text` in pixels.
    pub fn text_width(&self, text: &str) -> u32 {
        let scaled = self.font.as_scaled(self.scale);
        let mut width = 0.0f32;
        let mut prev = None;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(p) = prev {
                width += scaled.kern(p, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width.ceil().max(0.0) as u32
    }

    /// Alpha-blend `text` into the frame with its line box's top-left at `(x, y)`.
    /// Pixels falling outside the frame are dropped.
    pub fn draw(&self, frame: &mut Frame, text: &str, x: i64, y: i64, color: Rgb) {
        let fw = frame.width() as i64;
        let fh = frame.height() as i64;
        let channels = frame.channels() as usize;
        let data = frame.data_mut();

        let scaled = self.font.as_scaled(self.scale);
        let ascent = scaled.ascent();
        let mut caret = 0.0f32;
        let mut prev = None;

        for ch in text.chars() {
            let mut glyph = scaled.scaled_glyph(ch);
            if let Some(p) = prev {
                caret += scaled.kern(p, glyph.id);
            }
            glyph.position = point(caret, ascent);
            caret += scaled.h_advance(glyph.id);
            prev = Some(glyph.id);

            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = x + bounds.min.x as i64 + gx as i64;
                let py = y + bounds.min.y as i64 + gy as i64;
                if px < 0 || py < 0 || px >= fw || py >= fh {
                    return;
                }
                let offset = (py * fw + px) as usize * channels;
                let alpha = coverage.clamp(0.0, 1.0);
                for c in 0..channels.min(3) {
                    let dst = data[offset + c] as f32;
                    let src = color[c] as f32;
                    data[offset + c] = (dst + (src - dst) * alpha).round() as u8;
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file() {
        let err = LabelFont::load(Path::new("/nonexistent/font.ttf"), 18.0)
            .err()
            .unwrap();
        assert!(matches!(err, FontError::Read { .. }));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("font.ttf");
        std::fs::write(&path, b"definitely not a font").unwrap();
        let err = LabelFont::load(&path, 18.0).err().unwrap();
        assert!(matches!(err, FontError::Invalid { .. }));
    }

    fn system_font() -> LabelFont {
        LabelFont::discover(18.0).expect("no well-known system font installed")
    }

    #[test]
    #[ignore = "needs a well-known system TrueType font"]
    fn test_discovered_font_renders_text() {
        let font = system_font();
        assert!(font.line_height() >= 18);
        assert!(font.text_width("NoMask: 0.87") > font.text_width("Mask"));

        let mut frame = Frame::new(vec![0u8; 200 * 40 * 3], 200, 40, 3, 0);
        font.draw(&mut frame, "Mask", 2, 2, [255, 255, 255]);
        assert!(frame.data().iter().any(|&v| v > 0));
    }

    #[test]
    #[ignore = "needs a well-known system TrueType font"]
    fn test_draw_clips_outside_frame() {
        let font = system_font();
        let mut frame = Frame::new(vec![0u8; 10 * 10 * 3], 10, 10, 3, 0);
        font.draw(&mut frame, "NoMask", -50, -50, [255, 255, 255]);
        font.draw(&mut frame, "NoMask", 500, 500, [255, 255, 255]);
        assert!(frame.data().iter().all(|&v| v == 0));
    }
}
