use crate::annotation::domain::frame_counts::FrameCounts;
use crate::annotation::domain::palette::{class_color, text_color, Rgb, GREEN};
use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

use super::label_font::LabelFont;

pub const DEFAULT_LINE_THICKNESS: u32 = 2;
pub const DEFAULT_FONT_SIZE: f32 = 18.0;

/// Vertical padding inside the label bar, split above and below the text.
const LABEL_PADDING: u32 = 10;

/// Left edge and baseline of the throughput readout.
const FPS_ORIGIN: (i64, i64) = (10, 30);

/// Draws detection boxes and labels onto frames in place.
///
/// Without a font the label bar is still drawn, sized from an estimate of
/// the text extent, so the overlay stays legible by color alone.
pub struct FrameAnnotator {
    font: Option<LabelFont>,
    font_size: f32,
    line_thickness: u32,
}

impl FrameAnnotator {
    pub fn new(font: Option<LabelFont>, font_size: f32, line_thickness: u32) -> Self {
        Self {
            font,
            font_size,
            line_thickness: line_thickness.max(1),
        }
    }

    /// Draw one box and label per detection; return the per-class tally.
    ///
    /// Unknown classes are drawn but not counted. Boxes are clipped to the
    /// frame; a box wholly outside it draws nothing.
    pub fn annotate(&self, frame: &mut Frame, detections: &[Detection]) -> FrameCounts {
        for det in detections {
            let Some((x1, y1, x2, y2)) = det.bbox.to_pixels(frame.width(), frame.height())
            else {
                log::trace!("Detection outside frame {}: {:?}", frame.index(), det.bbox);
                continue;
            };
            let color = class_color(det.class());
            self.draw_box(frame, x1 as i64, y1 as i64, x2 as i64, y2 as i64, color);
            self.draw_label(frame, &det.label(), x1 as i64, y1 as i64, color);
        }
        FrameCounts::tally(detections)
    }

    /// Stamp `FPS: <fps>` in green near the top-left corner.
    ///
    /// With no font the readout degrades to a green bar of the text's
    /// estimated extent sitting on the same baseline.
    pub fn draw_fps(&self, frame: &mut Frame, fps: u32) {
        let text = format!("FPS: {fps}");
        let (x, baseline) = FPS_ORIGIN;
        match &self.font {
            Some(font) => {
                let top = baseline - font.line_height() as i64;
                font.draw(frame, &text, x, top, GREEN);
            }
            None => {
                let (w, h) = self.estimate_extent(&text);
                fill_rect(frame, x, baseline - h as i64, x + w as i64, baseline - 1, GREEN);
            }
        }
    }

    fn estimate_extent(&self, text: &str) -> (u32, u32) {
        (
            (text.chars().count() as f32 * self.font_size * 0.55).ceil() as u32,
            self.font_size.ceil() as u32,
        )
    }

    fn draw_box(&self, frame: &mut Frame, x1: i64, y1: i64, x2: i64, y2: i64, color: Rgb) {
        let t = self.line_thickness as i64 - 1;
        fill_rect(frame, x1, y1, x2, y1 + t, color);
        fill_rect(frame, x1, y2 - t, x2, y2, color);
        fill_rect(frame, x1, y1, x1 + t, y2, color);
        fill_rect(frame, x2 - t, y1, x2, y2, color);
    }

    fn draw_label(&self, frame: &mut Frame, text: &str, x1: i64, y1: i64, color: Rgb) {
        let (text_w, text_h) = match &self.font {
            Some(font) => (font.text_width(text), font.line_height()),
            None => self.estimate_extent(text),
        };
        let bar_h = (text_h + LABEL_PADDING) as i64;

        // Above the box when it fits, otherwise tucked inside its top edge
        let top = if y1 >= bar_h { y1 - bar_h } else { y1 };
        fill_rect(frame, x1, top, x1 + text_w as i64, top + bar_h - 1, color);

        if let Some(font) = &self.font {
            let pad = (LABEL_PADDING / 2) as i64;
            font.draw(frame, text, x1, top + pad, text_color(color));
        }
    }
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self::new(
            LabelFont::discover(DEFAULT_FONT_SIZE),
            DEFAULT_FONT_SIZE,
            DEFAULT_LINE_THICKNESS,
        )
    }
}

/// Fill the inclusive rectangle `(x1, y1)..=(x2, y2)`, clipped to the frame.
fn fill_rect(frame: &mut Frame, x1: i64, y1: i64, x2: i64, y2: i64, color: Rgb) {
    let fw = frame.width() as i64;
    let fh = frame.height() as i64;
    let x1 = x1.max(0);
    let y1 = y1.max(0);
    let x2 = x2.min(fw - 1);
    let y2 = y2.min(fh - 1);
    if x1 > x2 || y1 > y2 {
        return;
    }

    let channels = frame.channels() as usize;
    let data = frame.data_mut();
    for y in y1..=y2 {
        for x in x1..=x2 {
            let offset = (y * fw + x) as usize * channels;
            for c in 0..channels.min(3) {
                data[offset + c] = color[c];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::domain::palette::{GREEN, RED, WHITE};
    use crate::detection::domain::detection::BoundingBox;

    fn make_frame(width: u32, height: u32) -> Frame {
        Frame::new(vec![0u8; (width * height * 3) as usize], width, height, 3, 0)
    }

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 3] {
        let i = ((y * frame.width() + x) * 3) as usize;
        let d = frame.data();
        [d[i], d[i + 1], d[i + 2]]
    }

    fn det(class_id: u32, x1: f64, y1: f64, x2: f64, y2: f64) -> Detection {
        Detection::new(class_id, 0.87, BoundingBox::new(x1, y1, x2, y2))
    }

    fn annotator() -> FrameAnnotator {
        FrameAnnotator::new(None, DEFAULT_FONT_SIZE, DEFAULT_LINE_THICKNESS)
    }

    #[test]
    fn test_zero_detections_leave_frame_untouched() {
        let mut frame = make_frame(64, 64);
        frame.data_mut().fill(77);
        let original = frame.data().to_vec();

        let counts = annotator().annotate(&mut frame, &[]);

        assert_eq!(counts, FrameCounts::default());
        assert_eq!(frame.data(), &original[..]);
    }

    #[test]
    fn test_fps_readout_drawn_top_left_only() {
        let mut frame = make_frame(160, 120);
        let annotator = FrameAnnotator::new(None, 12.0, DEFAULT_LINE_THICKNESS);

        let counts = annotator.annotate(&mut frame, &[]);
        assert!(frame.data().iter().all(|&v| v == 0));

        annotator.draw_fps(&mut frame, 25);
        assert_eq!(counts, FrameCounts::default());
        // Bar covers y in [18, 29], starting at x = 10
        assert_eq!(pixel(&frame, 12, 25), GREEN);
        assert_eq!(pixel(&frame, 9, 25), [0, 0, 0]);
        assert_eq!(pixel(&frame, 12, 30), [0, 0, 0]);
        assert_eq!(pixel(&frame, 150, 110), [0, 0, 0]);
    }

    #[test]
    fn test_box_edges_use_class_color() {
        let mut frame = make_frame(200, 200);
        let counts = annotator().annotate(
            &mut frame,
            &[det(0, 20.0, 60.0, 80.0, 120.0), det(1, 110.0, 60.0, 180.0, 150.0)],
        );

        assert_eq!(counts, FrameCounts::new(1, 1));
        assert_eq!(pixel(&frame, 20, 90), GREEN);
        assert_eq!(pixel(&frame, 21, 90), GREEN);
        assert_eq!(pixel(&frame, 50, 120), GREEN);
        assert_eq!(pixel(&frame, 180, 100), RED);
        // Interior untouched
        assert_eq!(pixel(&frame, 50, 90), [0, 0, 0]);
        assert_eq!(pixel(&frame, 140, 100), [0, 0, 0]);
    }

    #[test]
    fn test_label_bar_sits_above_box() {
        let mut frame = make_frame(200, 200);
        annotator().annotate(&mut frame, &[det(1, 50.0, 100.0, 150.0, 180.0)]);
        // Bar spans y in [100 - 28, 99]
        assert_eq!(pixel(&frame, 55, 80), RED);
        assert_eq!(pixel(&frame, 55, 60), [0, 0, 0]);
    }

    #[test]
    fn test_label_bar_moves_inside_when_box_touches_top() {
        let mut frame = make_frame(200, 200);
        annotator().annotate(&mut frame, &[det(0, 50.0, 0.0, 150.0, 100.0)]);
        assert_eq!(pixel(&frame, 60, 10), GREEN);
    }

    #[test]
    fn test_unknown_class_drawn_white_but_not_counted() {
        let mut frame = make_frame(100, 100);
        let counts = annotator().annotate(&mut frame, &[det(4, 40.0, 40.0, 90.0, 90.0)]);
        assert_eq!(counts, FrameCounts::default());
        assert_eq!(pixel(&frame, 40, 60), WHITE);
    }

    #[test]
    fn test_boxes_outside_frame_are_clipped() {
        let mut frame = make_frame(50, 50);
        let counts = annotator().annotate(
            &mut frame,
            &[
                det(1, -20.0, -20.0, 70.0, 70.0),
                det(0, 200.0, 200.0, 300.0, 300.0),
            ],
        );
        // Out-of-frame detections still count
        assert_eq!(counts, FrameCounts::new(1, 1));
        assert_eq!(pixel(&frame, 0, 25), RED);
        assert_eq!(pixel(&frame, 49, 25), RED);
    }

    #[test]
    fn test_thickness_controls_edge_width() {
        let mut frame = make_frame(100, 100);
        FrameAnnotator::new(None, DEFAULT_FONT_SIZE, 4)
            .annotate(&mut frame, &[det(0, 10.0, 50.0, 90.0, 95.0)]);
        assert_eq!(pixel(&frame, 13, 70), GREEN);
        assert_eq!(pixel(&frame, 14, 70), [0, 0, 0]);
    }
}
