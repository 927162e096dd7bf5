/// Mask/no-mask detector over an exported YOLOv8 ONNX model.
///
/// Handles letterbox preprocessing, inference, per-box class argmax and
/// class-aware NMS. Boxes are returned in the caller's frame coordinates.
use std::path::Path;

use crate::detection::domain::detection::{BoundingBox, Detection};
use crate::detection::domain::detector::Detector;
use crate::shared::frame::Frame;

use super::execution_provider::{preferred_execution_providers, Accelerator};

/// Fallback input resolution when the model has a dynamic input shape.
pub const DEFAULT_INPUT_SIZE: u32 = 640;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

const NMS_IOU_THRESH: f64 = 0.45;

/// Box geometry occupies the first four features of every prediction.
const BOX_FEATURES: usize = 4;

pub struct OnnxYoloDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load the model and prepare for inference.
    ///
    /// A static NCHW input shape in the model wins over `input_size`.
    pub fn new(
        model_path: &Path,
        input_size: u32,
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let static_size = session.inputs().first().and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                if shape.len() >= 4 && shape[2] > 0 {
                    return Some(shape[2] as u32);
                }
            }
            None
        });
        let input_size = match static_size {
            Some(size) if size != input_size => {
                log::info!("Model expects {size}px input, ignoring requested {input_size}px");
                size
            }
            Some(size) => size,
            None => input_size,
        };

        log::info!(
            "Loaded detector {} (input {input_size}px, confidence {confidence}, {})",
            model_path.display(),
            Accelerator::for_platform().name()
        );
        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }
}

impl Detector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }
        let (input_tensor, geometry) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let mut candidates = parse_predictions(data, &shape, self.confidence)?;
        for det in &mut candidates {
            det.bbox = geometry.unmap(&det.bbox, frame.width(), frame.height());
        }
        Ok(nms(candidates, NMS_IOU_THRESH))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
struct LetterboxGeometry {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl LetterboxGeometry {
    /// Map a box from letterbox space back to the source frame.
    fn unmap(&self, bbox: &BoundingBox, width: u32, height: u32) -> BoundingBox {
        let fx = |x: f64| ((x - self.pad_x as f64) / self.scale).clamp(0.0, width as f64);
        let fy = |y: f64| ((y - self.pad_y as f64) / self.scale).clamp(0.0, height as f64);
        BoundingBox::new(fx(bbox.x1), fy(bbox.y1), fx(bbox.x2), fy(bbox.y2))
    }
}

/// Letterbox-resize a frame to `target_size` x `target_size`, NCHW float32.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, LetterboxGeometry) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // YOLO pads with 114 gray
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let channels = (frame.channels() as usize).min(3);

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                // Grayscale frames replicate their single channel
                let sc = if channels == 3 { c } else { 0 };
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, sc]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        LetterboxGeometry {
            scale,
            pad_x,
            pad_y,
        },
    )
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// Decode raw YOLOv8 output into candidate detections (letterbox space).
///
/// Accepts `[1, 4 + classes, N]` (the exporter's default, transposed) or
/// `[1, N, 4 + classes]`. Each prediction is `cx, cy, w, h` followed by one
/// score per class; the best-scoring class wins.
fn parse_predictions(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    if shape.contains(&0) {
        return Ok(Vec::new());
    }
    let transposed = shape[1] < shape[2];
    let (num_preds, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats <= BOX_FEATURES {
        return Err(format!("YOLO output has no class scores: {shape:?}").into());
    }
    if data.len() < num_preds * num_feats {
        return Err(format!(
            "YOLO output holds {} values, shape {shape:?} needs {}",
            data.len(),
            num_preds * num_feats
        )
        .into());
    }

    let feature = |pred: usize, feat: usize| -> f32 {
        if transposed {
            data[feat * num_preds + pred]
        } else {
            data[pred * num_feats + feat]
        }
    };

    let mut dets = Vec::new();
    for i in 0..num_preds {
        let (class_id, score) = (BOX_FEATURES..num_feats)
            .map(|f| ((f - BOX_FEATURES) as u32, feature(i, f)))
            .fold((0u32, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        let score = score as f64;
        if score < confidence {
            continue;
        }

        let cx = feature(i, 0) as f64;
        let cy = feature(i, 1) as f64;
        let w = feature(i, 2) as f64;
        let h = feature(i, 3) as f64;
        dets.push(Detection::new(
            class_id,
            score,
            BoundingBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0),
        ));
    }
    Ok(dets)
}

/// Greedy class-aware NMS: boxes only suppress boxes of the same class.
fn nms(mut dets: Vec<Detection>, iou_thresh: f64) -> Vec<Detection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();
    for det in dets {
        let suppressed = keep
            .iter()
            .any(|k| k.class_id == det.class_id && k.bbox.iou(&det.bbox) > iou_thresh);
        if !suppressed {
            keep.push(det);
        }
    }
    keep
}
