use ndarray::ArrayView3;

/// A single video frame: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at I/O boundaries only; the annotator mutates
/// the buffer in place and the encoder reads it back out.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Wraps an `image` RGB buffer without copying.
    pub fn from_rgb_image(image: image::RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// True for an empty or all-zero buffer, which cameras emit while
    /// warming up or after a dropped read.
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    /// Copies the pixels into an `image` RGB buffer. `None` unless the
    /// frame has exactly three channels.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        if self.channels != 3 {
            return None;
        }
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Returns a copy scaled to `width` x `height` (aspect ratio not kept).
    pub fn resized(&self, width: u32, height: u32) -> Option<Frame> {
        if width == self.width && height == self.height {
            return Some(self.clone());
        }
        let img = self.to_rgb_image()?;
        let scaled =
            image::imageops::resize(&img, width, height, image::imageops::FilterType::Triangle);
        Some(Frame::from_rgb_image(scaled, self.index))
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
