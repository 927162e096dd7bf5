use crate::capture::domain::capture_source::{CaptureError, CaptureSource};
use crate::capture::domain::capture_target::CaptureTarget;
use crate::shared::constants::{DEFAULT_CAPTURE_HEIGHT, DEFAULT_CAPTURE_WIDTH};
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

#[cfg(target_os = "linux")]
const CAMERA_INPUT_FORMAT: &str = "v4l2";
#[cfg(target_os = "macos")]
const CAMERA_INPUT_FORMAT: &str = "avfoundation";

/// Resolution requested from cameras. Files keep their native size.
#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
        }
    }
}

/// Pulls decoded RGB frames from a camera or video file via ffmpeg-next.
pub struct FfmpegCapture {
    target: CaptureTarget,
    options: CaptureOptions,
    state: Option<OpenCapture>,
}

// Safety: FfmpegCapture is owned by a single streaming thread.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCapture {}

struct OpenCapture {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    metadata: VideoMetadata,
    frame_index: usize,
    draining: bool,
}

impl FfmpegCapture {
    pub fn new(target: CaptureTarget, options: CaptureOptions) -> Self {
        Self {
            target,
            options,
            state: None,
        }
    }

    /// Properties of the open stream, `None` while closed.
    pub fn metadata(&self) -> Option<&VideoMetadata> {
        self.state.as_ref().map(|s| &s.metadata)
    }

    fn open_input(&self) -> Result<ffmpeg_next::format::context::Input, CaptureError> {
        match &self.target {
            CaptureTarget::File { path } => ffmpeg_next::format::input(path)
                .map_err(|e| CaptureError::Unavailable(format!("{}: {e}", path.display()))),
            CaptureTarget::Camera { indices } => {
                for &index in indices {
                    match open_camera(index, &self.options) {
                        Ok(input) => {
                            log::info!("Camera opened at index {index}");
                            return Ok(input);
                        }
                        Err(e) => log::debug!("Camera index {index} unavailable: {e}"),
                    }
                }
                Err(CaptureError::Unavailable(format!(
                    "could not open any camera ({})",
                    self.target
                )))
            }
        }
    }
}

impl CaptureSource for FfmpegCapture {
    fn open(&mut self) -> Result<(), CaptureError> {
        if self.state.is_some() {
            return Ok(());
        }
        ffmpeg_next::init().map_err(|e| CaptureError::Unavailable(e.to_string()))?;

        let input = self.open_input()?;
        let source_path = match &self.target {
            CaptureTarget::File { path } => Some(path.clone()),
            CaptureTarget::Camera { .. } => None,
        };
        self.state = Some(OpenCapture::new(input, source_path)?);
        Ok(())
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        let state = self.state.as_mut().ok_or(CaptureError::NotOpen)?;
        state.next_frame()
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("Released capture source {}", self.target);
        }
    }

    fn is_open(&self) -> bool {
        self.state.is_some()
    }
}

impl OpenCapture {
    fn new(
        input: ffmpeg_next::format::context::Input,
        source_path: Option<std::path::PathBuf>,
    ) -> Result<Self, CaptureError> {
        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CaptureError::Unavailable("no video stream found".into()))?;

        let stream_index = stream.index();
        let total_frames = stream.frames().max(0) as usize;
        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| CaptureError::Unavailable(format!("decoder setup failed: {e}")))?;

        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| CaptureError::Unavailable(format!("scaler setup failed: {e}")))?;

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            metadata: VideoMetadata {
                width,
                height,
                fps,
                total_frames,
                source_path,
            },
            frame_index: 0,
            draining: false,
        })
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        loop {
            if let Some(frame) = self.try_receive()? {
                return Ok(frame);
            }
            if self.draining {
                return Err(CaptureError::EndOfStream);
            }

            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|e| CaptureError::Read(e.to_string()))?;
                }
                None => {
                    let _ = self.decoder.send_eof();
                    self.draining = true;
                }
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, CaptureError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .map_err(|e| CaptureError::Read(e.to_string()))?;

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn open_camera(
    index: u32,
    options: &CaptureOptions,
) -> Result<ffmpeg_next::format::context::Input, String> {
    ffmpeg_next::device::register_all();

    let format = ffmpeg_next::device::input::video()
        .find(|f| f.name() == CAMERA_INPUT_FORMAT)
        .ok_or_else(|| format!("{CAMERA_INPUT_FORMAT} input format not available"))?;

    let mut dict = ffmpeg_next::Dictionary::new();
    dict.set("video_size", &format!("{}x{}", options.width, options.height));
    // Keep at most one frame queued so reads return the latest image.
    dict.set("fflags", "nobuffer");

    let url = camera_url(index);
    match ffmpeg_next::format::open_with(&url, &ffmpeg_next::format::Format::Input(format), dict)
        .map_err(|e| format!("{url}: {e}"))?
    {
        ffmpeg_next::format::context::Context::Input(input) => Ok(input),
        ffmpeg_next::format::context::Context::Output(_) => {
            Err(format!("{url}: opened as output"))
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn open_camera(
    _index: u32,
    _options: &CaptureOptions,
) -> Result<ffmpeg_next::format::context::Input, String> {
    Err("camera capture is not supported on this platform; use a video file".into())
}

#[cfg(target_os = "linux")]
fn camera_url(index: u32) -> String {
    format!("/dev/video{index}")
}

#[cfg(target_os = "macos")]
fn camera_url(index: u32) -> String {
    index.to_string()
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping any per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
