use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

const VIDEO_STREAM_INDEX: usize = 0;

/// Writes annotated RGB frames into an MPEG-4 container.
///
/// Frames must match the dimensions given to `open`.
pub struct FfmpegWriter {
    output: Option<OpenOutput>,
    frame_count: usize,
}

struct OpenOutput {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: ffmpeg_next::software::scaling::Context,
    staging: ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
    fps: i32,
}

// Safety: the writer is owned by one thread at a time and never shares
// the ffmpeg contexts it holds.
unsafe impl Send for FfmpegWriter {}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self {
            output: None,
            frame_count: 0,
        }
    }

    pub fn frames_written(&self) -> usize {
        self.frame_count
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenOutput {
    fn create(path: &Path, metadata: &VideoMetadata) -> Result<Self, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let (width, height) = (metadata.width, metadata.height);
        let fps = metadata.integral_fps();

        let mut octx = ffmpeg_next::format::output(path)?;
        let needs_global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            .ok_or("MPEG4 encoder not found")?;
        let mut stream = octx.add_stream(Some(codec))?;

        let mut ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        ctx.set_width(width);
        ctx.set_height(height);
        ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if needs_global_header {
            ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = ctx.open_with(ffmpeg_next::Dictionary::new())?;
        stream.set_parameters(&encoder);
        octx.write_header()?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;
        let staging =
            ffmpeg_next::util::frame::video::Video::new(ffmpeg_next::format::Pixel::RGB24, width, height);

        Ok(Self {
            octx,
            encoder,
            scaler,
            staging,
            width,
            height,
            fps,
        })
    }

    fn push(&mut self, frame: &Frame, pts: i64) -> Result<(), Box<dyn std::error::Error>> {
        if (frame.width(), frame.height(), frame.channels()) != (self.width, self.height, 3) {
            return Err(format!(
                "expected {}x{} RGB frame, got {}x{}x{}",
                self.width,
                self.height,
                frame.width(),
                frame.height(),
                frame.channels()
            )
            .into());
        }

        copy_into_padded(&mut self.staging, frame.data(), self.width as usize * 3);

        let mut yuv = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&self.staging, &mut yuv)?;
        yuv.set_pts(Some(pts));

        self.encoder.send_frame(&yuv)?;
        self.drain()
    }

    fn finish(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.encoder.send_eof()?;
        self.drain()?;
        self.octx.write_trailer()?;
        Ok(())
    }

    fn drain(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let time_base = self
            .octx
            .stream(VIDEO_STREAM_INDEX)
            .ok_or("output stream missing")?
            .time_base();

        let mut packet = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(VIDEO_STREAM_INDEX);
            packet.rescale_ts(ffmpeg_next::Rational(1, self.fps), time_base);
            packet.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }
}

/// Copies tightly packed rows into an ffmpeg frame whose rows may be padded.
fn copy_into_padded(dst: &mut ffmpeg_next::util::frame::video::Video, src: &[u8], row_bytes: usize) {
    let stride = dst.stride(0);
    let data = dst.data_mut(0);
    for (row, chunk) in src.chunks_exact(row_bytes).enumerate() {
        let start = row * stride;
        data[start..start + row_bytes].copy_from_slice(chunk);
    }
}

impl VideoWriter for FfmpegWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.output = Some(OpenOutput::create(path, metadata)?);
        self.frame_count = 0;
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let output = self.output.as_mut().ok_or("writer is not open")?;
        output.push(frame, self.frame_count as i64)?;
        self.frame_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        match self.output.take() {
            Some(output) => output.finish(),
            None => Ok(()),
        }
    }
}
