pub mod jpeg_frame_encoder;
