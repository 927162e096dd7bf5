pub mod frame_encoder;
