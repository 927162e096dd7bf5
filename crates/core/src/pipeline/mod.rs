pub mod annotate_video_use_case;
pub mod frame_decimator;
pub mod pipeline_logger;
pub mod streaming_loop;
