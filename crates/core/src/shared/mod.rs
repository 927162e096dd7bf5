pub mod constants;
pub mod frame;
pub mod supervised_task;
pub mod video_metadata;
