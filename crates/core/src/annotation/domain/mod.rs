pub mod frame_counts;
pub mod palette;
