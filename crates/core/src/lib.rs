//! Face-mask detection over live or recorded video, with alerting and
//! fan-out of annotated frames to connected viewers.

pub mod alerting;
pub mod annotation;
pub mod broadcast;
pub mod capture;
pub mod config;
pub mod detection;
pub mod encoding;
pub mod pipeline;
pub mod shared;
pub mod video;
