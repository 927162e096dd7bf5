pub mod broadcast_hub;
pub mod domain;
