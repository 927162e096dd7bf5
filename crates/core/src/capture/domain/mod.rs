pub mod capture_demand;
pub mod capture_source;
pub mod capture_target;
