pub mod alert_state_machine;
pub mod summary;
