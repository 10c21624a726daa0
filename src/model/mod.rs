pub mod attendance;
pub mod employee;
pub mod role;
pub mod shift_policy;
