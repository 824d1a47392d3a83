pub mod contract;
pub mod job;
pub mod status;
pub mod user;
