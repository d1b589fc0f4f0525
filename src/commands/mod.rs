pub mod common;
pub mod group;

pub use group::{run_group, GroupArgs};
