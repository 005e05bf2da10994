pub mod common;
pub mod status;
pub mod submit;
pub mod worker;
