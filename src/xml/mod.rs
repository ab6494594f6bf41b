pub mod capturer;
pub mod dom;
pub mod repair;
