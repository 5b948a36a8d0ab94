pub mod common;
pub mod poll;
pub mod vote;
