pub mod poll;
pub mod results;
pub mod vote;
