pub mod misc;
pub mod predicates;
pub mod signing;
