//! Tree comparison and command application

pub mod diff;
pub mod execute;

pub use diff::compare_trees;
pub use execute::apply_commands;
