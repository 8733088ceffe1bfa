//! Foundation layer: the value model and the pure operations over it.

pub mod catalog;
pub mod key;
pub mod merge;
pub mod value;
