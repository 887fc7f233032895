// src/process/mod.rs

pub mod split;

pub use split::split_csv;
