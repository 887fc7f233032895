// src/lib.rs

pub mod config;
pub mod fetch;
pub mod history;
pub mod load;
pub mod periods;
pub mod pipeline;
pub mod process;
pub mod registry;
pub mod workspace;
