pub mod allocate;
pub mod classify;
pub mod config;
pub mod rank;
pub mod tick;
