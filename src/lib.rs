pub mod config;
pub mod constants;
pub mod error;
pub mod game;
pub mod network;
pub mod protocol;
pub mod stimuli;
