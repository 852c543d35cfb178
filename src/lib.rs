/// Heist engine: grid, perception, guard AI and the turn orchestrator.
///
/// The binary (`main.rs`) is one consumer; rendering, input and audio live
/// there and only read what the engine produces.

pub mod config;
pub mod domain;
pub mod sim;
