pub mod commands;
pub mod constants;
pub mod discovery;
pub mod manager;
pub mod task;
pub mod transport;
pub mod types;

#[cfg(test)]
pub mod testing;
