pub mod config;
pub mod monitor;
pub mod process;
pub mod restart;
pub mod supervisor;
pub mod wake;
