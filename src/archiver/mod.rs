pub mod collect;
pub mod config;
pub mod fanout;
pub mod orchestrator;

#[cfg(test)]
pub mod testing;
