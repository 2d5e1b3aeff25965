pub mod engine;
pub mod git_ops;
pub mod scanner;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;
