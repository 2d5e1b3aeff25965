pub mod cycle;
pub mod repo;
