pub mod backend;

pub use backend::{GaussSolver, LinearSystemBackend};
