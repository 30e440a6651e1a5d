// Domain layer - Core models and pure algorithms
pub mod link;
pub mod peaks;
pub mod period;
pub mod sample;
