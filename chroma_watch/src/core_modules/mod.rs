pub mod alarm;
pub mod classifier;
pub mod frame_aggregator;
pub mod pixel;
