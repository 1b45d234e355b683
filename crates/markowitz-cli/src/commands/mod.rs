pub mod allocate;
pub mod optimize;
pub mod stats;
