pub mod config;
pub mod hyperstack;
pub mod neighborhood;
pub mod reducer;
pub mod scheduler;
pub mod volume;
pub mod volume_filter;
