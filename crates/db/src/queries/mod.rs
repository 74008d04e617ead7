pub mod channels;
pub mod regions;
pub mod screens;
pub mod shared_channels;
pub mod slides;
