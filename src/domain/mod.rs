pub mod assistant;
pub mod models;
pub mod settings;
pub mod waveform;
