pub mod app;
pub mod components;
pub mod tabs;
pub mod theme;
pub mod waveform_view;
