pub mod assistant;
pub mod control;
pub mod health;
pub mod settings;
