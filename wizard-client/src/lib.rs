pub mod config;
pub mod generation;
pub mod providers;

pub use generation::{GenerationError, Wizard};
pub use providers::{connect, Generators, ImageGenerator, Prompt, Provider, TextGenerator};
