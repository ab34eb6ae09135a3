// Intvboot Transform Module
// Runtime input path: chord coalescing and register routing

pub mod combo;
pub mod engine;

pub use combo::{ChordEvent, ChordEvents, ComboEngine};
pub use engine::InputRouter;
