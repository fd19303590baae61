pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod render;
pub mod scan;
pub mod sequencer;
pub mod tree;
pub mod tasks {
    pub mod files;
    pub mod loader;
    pub mod player;
    pub mod viewer;
}

pub use tasks::player::{Slideshow, spawn};
