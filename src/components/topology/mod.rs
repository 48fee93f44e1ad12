mod component;
mod render;
mod state;
pub mod storage;

pub use component::TopologyCanvas;
