pub mod controller;
pub mod format;
pub mod glyph;
pub mod links;
pub mod network;
pub mod notify;
pub mod power;
pub mod rate;
pub mod render;
pub mod sink;
pub mod slots;
