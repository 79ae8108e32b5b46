pub mod app;
pub mod artwork;
pub mod audio;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod core;
pub mod favorites;
pub mod logging;
pub mod marquee;
pub mod media_controls;
pub mod model;
pub mod player;
pub mod queue;
pub mod selector;
pub mod session;
pub mod storage;
pub mod ui;
pub mod volume;
