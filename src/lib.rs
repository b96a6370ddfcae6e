pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod control;
pub mod controller;
pub mod events;
pub mod location;
pub mod logging;
pub mod map;
pub mod models;
pub mod ui;
