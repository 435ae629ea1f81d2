pub mod adapters;
pub mod api;
pub mod applier;
pub mod components;
pub mod config;
pub mod controllers;
pub mod gateway;
pub mod models;
pub mod mutators;
pub mod objects;
pub mod state;
pub mod tls;
pub mod util;
