//! Command implementations for the panelcreator CLI

pub mod export;
pub mod info;
