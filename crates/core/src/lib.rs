#![deny(warnings)]

pub mod audio;
pub mod classify;
pub mod config;
pub mod emotion;
pub mod evaluate;
pub mod score;
