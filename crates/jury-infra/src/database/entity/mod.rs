//! SeaORM entities.

pub mod webhook;
