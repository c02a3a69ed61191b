//! Tipos compartilhados do Presage.

pub mod config;
pub mod errors;
pub mod records;
pub mod requests;
pub mod responses;
