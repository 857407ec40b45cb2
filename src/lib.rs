//! Vehicle marketplace core
//!
//! Vehicle listings and the sale transactions that move them between
//! sellers and buyers: the transaction state machine, the atomic completion
//! that transfers ownership, the financing calculator, and the
//! inspections a sale can cite.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod models;
pub mod repositories;
pub mod services;

pub use errors::ServiceError;
pub use services::{AppServices, ServiceSettings};
