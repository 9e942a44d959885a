//! # Tally App
//!
//! Application layer: ports, use cases and in-process event delivery.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          tally-app                                      │
//! │                                                                         │
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────────────────┐   │
//! │  │  use_cases   │───►│    ports     │◄───│  memory (InMemoryStore)  │   │
//! │  │              │    │ async traits │    │  tally-db (SqliteStore)  │   │
//! │  └──────┬───────┘    └──────────────┘    └──────────────────────────┘   │
//! │         │ dispatch after commit                                         │
//! │         ▼                                                               │
//! │  ┌──────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │     bus      │───►│ listeners (loyalty auto-accrual)             │   │
//! │  └──────────────┘    └──────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  services: wires all of the above from an AppConfig                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Business rules live in `tally-core`. This crate only sequences them
//! inside transactions and publishes what happened.

pub mod bus;
pub mod config;
pub mod error;
pub mod listeners;
pub mod memory;
pub mod ports;
pub mod services;
pub mod telemetry;
pub mod use_cases;

pub use bus::EventBus;
pub use config::{AppConfig, ConfigError};
pub use error::{AppError, AppResult, StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use services::{PosServices, PosStore};
pub use telemetry::init_tracing;
