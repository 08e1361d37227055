//! OpenCafe - café and loyalty-program backend
//!
//! Staff administrators manage points of sale, menus, dishes, localized
//! strings and the instance configuration; customers hold loyalty cards.
//!
//! ## Layers
//!
//! - **Auth**: opaque admin tokens, role checks and the authorization matrix
//! - **Services**: one module per collection, transport independent
//! - **Routes**: `/api/{collection}/{operation}` over hyper
//! - **DB**: MongoDB or in-memory collections behind one trait
//! - **Crypto**: ChaCha20-Poly1305 field encryption and the sealed config file

pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod dbcfg;
pub mod logging;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use services::Context;
pub use types::{CafeError, Result};
