//! MARQUEE Core - Entity Types
//!
//! Data structures, error taxonomy and configuration shared by the storage
//! gateways and the consistency engine. No I/O lives here.

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod filter;
pub mod health;
pub mod identity;
pub mod mutation;

pub use config::*;
pub use entities::*;
pub use enums::*;
pub use error::*;
pub use filter::*;
pub use health::*;
pub use identity::*;
pub use mutation::*;

// ============================================================================
// PROPERTY TESTS
// ============================================================================
