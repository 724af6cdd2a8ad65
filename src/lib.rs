pub mod cli;
pub mod config;
pub mod error;
pub mod megaport;
pub mod metrics;
pub mod reconcile;

pub use error::{Error, Result};
pub use reconcile::{PrefixListStore, Reconciler};
