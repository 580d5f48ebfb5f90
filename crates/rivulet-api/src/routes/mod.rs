pub mod health;
pub mod snapshot;
