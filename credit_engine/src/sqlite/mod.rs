//! SQLite backend for the outcome credit engine.
//!
//! [`SqliteDatabase`] implements every storage trait in [`crate::traits`]. The low-level queries live in [`db`].
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
