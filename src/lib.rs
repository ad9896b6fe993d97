//! plexmend: reconcile Plex playlists with CSV lists of missing tracks.
//!
//! The pipeline builds an in-memory index of one music library section,
//! fuzzy-matches each CSV row against it, and adds confident matches to the
//! corresponding playlist, asking a human about the ambiguous ones.

pub mod backend;
pub mod config;
pub mod confirm;
pub mod csv_input;
pub mod driver;
pub mod index;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod plex;
pub mod progress;
pub mod scoring;
