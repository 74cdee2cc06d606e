//! Zinnia - editorial layer of a weblog engine
//!
//! Entries and categories are created, changed and listed through HTML
//! views and a JSON API. Every authorization decision goes through one
//! pluggable `PermissionHandler`, chosen by dotted name in the
//! configuration and resolved once at startup.

pub mod api;
pub mod config;
pub mod db;
pub mod forms;
pub mod models;
pub mod permissions;
pub mod services;
pub mod templates;
pub mod views;
