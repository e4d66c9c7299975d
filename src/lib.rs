//! Batch submission manager for structured bio-data packages.
//!
//! A package is one directory describing a biological sample plus an
//! analysis or a sequencing experiment/run, with data files identified by
//! md5 sidecars. The crate validates packages against the archive's coded
//! value catalog, confirms the declared files on the transfer endpoint and
//! submits eligible packages, recording every attempt in an append-only
//! per-package status ledger so repeated runs stay idempotent.

pub mod api;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod output;
pub mod package;
pub mod submit;
pub mod transfer;
pub mod validate;
