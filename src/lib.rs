//! nbfiddle: notebook storage, GitHub/Gist sync and a trust gate for HTML output.
//!
//! Notebooks are addressed by a GitHub or Gist URL, or by a local name.
//! They round trip through nbformat JSON and the jupytext percent format,
//! persist in a local SQLite store, and render through a gate that keeps
//! script-bearing HTML out of the page until the user trusts the notebook.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod logging;

pub mod format;
pub mod history;
pub mod locator;
pub mod notebook;

pub mod remote;
pub mod render;
pub mod session;
pub mod storage;
pub mod trust;
