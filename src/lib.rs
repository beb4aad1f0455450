//! Download orchestration for an embedded-browser shell: file naming,
//! storage permission gating, network and `blob:` transfers, completion
//! notices, and the page bridge protocol.

pub mod api;
pub mod app;
pub mod application;
pub mod domain;
pub mod ui;
pub mod utils;
