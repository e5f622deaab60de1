pub mod app;
pub mod cancel;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod fs_util;
pub mod output;
pub mod remote;
pub mod report;
pub mod scope;
pub mod store;
