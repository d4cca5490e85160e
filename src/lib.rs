//! Mapping engine that turns a Redmine issue snapshot into a Jira import
//! document.

pub mod build_info;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod directory;
pub mod document;
pub mod error;
pub mod export;
pub mod filter;
pub mod journal;
pub mod model;
pub mod output;
pub mod projector;
pub mod prompt;
pub mod resolver;
pub mod text;

#[cfg(test)]
mod fixtures;
