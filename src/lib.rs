pub mod api;
pub mod config;
pub mod humanize;
pub mod ledger;
pub mod messaging;
pub mod metadata;
pub mod observability;
pub mod parser;
pub mod queue;
pub mod service;
pub mod storage;
pub mod worker;
