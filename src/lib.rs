pub mod api;
pub mod auth;
pub mod config;
pub mod downloads;
pub mod events;
pub mod ledger;
pub mod listener;
pub mod observability;
pub mod proto;
pub mod queue;
pub mod storage;
pub mod worker;
