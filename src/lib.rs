pub mod config;
pub mod db;
pub mod engine;
pub mod leaderboard;
pub mod ledger;
pub mod models;
pub mod normalize;
pub mod report;
pub mod scoring;
pub mod session;
pub mod source;
