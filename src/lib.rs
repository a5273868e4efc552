//! Client-side state for an anime detail page: metadata, collection status,
//! reviews, threaded comments, the episode catalog of two providers and the
//! source picker that turns a choice into a watch link.

pub mod comments;
pub mod config;
pub mod delete_confirm;
pub mod episodes;
pub mod error;
pub mod gateway;
pub mod links;
pub mod notify;
pub mod page;
pub mod progress;
pub mod source_flow;
pub mod storage;
pub mod types;

#[cfg(test)]
mod testing;
