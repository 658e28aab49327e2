//! Comicbot core library — webhook verification, event classification,
//! dialogue orchestration, and the outbound API clients used by the CLI.

pub mod bot;
pub mod comics;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod gateway;
pub mod messenger;
pub mod signature;
