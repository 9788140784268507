pub mod condition;
pub mod config;
pub mod content;
pub mod effect;
pub mod engine;
pub mod expr;
pub mod magic;
pub mod presenter;
pub mod reaction;
pub mod resolver;
pub mod timers;
