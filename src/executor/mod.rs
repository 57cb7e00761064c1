pub mod action;
pub mod coordinator;
pub mod dispatcher;
pub mod hotkey;
pub mod input;
