pub mod activity;
pub mod catalog;
pub mod reel;
pub mod selector;
pub mod spin;
