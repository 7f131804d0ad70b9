pub mod academics;
pub mod auth;
pub mod calendar;
pub mod core;
pub mod forms;
pub mod lists;
pub mod notes;
pub mod notices;
pub mod people;
pub mod setup;
