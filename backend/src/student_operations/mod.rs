pub mod config;
pub mod grade;
pub mod handler_utils;
pub mod sequencer;
pub mod service;
pub mod student_handlers;
pub mod student_models;
