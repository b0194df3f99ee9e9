//! Rentdesk - rental reminder and notification service
//!
//! Finds rental orders that need a pickup reminder, a return reminder or an
//! overdue notice, and delivers them by email through a retrying job queue.
//! Every delivery outcome is kept in the notification log.

#![allow(missing_docs)]

pub mod api;
pub mod app;
pub mod app_info;
pub mod boot;
pub mod cli;
pub mod commands;
pub mod config;
pub mod database;
pub mod emails;
pub mod environment;
pub mod job_queue;
pub mod jobs;
pub mod mailer;
pub mod notifications;
pub mod router;
pub mod setup_tracing;
