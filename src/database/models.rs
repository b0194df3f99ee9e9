pub mod customer;
pub mod job;
pub mod job_execution;
pub mod job_result;
pub mod job_status;
pub mod notification_channel;
pub mod notification_log;
pub mod notification_status;
pub mod order_status;
pub mod rental_order;
