pub mod job_queue;
pub mod rabbitmq;
