pub mod compute;
pub mod db;
pub mod queue;
pub mod redis;
pub mod storage;
