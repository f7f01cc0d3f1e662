//! 后台任务 / Background tasks

pub mod cleanup;
pub mod sweep;
