pub mod daily;
pub mod fallback;
pub mod format;
pub mod local_time;
pub mod schedule;
pub mod status;
pub mod uk_datetime_now;
