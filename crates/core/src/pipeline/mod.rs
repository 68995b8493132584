pub mod detection_strategy;
pub mod infrastructure;
pub mod pipeline_executor;
pub mod pipeline_logger;
pub mod pipeline_state;
#[cfg(test)]
mod test_support;
pub mod watch_faces_use_case;
pub mod watch_loop;
