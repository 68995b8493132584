pub mod composite_sink;
pub mod snapshot_sink;
pub mod status_line_sink;
