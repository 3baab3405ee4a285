pub mod daily_frame;
pub mod point;
pub mod required_data;
pub mod station;
