pub mod error;
pub mod string;
pub mod time;
