pub mod error;
pub mod modem;
pub mod ui;
pub mod utils;

pub use error::{Error, Result, Stage};
