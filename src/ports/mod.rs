pub mod catalog;
pub mod clock;
pub mod radio;
