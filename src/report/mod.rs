pub mod pdf;
pub mod register;
pub mod shift;
pub mod table;
