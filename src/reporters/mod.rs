pub mod csv;
pub mod json;
pub mod terminal;
