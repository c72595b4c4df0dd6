pub mod aggregate;
pub mod cloc;
pub mod flatten;
pub mod scanner;
pub mod stats;
pub mod tree;
