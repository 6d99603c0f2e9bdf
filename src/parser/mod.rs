pub mod prereq;
pub mod rows;
pub mod sections;
