pub mod fraud;
pub mod results;
pub mod system;
