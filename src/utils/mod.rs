pub mod country;
pub mod middleware;
