pub mod activation;
pub mod comment;
pub mod feed;
pub mod like;
pub mod promo;
pub mod response;
pub mod user;
