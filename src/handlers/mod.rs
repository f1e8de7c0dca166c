pub mod health;
pub mod multipart;
pub mod resource;
