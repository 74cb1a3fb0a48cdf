pub mod image;
pub mod movie;
pub mod tmdb;
pub mod version;
