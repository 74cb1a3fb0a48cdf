mod handler;
mod model;

pub use handler::{
    create_movie, delete_movie, get_movie, list_movies, search_movies, update_movie,
};
pub use model::{CreateMovieRequest, Movie, Pagination, UpdateMovieRequest};
