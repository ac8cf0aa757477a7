pub mod config;
pub mod logging;

pub mod archive_path;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fits;
pub mod gaia_index;
pub mod release;
pub mod retriever;

pub use error::RetrieverError;
pub use release::Release;
pub use retriever::{tile_locator, ModelRequest, Retriever, SpectraRequest};
