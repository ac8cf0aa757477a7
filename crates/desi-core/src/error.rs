use thiserror::Error;

use crate::archive_path::PathError;
use crate::credentials::CredentialsError;
use crate::fetch::FetchError;
use crate::fits::FitsError;
use crate::gaia_index::GaiaIndexError;
use crate::release::Release;

/// Anything that can go wrong between building a path and slicing a row.
#[derive(Error, Debug)]
pub enum RetrieverError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("invalid archive URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error("authentication rejected by {url}; check the credentials file")]
    Unauthorized { url: String },

    #[error(transparent)]
    Fetch(FetchError),

    #[error("{location}: {source}")]
    Fits {
        location: String,
        #[source]
        source: FitsError,
    },

    #[error("{location}: {source}")]
    GaiaIndex {
        location: String,
        #[source]
        source: GaiaIndexError,
    },

    #[error("release {0} has no Gaia source-id index")]
    NoGaiaIndex(Release),

    #[error("Gaia source {source_id} not found in the {release} index")]
    GaiaSourceNotFound { source_id: i64, release: Release },

    #[error("a target id or a fiber is required to select spectra")]
    NoTargetSelector,

    #[error("tile {tile_id}: a fiber is needed to determine the spectrograph")]
    FiberRequired { tile_id: u32 },
}

impl From<FetchError> for RetrieverError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Http { url, status: 401 } => RetrieverError::Unauthorized { url },
            other => RetrieverError::Fetch(other),
        }
    }
}
