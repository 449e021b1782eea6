use std::path::PathBuf;

use crate::face_id::FaceId;

/// Errors produced by the catalog, the engine facade and the configuration layer.
///
/// Every variant is recoverable. A failed glyph or face leaves the session usable.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The font file could not be read or does not contain any face.
    #[error("failed to probe font file `{}`: {reason}", path.display())]
    FileProbeFailed { path: PathBuf, reason: String },

    #[error("face {face} of font {font} is missing or invalid")]
    InvalidFaceIndex { font: usize, face: u32 },

    #[error("named instance {instance} of face {face} in font {font} is missing")]
    InvalidInstanceIndex {
        font: usize,
        face: u32,
        instance: u32,
    },

    /// The engine could not instantiate a face that was probed successfully before.
    #[error("failed to open face {id}: {reason}")]
    FaceOpenFailed { id: FaceId, reason: String },

    #[error("failed to load glyph {glyph}: {reason}")]
    GlyphLoadFailed { glyph: u32, reason: String },

    /// The face id was never allocated by the registry.
    #[error("face id {0} is unknown")]
    NotFound(FaceId),

    /// The face id belonged to a font that has been closed or re-indexed.
    #[error("face id {0} refers to a closed or re-indexed font")]
    StaleFaceId(FaceId),

    /// Every id of the counter has been handed out once.
    #[error("face id space exhausted")]
    FaceIdsExhausted,

    #[error("index {index} is out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Registry and catalog disagree. Indicates a bookkeeping bug.
    #[error("internal consistency fault: {0}")]
    InternalConsistency(String),

    #[error("no face is selected")]
    NoFaceSelected,

    #[error("invalid value for config key `{key}`")]
    InvalidConfigValue { key: String },
}

pub type Result<T> = std::result::Result<T, Error>;
