use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while parsing or validating a scene description.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("invalid scene XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("<{0}> tag is missing")]
    MissingTag(String),

    #[error("invalid value {value:?} for <{tag}>: {reason}")]
    InvalidValue {
        tag: String,
        value: String,
        reason: String,
    },

    #[error("unknown object type {0:?}")]
    UnknownKind(String),

    #[error("duplicate object name {0:?}")]
    DuplicateName(String),

    #[error("object {object:?} references unknown object {missing:?}")]
    UnknownReference { object: String, missing: String },

    #[error("object {0:?} is its own ancestor")]
    Cycle(String),
}

/// Errors raised when applying a debug panel edit.
#[derive(Error, Debug, PartialEq)]
pub enum PanelError {
    #[error("no control labelled {0:?}")]
    UnknownControl(String),

    #[error("control {label:?} expects {expected} component(s), got {got}")]
    Arity {
        label: String,
        expected: usize,
        got: usize,
    },

    #[error("control {label:?} is bound to missing object {object:?}")]
    MissingObject { label: String, object: String },

    #[error("control {label:?} got a non-finite value {value}")]
    NonFinite { label: String, value: String },
}

/// Errors raised while loading an external asset.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8")]
    Encoding { path: PathBuf },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}
