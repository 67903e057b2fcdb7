//! Conversion orchestration.
//!
//! One invocation runs strictly in order, and each step either advances or
//! ends the invocation:
//!
//! ```text
//! decode key → fetch → decode image → detect format ─┬─ already AVIF → Skipped
//!                                                    └─ encode → derive key → upload → Converted
//! ```
//!
//! Every failure is fatal and tagged with its [`Stage`]; the one exception
//! is an unreadable format label, which [`detect`] downgrades to a warning.
//! Nothing is retried here. Retrying belongs to whoever delivered the event.
//!
//! Decode and encode are CPU-bound and run on tokio's blocking pool. The
//! decoded image handle never leaves that task: it is dropped, and its
//! memory released, before the upload starts, whichever way the task
//! returns.
//!
//! ## Process-wide state
//!
//! A [`Converter`] holds the storage client and codec. Build it once per
//! process (cold start) and reuse it for every event the process handles
//! (warm starts). It holds no per-invocation state, so `handle` takes
//! `&self`.

use crate::config::{HandlerConfig, StorageBackend};
use crate::imaging::{Codec, CodecError, EncodeProfile, RustCodec, detect, is_already_target};
use crate::key::{KeyDecodeError, decode_key, derive_target_key};
use crate::result::{ConversionResult, Outcome, SKIP_MESSAGE};
use crate::storage::{LocalStore, ObjectStore, PutObject, S3Store, StorageError};
use crate::types::ConversionRequest;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{Span, debug, info, instrument};

/// Extension given to converted objects.
pub const TARGET_EXTENSION: &str = ".avif";
/// Content type stored with converted objects.
pub const TARGET_CONTENT_TYPE: &str = "image/avif";

/// Step of an invocation at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    KeyDecode,
    Fetch,
    Decode,
    Encode,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::KeyDecode => "key_decode",
            Stage::Fetch => "fetch",
            Stage::Decode => "decode",
            Stage::Encode => "encode",
            Stage::Upload => "upload",
        })
    }
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("failed to decode object key {raw_key:?}: {source}")]
    KeyDecode {
        raw_key: String,
        #[source]
        source: KeyDecodeError,
    },
    #[error("failed to fetch {bucket}/{key}: {source}")]
    Fetch {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },
    #[error("failed to decode image {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: CodecError,
    },
    #[error("failed to encode {key} to AVIF: {source}")]
    Encode {
        key: String,
        #[source]
        source: CodecError,
    },
    #[error("failed to upload AVIF image to {bucket}/{key}: {source}")]
    Upload {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },
}

impl ConvertError {
    pub fn stage(&self) -> Stage {
        match self {
            ConvertError::KeyDecode { .. } => Stage::KeyDecode,
            ConvertError::Fetch { .. } => Stage::Fetch,
            ConvertError::Decode { .. } => Stage::Decode,
            ConvertError::Encode { .. } => Stage::Encode,
            ConvertError::Upload { .. } => Stage::Upload,
        }
    }
}

/// Process start-up failures. Nothing can be handled after one of these.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("storage setup failed: {0}")]
    Storage(String),
    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Result of the decode/detect/encode step.
enum Transcoded {
    AlreadyTarget,
    Encoded(Vec<u8>),
}

/// Process-wide conversion context: storage client, codec, encode profile.
pub struct Converter<S, C> {
    store: S,
    codec: Arc<C>,
    profile: EncodeProfile,
}

/// The converter the binary runs: storage chosen by config, pure-Rust codec.
pub type DefaultConverter = Converter<Box<dyn ObjectStore>, RustCodec>;

impl DefaultConverter {
    /// Cold-start construction from configuration.
    pub async fn from_config(config: &HandlerConfig) -> Result<Self, InitError> {
        let store: Box<dyn ObjectStore> = match config.storage.backend {
            StorageBackend::S3 => Box::new(S3Store::connect(&config.storage).await),
            StorageBackend::Local => {
                let root = Path::new(&config.storage.local_root);
                if !root.is_dir() {
                    return Err(InitError::Storage(format!(
                        "local storage root {} is not a directory",
                        root.display()
                    )));
                }
                Box::new(LocalStore::new(root))
            }
        };
        info!(backend = ?config.storage.backend, "storage client and codec initialized");
        Ok(Converter::new(store, RustCodec::new()))
    }
}

impl<S: ObjectStore, C: Codec + 'static> Converter<S, C> {
    pub fn new(store: S, codec: C) -> Self {
        Self {
            store,
            codec: Arc::new(codec),
            profile: EncodeProfile::AVIF,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn profile(&self) -> &EncodeProfile {
        &self.profile
    }

    /// Handle one event and build its result record.
    #[instrument(name = "convert", skip_all, fields(bucket = %request.bucket, raw_key = %request.key))]
    pub async fn handle(
        &self,
        request: &ConversionRequest,
    ) -> Result<ConversionResult, ConvertError> {
        self.run(request).await.map(ConversionResult::from)
    }

    /// Handle one event, returning the terminal state.
    pub async fn run(&self, request: &ConversionRequest) -> Result<Outcome, ConvertError> {
        let bucket = &request.bucket;
        let key = decode_key(&request.key).map_err(|source| ConvertError::KeyDecode {
            raw_key: request.key.clone(),
            source,
        })?;
        info!(%bucket, %key, "processing image");

        let buffer = self
            .store
            .get(bucket, &key)
            .await
            .map_err(|source| ConvertError::Fetch {
                bucket: bucket.clone(),
                key: key.clone(),
                source,
            })?;
        let original_size = buffer.len();

        let encoded = match self.transcode(&key, buffer).await? {
            Transcoded::AlreadyTarget => {
                info!("{SKIP_MESSAGE}");
                return Ok(Outcome::Skipped { original_key: key });
            }
            Transcoded::Encoded(bytes) => bytes,
        };
        let encoded_size = encoded.len();
        info!(original_size, encoded_size, "encoded to AVIF");

        let new_key = derive_target_key(&key, TARGET_EXTENSION);
        info!(%bucket, %new_key, "uploading converted image");
        self.store
            .put(PutObject::new(bucket, &new_key, encoded, TARGET_CONTENT_TYPE))
            .await
            .map_err(|source| ConvertError::Upload {
                bucket: bucket.clone(),
                key: new_key.clone(),
                source,
            })?;

        Ok(Outcome::Converted {
            original_key: key,
            new_key,
            original_size,
            encoded_size,
        })
    }

    /// Decode, check the format, and encode if needed, on the blocking pool.
    async fn transcode(&self, key: &str, buffer: Vec<u8>) -> Result<Transcoded, ConvertError> {
        let codec = Arc::clone(&self.codec);
        let profile = self.profile;
        let task_key = key.to_string();
        let span = Span::current();
        let task = tokio::task::spawn_blocking(move || {
            span.in_scope(|| transcode_blocking(&*codec, &profile, &task_key, &buffer))
        });
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(ConvertError::Decode {
                key: key.to_string(),
                source: CodecError::Decode(format!("codec task cancelled: {e}")),
            }),
        }
    }
}

/// The decoded handle is owned by this frame and dropped on every return.
fn transcode_blocking<C: Codec>(
    codec: &C,
    profile: &EncodeProfile,
    key: &str,
    buffer: &[u8],
) -> Result<Transcoded, ConvertError> {
    let image = codec.decode(buffer).map_err(|source| ConvertError::Decode {
        key: key.to_string(),
        source,
    })?;

    let label = detect(codec, &image);
    if is_already_target(&label) {
        return Ok(Transcoded::AlreadyTarget);
    }

    debug!(?profile, loader = %label, "encoding");
    let encoded = codec
        .encode(&image, profile)
        .map_err(|source| ConvertError::Encode {
            key: key.to_string(),
            source,
        })?;
    Ok(Transcoded::Encoded(encoded))
}
