//! File records moving through the pipeline
//!
//! The stage a record has reached is part of its type. A record is created
//! [`Listed`] with only a name, becomes [`Downloaded`] once its bytes are
//! attached and is [`Settled`] after the publish attempt. The publish queue
//! only carries `FileRecord<Downloaded>`, so nothing without content can be
//! uploaded, and only the publisher stage can settle a record.

use serde::Serialize;
use std::fmt;

/// Result of the publish stage for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Unpublished,
    Published,
    PublishFailed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Unpublished => "unpublished",
            Outcome::Published => "published",
            Outcome::PublishFailed => "publish_failed",
        };
        f.write_str(label)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Pipeline stage marker
pub trait Stage: sealed::Sealed + Send + 'static {
    fn outcome(&self) -> Outcome {
        Outcome::Unpublished
    }
}

/// Discovered by the lister; no content yet
#[derive(Debug)]
pub struct Listed;

/// Content retrieved from the remote store
#[derive(Debug)]
pub struct Downloaded {
    content: Vec<u8>,
}

/// Publish attempted; content has been handed to the endpoint
#[derive(Debug)]
pub struct Settled {
    outcome: Outcome,
}

impl sealed::Sealed for Listed {}
impl sealed::Sealed for Downloaded {}
impl sealed::Sealed for Settled {}

impl Stage for Listed {}
impl Stage for Downloaded {}
impl Stage for Settled {
    fn outcome(&self) -> Outcome {
        self.outcome
    }
}

/// One remote file, owned by exactly one stage at a time
#[derive(Debug)]
pub struct FileRecord<S: Stage> {
    name: String,
    stage: S,
}

impl<S: Stage> FileRecord<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn outcome(&self) -> Outcome {
        self.stage.outcome()
    }
}

impl FileRecord<Listed> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage: Listed,
        }
    }

    /// Attach retrieved bytes
    pub fn with_content(self, content: Vec<u8>) -> FileRecord<Downloaded> {
        FileRecord {
            name: self.name,
            stage: Downloaded { content },
        }
    }
}

impl FileRecord<Downloaded> {
    pub fn content(&self) -> &[u8] {
        &self.stage.content
    }

    /// Split into name and bytes for the upload
    pub(crate) fn into_upload(self) -> (String, Vec<u8>) {
        (self.name, self.stage.content)
    }
}

impl FileRecord<Settled> {
    /// Record the publish result; `true` means the endpoint confirmed ingestion
    pub(crate) fn settle(name: String, ingested: bool) -> Self {
        let outcome = if ingested {
            Outcome::Published
        } else {
            Outcome::PublishFailed
        };
        Self {
            name,
            stage: Settled { outcome },
        }
    }

    /// Whether this file may be removed from the remote store
    pub fn is_deletable(&self) -> bool {
        self.outcome() == Outcome::Published
    }
}
