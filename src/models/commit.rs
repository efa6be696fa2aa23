use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A single commit as reported by the remote. Equality is structural over
/// all four fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub author: String,
    /// Remote-supplied timestamp, kept verbatim
    pub date: String,
    pub message: String,
}

impl CommitRecord {
    pub fn new(
        sha: impl Into<String>,
        author: impl Into<String>,
        date: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            sha: sha.into(),
            author: author.into(),
            date: date.into(),
            message: message.into(),
        }
    }
}

/// A validated 1-based page request over a branch's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: usize,
    size: usize,
}

impl PageRequest {
    /// Fails with `InvalidPageRequest` for non-positive values or when the
    /// requested range does not fit in memory addressing.
    pub fn new(page: i64, size: i64) -> Result<Self> {
        let invalid = || AppError::InvalidPageRequest { page, size };

        if page < 1 || size < 1 {
            return Err(invalid());
        }
        let page = usize::try_from(page).map_err(|_| invalid())?;
        let size = usize::try_from(size).map_err(|_| invalid())?;
        page.checked_mul(size).ok_or_else(invalid)?;

        Ok(Self { page, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of commits the cache must hold to serve this page in full.
    pub fn end(&self) -> usize {
        self.page * self.size
    }

    pub fn start(&self) -> usize {
        self.end() - self.size
    }
}
