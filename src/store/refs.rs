use std::fmt;

use super::StoreError;

const SEPARATOR: char = '/';

fn check_segment(path: &str, segment: &str) -> Result<(), StoreError> {
    if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\0') {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

fn check_path(path: &str, want_odd: bool) -> Result<(), StoreError> {
    let mut count = 0;
    for segment in path.split(SEPARATOR) {
        check_segment(path, segment)?;
        count += 1;
    }
    if (count % 2 == 1) != want_odd {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

fn last_segment(path: &str) -> &str {
    path.rsplit(SEPARATOR).next().unwrap_or(path)
}

fn split_parent(path: &str) -> Option<(&str, &str)> {
    path.rsplit_once(SEPARATOR)
}

/// A collection addressed by its slash-separated path, e.g. `Countries/France/Cities`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionRef {
    path: String,
}

/// A document addressed by its slash-separated path, e.g. `Countries/France`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentRef {
    path: String,
}

impl CollectionRef {
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        check_path(path, true)?;
        Ok(Self { path: path.to_string() })
    }

    /// Top-level collection with the given id.
    pub fn root(id: &str) -> Result<Self, StoreError> {
        if id.contains(SEPARATOR) {
            return Err(StoreError::InvalidPath(id.to_string()));
        }
        Self::parse(id)
    }

    pub fn id(&self) -> &str {
        last_segment(&self.path)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The document owning this collection, `None` for top-level collections.
    pub fn parent(&self) -> Option<DocumentRef> {
        split_parent(&self.path).map(|(parent, _)| DocumentRef {
            path: parent.to_string(),
        })
    }

    pub fn doc(&self, id: &str) -> Result<DocumentRef, StoreError> {
        let path = format!("{}{}{}", self.path, SEPARATOR, id);
        if id.contains(SEPARATOR) {
            return Err(StoreError::InvalidPath(path));
        }
        check_segment(&path, id)?;
        Ok(DocumentRef { path })
    }
}

impl DocumentRef {
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        check_path(path, false)?;
        Ok(Self { path: path.to_string() })
    }

    pub fn id(&self) -> &str {
        last_segment(&self.path)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> CollectionRef {
        let parent = split_parent(&self.path).map(|(p, _)| p).unwrap_or_default();
        CollectionRef {
            path: parent.to_string(),
        }
    }

    pub fn collection(&self, id: &str) -> Result<CollectionRef, StoreError> {
        let path = format!("{}{}{}", self.path, SEPARATOR, id);
        if id.contains(SEPARATOR) {
            return Err(StoreError::InvalidPath(path));
        }
        check_segment(&path, id)?;
        Ok(CollectionRef { path })
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
