//! Raw object storage

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::core::{Error, Result};
use crate::processing::context::CallContext;

/// Byte storage addressed by opaque locators.
pub trait ObjectStore: Send + Sync {
	fn fetch(&self, ctx: &CallContext, locator: &str) -> Result<Vec<u8>>;

	fn put(&self, ctx: &CallContext, locator: &str, bytes: &[u8]) -> Result<()>;

	fn delete(&self, ctx: &CallContext, locator: &str) -> Result<()>;
}

/// Objects as files under a root directory; locators are relative paths.
pub struct FsObjectStore {
	root: PathBuf,
}

impl FsObjectStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Locator → path, refusing anything that escapes the root.
	fn resolve(&self, locator: &str) -> Result<PathBuf> {
		if locator.trim().is_empty() {
			return Err(Error::Validation("empty object locator".into()));
		}
		let rel = Path::new(locator);
		for component in rel.components() {
			match component {
				Component::Normal(_) | Component::CurDir => {}
				_ => {
					return Err(Error::Validation(format!(
						"object locator escapes the store: {}",
						locator
					)))
				}
			}
		}
		Ok(self.root.join(rel))
	}
}

impl ObjectStore for FsObjectStore {
	fn fetch(&self, ctx: &CallContext, locator: &str) -> Result<Vec<u8>> {
		ctx.check("object fetch")?;
		let path = self.resolve(locator)?;
		let bytes = fs::read(&path).map_err(|e| match e.kind() {
			ErrorKind::NotFound => Error::Retrieval(format!("no object at {}", locator)),
			_ => Error::Retrieval(format!("{}: {}", locator, e)),
		})?;
		ctx.check("object fetch")?;
		Ok(bytes)
	}

	fn put(&self, ctx: &CallContext, locator: &str, bytes: &[u8]) -> Result<()> {
		ctx.check("object put")?;
		let path = self.resolve(locator)?;
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(|e| Error::Retrieval(format!("{}: {}", parent.display(), e)))?;
		}
		fs::write(&path, bytes).map_err(|e| Error::Retrieval(format!("{}: {}", locator, e)))
	}

	fn delete(&self, ctx: &CallContext, locator: &str) -> Result<()> {
		ctx.check("object delete")?;
		let path = self.resolve(locator)?;
		match fs::remove_file(&path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(Error::Retrieval(format!("{}: {}", locator, e))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use tempfile::TempDir;

	#[test]
	fn put_then_fetch() {
		let dir = TempDir::new().unwrap();
		let store = FsObjectStore::new(dir.path());
		let ctx = CallContext::background();

		store.put(&ctx, "acme/a.png", b"bytes").unwrap();
		assert_eq!(store.fetch(&ctx, "acme/a.png").unwrap(), b"bytes");
	}

	#[test]
	fn missing_object_is_retrieval_error() {
		let dir = TempDir::new().unwrap();
		let store = FsObjectStore::new(dir.path());
		let err = store.fetch(&CallContext::background(), "nope.png").unwrap_err();
		assert!(matches!(err, Error::Retrieval(_)));
	}

	#[rstest]
	#[case("../etc/passwd")]
	#[case("/etc/passwd")]
	#[case("a/../../b")]
	#[case("")]
	fn rejects_locators_outside_root(#[case] locator: &str) {
		let dir = TempDir::new().unwrap();
		let store = FsObjectStore::new(dir.path());
		let err = store.fetch(&CallContext::background(), locator).unwrap_err();
		assert!(matches!(err, Error::Validation(_)));
	}

	#[test]
	fn delete_is_idempotent() {
		let dir = TempDir::new().unwrap();
		let store = FsObjectStore::new(dir.path());
		let ctx = CallContext::background();
		store.put(&ctx, "x.png", b"1").unwrap();
		store.delete(&ctx, "x.png").unwrap();
		store.delete(&ctx, "x.png").unwrap();
		assert!(store.fetch(&ctx, "x.png").is_err());
	}

	#[test]
	fn cancelled_context_stops_fetch() {
		let dir = TempDir::new().unwrap();
		let store = FsObjectStore::new(dir.path());
		let ctx = CallContext::background();
		store.put(&ctx, "x.png", b"1").unwrap();
		ctx.cancel_token().cancel();
		assert!(matches!(store.fetch(&ctx, "x.png"), Err(Error::Cancelled(_))));
	}
}
