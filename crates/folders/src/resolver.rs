//! Folder path resolution against a flat inventory listing
//!
//! Display names are not unique, so a path is matched by building a
//! [`CandidateForest`] and keeping only the deepest chains whose names equal
//! the path. Missing levels are created root to leaf through the
//! [`InventoryProvider`].

use crate::forest::CandidateForest;
use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, info};
use vc_core::{FolderRecord, InventoryProvider, ManagedRef, ProvisionError, Result};

/// A uniquely matched folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFolder {
    pub folder: ManagedRef,
    /// Children recorded in the inventory listing the match came from
    pub children: Vec<ManagedRef>,
}

impl From<&FolderRecord> for ResolvedFolder {
    fn from(record: &FolderRecord) -> Self {
        Self {
            folder: record.folder.clone(),
            children: record.children.clone(),
        }
    }
}

/// Drop empty and whitespace-only segments
pub fn clean_segments<S: AsRef<str>>(segments: &[S]) -> Vec<String> {
    segments
        .iter()
        .map(|s| s.as_ref())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Match `segments` against `inventory` without touching the remote side
///
/// Returns `Ok(None)` when no chain matches and
/// [`ProvisionError::AmbiguousPath`] when more than one does.
pub fn match_path(segments: &[String], inventory: &[FolderRecord]) -> Result<Option<ResolvedFolder>> {
    let forest = CandidateForest::build(segments, inventory);

    let matches: Vec<&FolderRecord> = forest
        .deepest()
        .into_iter()
        .filter(|&index| forest.chain(index).iter().copied().eq(segments.iter().map(String::as_str)))
        .filter_map(|index| forest.node(index).record)
        .collect();

    match matches.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(ResolvedFolder::from(*only))),
        _ => Err(ProvisionError::AmbiguousPath {
            path: segments.to_vec(),
            matches: matches.len(),
        }),
    }
}

/// Resolves folder paths below a base anchor, creating missing levels
pub struct PathResolver<'a> {
    provider: &'a dyn InventoryProvider,
    base: ManagedRef,
}

impl<'a> PathResolver<'a> {
    pub fn new(provider: &'a dyn InventoryProvider, base: ManagedRef) -> Self {
        Self { provider, base }
    }

    pub fn base(&self) -> &ManagedRef {
        &self.base
    }

    /// Resolve `segments` using `inventory`, a listing of folders under the base
    ///
    /// Blank segments are ignored. An ambiguous match fails before anything
    /// is created.
    pub async fn resolve<S: AsRef<str>>(&self, segments: &[S], inventory: &[FolderRecord]) -> Result<ResolvedFolder> {
        let segments = clean_segments(segments);
        if segments.is_empty() {
            return Err(ProvisionError::UnresolvablePath { path: segments });
        }
        self.resolve_segments(&segments, inventory).await
    }

    /// Fetch the listing under the base, then resolve
    pub async fn resolve_fresh<S: AsRef<str>>(&self, segments: &[S]) -> Result<ResolvedFolder> {
        let inventory = self.provider.list_folders_under(&self.base).await?;
        self.resolve(segments, &inventory).await
    }

    fn resolve_segments<'b>(
        &'b self,
        segments: &'b [String],
        inventory: &'b [FolderRecord],
    ) -> BoxFuture<'b, Result<ResolvedFolder>> {
        Box::pin(async move {
            if let Some(found) = match_path(segments, inventory)? {
                debug!("Resolved {:?} to {}", segments, found.folder);
                return Ok(found);
            }

            let (last, prefix) = match segments.split_last() {
                Some(split) => split,
                None => return Err(ProvisionError::UnresolvablePath { path: Vec::new() }),
            };

            // Parent levels come first, resolved against the same listing
            let parent = if prefix.is_empty() {
                self.base.clone()
            } else {
                self.resolve_segments(prefix, inventory).await?.folder
            };

            info!("Creating folder '{}' under {}", last, parent);
            self.provider.create_folder(&parent, last).await?;

            debug!("Re-fetching folders under {}", self.base);
            let refreshed = self.provider.list_folders_under(&self.base).await?;
            match match_path(segments, &refreshed)? {
                Some(found) => Ok(found),
                None => Err(ProvisionError::UnresolvablePath {
                    path: segments.to_vec(),
                }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vc_core::{RemoteFault, RemoteResult, SimulatedVcenter, TaskHandle};

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    /// Provider whose listings never show the folders it creates
    #[derive(Default)]
    struct StaleListing {
        lists: AtomicUsize,
        creates: AtomicUsize,
    }

    #[async_trait]
    impl InventoryProvider for StaleListing {
        async fn list_folders_under(&self, _root: &ManagedRef) -> RemoteResult<Vec<FolderRecord>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn create_folder(&self, parent: &ManagedRef, name: &str) -> RemoteResult<FolderRecord> {
            let n = self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(FolderRecord {
                folder: ManagedRef::folder(format!("group-v{}", 100 + n)),
                name: name.to_string(),
                children: Vec::new(),
                parent: Some(parent.clone()),
            })
        }

        async fn find_vms(&self, _name: &str) -> RemoteResult<Vec<ManagedRef>> {
            Ok(Vec::new())
        }

        async fn parent_of(&self, _entity: &ManagedRef) -> RemoteResult<Option<ManagedRef>> {
            Ok(None)
        }

        async fn vm_folder_of(&self, _datacenter: &ManagedRef) -> RemoteResult<ManagedRef> {
            Err(RemoteFault::from_message("not supported"))
        }

        async fn find_datacenter(&self, _name: &str) -> RemoteResult<Option<ManagedRef>> {
            Ok(None)
        }

        async fn move_into_folder(&self, _folder: &ManagedRef, _entities: &[ManagedRef]) -> RemoteResult<TaskHandle> {
            Err(RemoteFault::from_message("not supported"))
        }
    }

    #[tokio::test]
    async fn test_existing_path_needs_no_creates() {
        let sim = SimulatedVcenter::new();
        let (_, base) = sim.add_datacenter("dc1");
        let prod = sim.add_folder(&base, "prod");
        let web = sim.add_folder(&prod, "web");
        let blue = sim.add_folder(&web, "blue");

        let resolver = PathResolver::new(&sim, base);
        let resolved = resolver.resolve_fresh(&path(&["prod", "web", "blue"])).await.unwrap();

        assert_eq!(resolved.folder, blue);
        assert!(sim.folder_creations().is_empty());

        // Same answer the second time
        let again = resolver.resolve_fresh(&path(&["prod", "web", "blue"])).await.unwrap();
        assert_eq!(again, resolved);
        assert!(sim.folder_creations().is_empty());
    }

    #[tokio::test]
    async fn test_missing_path_is_created_root_to_leaf() {
        let sim = SimulatedVcenter::new();
        let (_, base) = sim.add_datacenter("dc1");

        let resolver = PathResolver::new(&sim, base.clone());
        let resolved = resolver.resolve_fresh(&path(&["prod", "web", "blue"])).await.unwrap();

        let creations = sim.folder_creations();
        let names: Vec<&str> = creations.iter().map(|(_, name)| name.as_str()).collect();
        assert_eq!(names, vec!["prod", "web", "blue"]);
        assert_eq!(creations[0].0, base);

        let listing = sim.list_folders_under(&base).await.unwrap();
        let blue = listing.iter().find(|f| f.name == "blue").unwrap();
        assert_eq!(resolved.folder, blue.folder);
        // Each level went under the one created just before it
        assert_eq!(creations[2].0, listing.iter().find(|f| f.name == "web").unwrap().folder);
    }

    #[tokio::test]
    async fn test_only_missing_suffix_is_created() {
        let sim = SimulatedVcenter::new();
        let (_, base) = sim.add_datacenter("dc1");
        let prod = sim.add_folder(&base, "prod");

        let resolver = PathResolver::new(&sim, base);
        resolver.resolve_fresh(&path(&["prod", "web"])).await.unwrap();

        assert_eq!(sim.folder_creations(), vec![(prod, "web".to_string())]);
    }

    #[tokio::test]
    async fn test_ambiguous_path_creates_nothing() {
        let sim = SimulatedVcenter::new();
        let (_, base) = sim.add_datacenter("dc1");
        let a = sim.add_folder(&base, "prod");
        let b = sim.add_folder(&base, "staging");
        let nested = sim.add_folder(&b, "prod");
        sim.add_folder(&a, "web");
        sim.add_folder(&nested, "web");

        let resolver = PathResolver::new(&sim, base);
        let err = resolver.resolve_fresh(&path(&["prod", "web"])).await.unwrap_err();

        assert!(matches!(err, ProvisionError::AmbiguousPath { matches: 2, .. }));
        assert!(sim.folder_creations().is_empty());
    }

    #[tokio::test]
    async fn test_created_folder_missing_from_listing_fails_after_one_retry() {
        let provider = StaleListing::default();
        let resolver = PathResolver::new(&provider, ManagedRef::folder("group-v3"));

        let err = resolver.resolve_fresh(&path(&["apps"])).await.unwrap_err();

        assert!(matches!(err, ProvisionError::UnresolvablePath { path } if path == vec!["apps".to_string()]));
        assert_eq!(provider.creates.load(Ordering::SeqCst), 1);
        // Initial listing plus one re-fetch
        assert_eq!(provider.lists.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ambiguous_parent_stops_creation() {
        let sim = SimulatedVcenter::new();
        let (_, base) = sim.add_datacenter("dc1");
        let staging = sim.add_folder(&base, "staging");
        sim.add_folder(&base, "prod");
        sim.add_folder(&staging, "prod");

        let resolver = PathResolver::new(&sim, base);
        let err = resolver.resolve_fresh(&path(&["prod", "web"])).await.unwrap_err();

        assert!(matches!(err, ProvisionError::AmbiguousPath { matches: 2, .. }));
        assert!(sim.folder_creations().is_empty());
    }

    #[tokio::test]
    async fn test_blank_segments_are_ignored() {
        let sim = SimulatedVcenter::new();
        let (_, base) = sim.add_datacenter("dc1");
        let prod = sim.add_folder(&base, "prod");

        let resolver = PathResolver::new(&sim, base);
        let resolved = resolver.resolve_fresh(&path(&["", "prod", "  "])).await.unwrap();
        assert_eq!(resolved.folder, prod);

        let err = resolver.resolve_fresh(&path(&[" "])).await.unwrap_err();
        assert!(matches!(err, ProvisionError::UnresolvablePath { .. }));
    }

    #[test]
    fn test_match_path_reports_children() {
        let inventory = vec![FolderRecord {
            folder: ManagedRef::folder("group-v7"),
            name: "prod".to_string(),
            children: vec![ManagedRef::vm("vm-1")],
            parent: None,
        }];

        let found = match_path(&path(&["prod"]), &inventory).unwrap().unwrap();
        assert_eq!(found.children, vec![ManagedRef::vm("vm-1")]);
        assert!(match_path(&path(&["web"]), &inventory).unwrap().is_none());
    }
}
