//! Destination folder for a new clone

use crate::resolver::{clean_segments, PathResolver};
use tracing::debug;
use vc_core::{EntityKind, InventoryProvider, ManagedRef, ProvisionError, Result};

/// Walk parents from `entity` up to its datacenter
pub async fn datacenter_of(provider: &dyn InventoryProvider, entity: &ManagedRef) -> Result<ManagedRef> {
    let mut cursor = provider.parent_of(entity).await?;
    while let Some(current) = cursor {
        if current.kind == EntityKind::Datacenter {
            return Ok(current);
        }
        cursor = provider.parent_of(&current).await?;
    }
    Err(ProvisionError::DatacenterNotFound(entity.to_string()))
}

/// Folder a clone of `template` should land in
///
/// With no usable path the clone goes next to the template. Otherwise the
/// path is resolved (and created) below the VM folder of the template's
/// datacenter.
pub async fn destination_folder(
    provider: &dyn InventoryProvider,
    template: &ManagedRef,
    path: Option<&[String]>,
) -> Result<ManagedRef> {
    let segments = clean_segments(path.unwrap_or_default());

    if segments.is_empty() {
        debug!("No folder path given, using the parent of {}", template);
        return provider
            .parent_of(template)
            .await?
            .ok_or(ProvisionError::UnresolvablePath { path: segments });
    }

    let datacenter = datacenter_of(provider, template).await?;
    let base = provider.vm_folder_of(&datacenter).await?;
    debug!("Resolving {:?} under {} ({})", segments, base, datacenter);

    let resolver = PathResolver::new(provider, base);
    let resolved = resolver.resolve_fresh(&segments).await?;
    Ok(resolved.folder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vc_core::SimulatedVcenter;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_path_uses_template_parent() {
        let sim = SimulatedVcenter::new();
        let (_, base) = sim.add_datacenter("dc1");
        let templates = sim.add_folder(&base, "templates");
        let template = sim.add_vm(&templates, "rhel9-base", &[]);

        let folder = destination_folder(&sim, &template, None).await.unwrap();
        assert_eq!(folder, templates);

        let blanks = path(&["", " "]);
        let folder = destination_folder(&sim, &template, Some(blanks.as_slice())).await.unwrap();
        assert_eq!(folder, templates);
        assert!(sim.folder_creations().is_empty());
    }

    #[tokio::test]
    async fn test_path_resolves_under_datacenter_vm_folder() {
        let sim = SimulatedVcenter::new();
        let (dc, base) = sim.add_datacenter("dc1");
        let templates = sim.add_folder(&base, "templates");
        let template = sim.add_vm(&templates, "rhel9-base", &[]);

        assert_eq!(datacenter_of(&sim, &template).await.unwrap(), dc);

        let segments = path(&["prod", "web"]);
        let folder = destination_folder(&sim, &template, Some(segments.as_slice())).await.unwrap();

        let creations = sim.folder_creations();
        assert_eq!(creations.len(), 2);
        assert_eq!(creations[0], (base, "prod".to_string()));
        assert_eq!(sim.parent_of(&folder).await.unwrap().map(|p| p.kind), Some(EntityKind::Folder));
    }

    #[tokio::test]
    async fn test_template_outside_datacenter() {
        let sim = SimulatedVcenter::new();
        let loose = sim.add_folder(&ManagedRef::folder("group-v-detached"), "loose");
        let template = sim.add_vm(&loose, "rhel9-base", &[]);

        let segments = path(&["prod"]);
        let err = destination_folder(&sim, &template, Some(segments.as_slice())).await.unwrap_err();
        assert!(matches!(err, ProvisionError::DatacenterNotFound(_)));
        assert!(sim.folder_creations().is_empty());
    }
}
