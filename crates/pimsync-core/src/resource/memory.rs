//! In-memory resource store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use super::{
    Direction, LinkChange, LinkType, PropValue, Resource, ResourceStore, ResourceType,
    ResourceUpdate, UpdateTarget,
};
use crate::ids::ResourceId;
use crate::{Error, Result};

#[derive(Debug, Default)]
struct Graph {
    next_id: i64,
    resources: BTreeMap<ResourceId, (ResourceType, BTreeMap<String, PropValue>)>,
    links: BTreeSet<(ResourceId, LinkType, ResourceId)>,
}

/// Resource store kept in memory, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryResourceStore {
    graph: Mutex<Graph>,
}

impl MemoryResourceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Graph>> {
        self.graph
            .lock()
            .map_err(|_| Error::Config("resource graph lock poisoned".into()))
    }

    /// Number of links of a type in the whole graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph lock is poisoned.
    pub fn link_count(&self, link: LinkType) -> Result<usize> {
        Ok(self.lock()?.links.iter().filter(|(_, l, _)| *l == link).count())
    }
}

impl ResourceStore for MemoryResourceStore {
    async fn load(&self, id: ResourceId) -> Result<Option<Resource>> {
        let graph = self.lock()?;
        Ok(graph
            .resources
            .get(&id)
            .map(|(resource_type, props)| Resource {
                id,
                resource_type: *resource_type,
                props: props.clone(),
            }))
    }

    async fn find_by_prop(
        &self,
        resource_type: ResourceType,
        name: &str,
        value: &PropValue,
    ) -> Result<Vec<ResourceId>> {
        let graph = self.lock()?;
        Ok(graph
            .resources
            .iter()
            .filter(|(_, (t, props))| *t == resource_type && props.get(name) == Some(value))
            .map(|(id, _)| *id)
            .collect())
    }

    async fn list(&self, resource_type: ResourceType) -> Result<Vec<ResourceId>> {
        let graph = self.lock()?;
        Ok(graph
            .resources
            .iter()
            .filter(|(_, (t, _))| *t == resource_type)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn links(
        &self,
        id: ResourceId,
        link: LinkType,
        direction: Direction,
    ) -> Result<Vec<ResourceId>> {
        let graph = self.lock()?;
        let mut found: Vec<ResourceId> = graph
            .links
            .iter()
            .filter_map(|(from, l, to)| match direction {
                _ if *l != link => None,
                Direction::Outgoing if *from == id => Some(*to),
                Direction::Incoming if *to == id => Some(*from),
                _ => None,
            })
            .collect();
        found.sort();
        Ok(found)
    }

    async fn commit(&self, update: ResourceUpdate) -> Result<ResourceId> {
        let mut graph = self.lock()?;

        for change in update.link_changes() {
            let other = match change {
                LinkChange::Add(_, other)
                | LinkChange::Remove(_, other)
                | LinkChange::AddIncoming(_, other) => *other,
            };
            if !graph.resources.contains_key(&other) {
                return Err(Error::ResourceNotFound(other));
            }
        }

        let id = match update.target() {
            UpdateTarget::New(resource_type) => {
                graph.next_id += 1;
                let id = ResourceId(graph.next_id);
                graph
                    .resources
                    .insert(id, (resource_type, BTreeMap::new()));
                id
            }
            UpdateTarget::Existing(id) => {
                if !graph.resources.contains_key(&id) {
                    return Err(Error::ResourceNotFound(id));
                }
                id
            }
        };

        if let Some((_, props)) = graph.resources.get_mut(&id) {
            for name in update.deletes() {
                props.remove(name);
            }
            for (name, value) in update.sets() {
                props.insert(name.clone(), value.clone());
            }
        }

        for change in update.link_changes() {
            match *change {
                LinkChange::Add(link, to) => {
                    graph.links.insert((id, link, to));
                }
                LinkChange::AddIncoming(link, from) => {
                    graph.links.insert((from, link, id));
                }
                LinkChange::Remove(link, to) => {
                    graph.links.remove(&(id, link, to));
                }
            }
        }

        Ok(id)
    }

    async fn delete(&self, id: ResourceId) -> Result<()> {
        let mut graph = self.lock()?;
        graph.resources.remove(&id);
        graph.links.retain(|(from, _, to)| *from != id && *to != id);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resource::props;

    #[tokio::test]
    async fn test_commit_create_and_find() {
        let store = MemoryResourceStore::new();
        let mut update = ResourceUpdate::create(ResourceType::Email);
        update.set(props::ENTRY_ID, "E1");
        let id = store.commit(update).await.unwrap();

        let found = store
            .find_by_prop(ResourceType::Email, props::ENTRY_ID, &"E1".into())
            .await
            .unwrap();
        assert_eq!(found, vec![id]);
        let other_type = store
            .find_by_prop(ResourceType::Task, props::ENTRY_ID, &"E1".into())
            .await
            .unwrap();
        assert!(other_type.is_empty());
    }

    #[tokio::test]
    async fn test_links_are_exactly_once() {
        let store = MemoryResourceStore::new();
        let a = store
            .commit(ResourceUpdate::create(ResourceType::Email))
            .await
            .unwrap();
        let b = store
            .commit(ResourceUpdate::create(ResourceType::Email))
            .await
            .unwrap();
        for _ in 0..3 {
            let mut update = ResourceUpdate::edit(a);
            update.add_link(LinkType::Reply, b);
            store.commit(update).await.unwrap();
        }
        assert_eq!(store.link_count(LinkType::Reply).unwrap(), 1);
        assert_eq!(
            store.links(b, LinkType::Reply, Direction::Incoming).await.unwrap(),
            vec![a]
        );
    }

    #[tokio::test]
    async fn test_commit_to_missing_link_target_changes_nothing() {
        let store = MemoryResourceStore::new();
        let mut update = ResourceUpdate::create(ResourceType::Email);
        update.add_link(LinkType::InFolder, ResourceId(99));
        assert!(matches!(
            store.commit(update).await,
            Err(Error::ResourceNotFound(ResourceId(99)))
        ));
        assert!(store.list(ResourceType::Email).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_drops_links() {
        let store = MemoryResourceStore::new();
        let folder = store
            .commit(ResourceUpdate::create(ResourceType::Folder))
            .await
            .unwrap();
        let mut update = ResourceUpdate::create(ResourceType::Email);
        update.add_link(LinkType::InFolder, folder);
        let mail = store.commit(update).await.unwrap();

        store.delete(folder).await.unwrap();

        assert!(store.load(folder).await.unwrap().is_none());
        assert!(
            store
                .links(mail, LinkType::InFolder, Direction::Outgoing)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
