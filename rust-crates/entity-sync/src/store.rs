use crate::{
    entity::ParsedEntity,
    query::Query,
};
use generated_bindings::{
    DecodeError,
    EntityId,
    Model,
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::{
        PoisonError,
        RwLock,
        RwLockReadGuard,
        RwLockWriteGuard,
    },
    time::Duration,
};
use tokio::sync::watch;
use tracing::{
    debug,
    warn,
};

#[derive(Default)]
struct StoreState {
    entities: HashMap<EntityId, ParsedEntity>,
    synced: HashSet<String>,
}

impl StoreState {
    fn insert_all(&mut self, entities: Vec<ParsedEntity>) -> usize {
        let mut written = 0;
        for entity in entities {
            if entity.entity_id.is_zero() {
                debug!("skipping entity with zero id");
                continue;
            }
            self.entities.insert(entity.entity_id, entity);
            written += 1;
        }
        written
    }
}

fn scope_key(query: &Query) -> String {
    query.to_filter_json().to_string()
}

/// Local mirror of indexed entities. Every write that changes the contents
/// bumps a revision that observers can wait on through [`Self::changes`].
pub struct EntityStore {
    state: RwLock<StoreState>,
    revision: watch::Sender<u64>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: RwLock::new(StoreState::default()),
            revision,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    /// Bulk insert. Entities with the zero id are skipped. Returns how many
    /// were written.
    pub fn set_entities(&self, entities: Vec<ParsedEntity>) -> usize {
        let written = self.write().insert_all(entities);
        self.bump();
        written
    }

    /// Bulk insert of the complete result of `query`, after which
    /// [`Self::is_synced`] reports `query` as loaded.
    pub fn set_entities_for(&self, query: &Query, entities: Vec<ParsedEntity>) -> usize {
        let mut state = self.write();
        let written = state.insert_all(entities);
        state.synced.insert(scope_key(query));
        drop(state);

        self.bump();
        written
    }

    /// Replaces one entity. Returns whether the stored contents changed;
    /// re-applying the same entity is a no-op.
    pub fn update_entity(&self, entity: ParsedEntity) -> bool {
        if entity.entity_id.is_zero() {
            debug!("ignoring update for zero entity id");
            return false;
        }

        let mut state = self.write();
        if state.entities.get(&entity.entity_id) == Some(&entity) {
            return false;
        }
        state.entities.insert(entity.entity_id, entity);
        drop(state);

        self.bump();
        true
    }

    pub fn get_entity(&self, id: &EntityId) -> Option<ParsedEntity> {
        self.read().entities.get(id).cloned()
    }

    pub fn try_select<M: Model>(&self, id: &EntityId) -> Result<Option<M>, DecodeError> {
        match self.read().entities.get(id) {
            Some(entity) => entity.decode::<M>(),
            None => Ok(None),
        }
    }

    /// Typed view of one model on one entity. Records that fail to decode
    /// are logged and read as absent.
    pub fn select<M: Model>(&self, id: &EntityId) -> Option<M> {
        self.try_select(id).unwrap_or_else(|err| {
            warn!(%id, %err, "stored model failed to decode");
            None
        })
    }

    pub fn entities(&self) -> Vec<ParsedEntity> {
        self.read().entities.values().cloned().collect()
    }

    pub fn entities_by_model(&self, namespace: &str, name: &str) -> Vec<ParsedEntity> {
        self.read()
            .entities
            .values()
            .filter(|entity| entity.has_model(namespace, name))
            .cloned()
            .collect()
    }

    pub fn entities_matching(&self, query: &Query) -> Vec<ParsedEntity> {
        self.read()
            .entities
            .values()
            .filter(|entity| query.matches(entity))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entities.is_empty()
    }

    /// Whether a fetch for `query` has landed. Until then an absent entity
    /// in its scope means "not loaded yet", not "does not exist".
    pub fn is_synced(&self, query: &Query) -> bool {
        self.read().synced.contains(&scope_key(query))
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Waits until the entity exists and satisfies `predicate`, or until
    /// `timeout` elapses.
    pub async fn wait_for_entity_change<P>(
        &self,
        id: &EntityId,
        mut predicate: P,
        timeout: Duration,
    ) -> Option<ParsedEntity>
    where
        P: FnMut(&ParsedEntity) -> bool,
    {
        let mut changes = self.changes();
        let wait = async {
            loop {
                let _ = changes.borrow_and_update();
                if let Some(entity) = self.get_entity(id)
                    && predicate(&entity)
                {
                    return Some(entity);
                }
                if changes.changed().await.is_err() {
                    return None;
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.ok().flatten()
    }
}
