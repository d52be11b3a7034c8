use entity_sync::{
    EntityStore,
    Op,
    Query,
};
use generated_bindings::{
    Action,
    Beast,
    EntityId,
    Felt,
    Gauge,
    Models,
    Stat,
    felt_to_hex,
    pad_address,
};
use std::fmt::{
    self,
    Write as _,
};
use tracing::warn;

const BAR_WIDTH: usize = 20;

/// Indexer query for the pet owned by `player`.
pub fn beast_query(player: Felt) -> Query {
    Query::for_model(Models::Beast).where_field("player", Op::Eq, pad_address(&player))
}

pub fn pet_entity_id(player: Felt) -> EntityId {
    EntityId::from_keys(&[player])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PetState {
    Loading,
    Unspawned,
    Awake,
    Asleep,
    Dead,
}

impl PetState {
    pub fn derive(beast: Option<&Beast>, synced: bool) -> Self {
        match beast {
            None if synced => PetState::Unspawned,
            None => PetState::Loading,
            Some(beast) if !beast.is_alive() => PetState::Dead,
            Some(beast) if !beast.is_awake() => PetState::Asleep,
            Some(_) => PetState::Awake,
        }
    }

    pub fn allowed_actions(self) -> &'static [Action] {
        match self {
            PetState::Loading => &[],
            PetState::Unspawned => &[Action::Spawn],
            PetState::Dead => &[Action::Revive],
            PetState::Asleep => &[Action::Awake, Action::DecreaseStats],
            PetState::Awake => &[
                Action::Feed,
                Action::Sleep,
                Action::Play,
                Action::Clean,
                Action::DecreaseStats,
            ],
        }
    }

    pub fn allows(self, action: Action) -> bool {
        self.allowed_actions().contains(&action)
    }
}

impl fmt::Display for PetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PetState::Loading => "loading",
            PetState::Unspawned => "no pet yet",
            PetState::Awake => "awake",
            PetState::Asleep => "asleep",
            PetState::Dead => "dead",
        };
        f.write_str(label)
    }
}

/// Everything the front end needs to draw one pet, read from the store in
/// one go.
#[derive(Debug, Clone, PartialEq)]
pub struct PetSnapshot {
    pub player: Felt,
    pub state: PetState,
    pub beast: Option<Beast>,
}

impl PetSnapshot {
    pub fn read(store: &EntityStore, player: Felt) -> Self {
        let beast = store.select::<Beast>(&pet_entity_id(player));
        if let Some(beast) = &beast {
            let invalid = beast.out_of_range_stats();
            if !invalid.is_empty() {
                warn!(player = %felt_to_hex(&player), ?invalid, "beast stats exceed their maximum");
            }
        }
        Self {
            player,
            state: PetState::derive(beast.as_ref(), store.is_synced(&beast_query(player))),
            beast,
        }
    }

    pub fn gauges(&self) -> Option<[(Stat, Gauge); 5]> {
        self.beast.as_ref().map(Beast::gauges)
    }

    pub fn allowed_actions(&self) -> &'static [Action] {
        self.state.allowed_actions()
    }

    pub fn render(&self) -> String {
        let mut out = format!("pet of {}: {}\n", felt_to_hex(&self.player), self.state);
        if let Some(beast) = &self.beast {
            let _ = writeln!(
                out,
                "  level {}  xp {}/{}",
                beast.level, beast.experience, beast.next_level_experience
            );
            for (stat, gauge) in beast.gauges() {
                let _ = writeln!(
                    out,
                    "  {:<10} {:>4}/{:<4} [{}] {:>3}%",
                    stat.to_string(),
                    gauge.value,
                    gauge.max,
                    bar(gauge),
                    gauge.percent()
                );
            }
        }
        let actions: Vec<_> = self
            .allowed_actions()
            .iter()
            .map(|action| action.entrypoint().replace('_', "-"))
            .collect();
        if !actions.is_empty() {
            let _ = writeln!(out, "  actions: {}", actions.join(", "));
        }
        out
    }
}

fn bar(gauge: Gauge) -> String {
    let filled = usize::from(gauge.percent()) * BAR_WIDTH / 100;
    format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use entity_sync::{
        QueryClient,
        QueryError,
        SubscriptionEvent,
        SyncSession,
        test_helpers::{
            FakeIndexer,
            beast_entity,
            beast_entity_with,
        },
    };
    use generated_bindings::{
        Model,
        test_helpers::{
            beast_json,
            dead_beast_json,
            sleeping_beast_json,
        },
    };
    use proptest::prelude::*;
    use serde_json::json;
    use std::{
        sync::Arc,
        time::Duration,
    };

    fn beast(raw: serde_json::Value) -> Beast {
        Beast::decode(&raw).unwrap()
    }

    #[test]
    fn derive__nothing_synced__is_loading() {
        assert_eq!(PetState::derive(None, false), PetState::Loading);
        assert!(PetState::Loading.allowed_actions().is_empty());
    }

    #[test]
    fn derive__synced_without_beast__is_unspawned() {
        let state = PetState::derive(None, true);

        assert_eq!(state, PetState::Unspawned);
        assert_eq!(state.allowed_actions(), &[Action::Spawn]);
    }

    #[test]
    fn derive__zero_life__is_dead_and_only_revive_allowed() {
        // given
        let dead = beast(dead_beast_json(Felt::ONE));

        // when
        let state = PetState::derive(Some(&dead), true);

        // then
        assert_eq!(state, PetState::Dead);
        assert_eq!(state.allowed_actions(), &[Action::Revive]);
    }

    #[test]
    fn derive__legacy_is_alive_flag__wins_over_life() {
        // given
        let mut raw = beast_json(Felt::ONE);
        raw["is_alive"] = json!(false);

        // when
        let state = PetState::derive(Some(&beast(raw)), true);

        // then
        assert_eq!(state, PetState::Dead);
    }

    #[test]
    fn derive__asleep__allows_awake_and_decrease_stats() {
        // given
        let sleeping = beast(sleeping_beast_json(Felt::ONE));

        // when
        let state = PetState::derive(Some(&sleeping), true);

        // then
        assert_eq!(state, PetState::Asleep);
        assert!(state.allows(Action::Awake));
        assert!(state.allows(Action::DecreaseStats));
        assert!(!state.allows(Action::Feed));
    }

    #[test]
    fn derive__healthy__is_awake() {
        let state = PetState::derive(Some(&beast(beast_json(Felt::ONE))), false);

        assert_eq!(state, PetState::Awake);
        assert!(!state.allows(Action::Spawn));
        assert!(!state.allows(Action::Revive));
    }

    #[test]
    fn snapshot__reads_pet_for_player_from_store() {
        // given
        let store = EntityStore::new();
        let player = Felt::from(0x99u64);
        store.set_entities(vec![beast_entity(player), beast_entity(Felt::from(0x98u64))]);

        // when
        let snapshot = PetSnapshot::read(&store, player);

        // then
        assert_eq!(snapshot.state, PetState::Awake);
        assert_eq!(snapshot.beast.as_ref().unwrap().player, player);
        assert_eq!(snapshot.gauges().unwrap()[0], (Stat::Life, Gauge { value: 100, max: 100 }));
    }

    #[test]
    fn render__lists_gauges_and_allowed_actions() {
        // given
        let store = EntityStore::new();
        store.set_entities(vec![beast_entity(Felt::ONE)]);

        // when
        let text = PetSnapshot::read(&store, Felt::ONE).render();

        // then
        assert!(text.starts_with("pet of 0x1: awake"));
        assert!(text.contains("hunger"));
        assert!(text.contains("actions: feed, sleep, play, clean, decrease-stats"));
    }

    #[test]
    fn snapshot__another_players_fetch_landed__is_still_loading() {
        // given
        let store = EntityStore::new();
        let alice = Felt::from(0xa11cu64);
        let bob = Felt::from(0xb0bu64);
        store.set_entities_for(&beast_query(alice), vec![beast_entity(alice)]);

        // when
        let snapshot = PetSnapshot::read(&store, bob);

        // then
        assert_eq!(snapshot.state, PetState::Loading);
        assert!(snapshot.allowed_actions().is_empty());
    }

    #[test]
    fn snapshot__own_fetch_landed_empty__is_unspawned() {
        // given
        let store = EntityStore::new();
        let bob = Felt::from(0xb0bu64);
        store.set_entities_for(&beast_query(bob), Vec::new());

        // when
        let snapshot = PetSnapshot::read(&store, bob);

        // then
        assert_eq!(snapshot.state, PetState::Unspawned);
        assert_eq!(snapshot.allowed_actions(), &[Action::Spawn]);
    }

    #[tokio::test]
    async fn snapshot__rebind_to_new_player_fails__new_player_is_loading() {
        // given
        let alice = Felt::from(0xa11cu64);
        let bob = Felt::from(0xb0bu64);
        let indexer = FakeIndexer::with_entities(vec![beast_entity(alice)]);
        let store = Arc::new(EntityStore::new());
        let mut session = SyncSession::new(QueryClient::new(indexer.clone()), store.clone(), beast_query);
        session.bind(alice).await.unwrap();

        // when
        indexer.fail_fetches(QueryError::Transport("connection refused".into()));
        assert!(session.bind(bob).await.is_err());

        // then
        assert_eq!(PetSnapshot::read(&store, alice).state, PetState::Awake);
        assert_eq!(PetSnapshot::read(&store, bob).state, PetState::Loading);
    }

    #[tokio::test]
    async fn snapshot__is_alive_flips_via_push__dead_is_derived_from_new_state() {
        // given
        let player = Felt::from(0xdeadu64);
        let indexer = FakeIndexer::with_entities(vec![beast_entity(player)]);
        let store = Arc::new(EntityStore::new());
        let mut session = SyncSession::new(QueryClient::new(indexer.clone()), store.clone(), beast_query);
        session.bind(player).await.unwrap();
        assert_eq!(PetSnapshot::read(&store, player).state, PetState::Awake);

        // when
        indexer
            .push(SubscriptionEvent::Entities(vec![beast_entity_with(
                player,
                dead_beast_json(player),
            )]))
            .await;
        store
            .wait_for_entity_change(
                &pet_entity_id(player),
                |entity| entity != &beast_entity(player),
                Duration::from_secs(2),
            )
            .await
            .expect("push should land in the store");

        // then
        let snapshot = PetSnapshot::read(&store, player);
        assert_eq!(snapshot.state, PetState::Dead);
        assert_eq!(snapshot.allowed_actions(), &[Action::Revive]);
    }

    proptest! {
        #[test]
        fn allowed_actions__never_mix_spawn_or_revive_with_care_actions(
            life in 0u32..200,
            awake in proptest::option::of(any::<bool>()),
            synced in any::<bool>(),
            present in any::<bool>(),
        ) {
            let mut raw = beast_json(Felt::ONE);
            raw["life"] = json!(life);
            if let Some(awake) = awake {
                raw["is_awake"] = json!(awake);
            }
            let pet = beast(raw);
            let state = PetState::derive(present.then_some(&pet), synced);
            let allowed = state.allowed_actions();

            if allowed.contains(&Action::Spawn) || allowed.contains(&Action::Revive) {
                prop_assert_eq!(allowed.len(), 1);
            }
            if present {
                prop_assert_eq!(state == PetState::Dead, life == 0);
            }
        }
    }
}
