//! Paridad del `PgEntityStore` con el store en memoria (requiere
//! DATABASE_URL; sin ella los tests se omiten).


use pipeflow_core::{Action, Auth, Entity, EntityKind, EntityRef, EntityStore, Host, PipelineError, Stream};
use pipeflow_persistence::{PgEntityStore, PoolProvider};
use test_support::with_pool;
use uuid::Uuid;

#[test]
fn save_load_and_overwrite_entity() {
    with_pool(|pool| {
        let store = PgEntityStore::new(PoolProvider { pool: pool.clone() });
        let mut host = Host::new("db-1.internal");
        let reference = store.save(Entity::Host(host.clone())).unwrap();
        assert_eq!(store.load(&reference).unwrap(), Entity::Host(host.clone()));

        host.port = 2222;
        store.save(Entity::Host(host.clone())).unwrap();
        assert_eq!(store.load(&reference).unwrap(), Entity::Host(host));
    });
}

#[test]
fn missing_entity_is_not_found_and_delete_is_checked() {
    with_pool(|pool| {
        let store = PgEntityStore::new(PoolProvider { pool: pool.clone() });
        let missing = EntityRef::new(EntityKind::Stream, Uuid::new_v4());
        assert_eq!(store.load(&missing).unwrap_err(), PipelineError::NotFound(missing));
        assert_eq!(store.delete(&missing).unwrap_err(), PipelineError::NotFound(missing));

        let stream = Stream::new("tmp");
        let r = store.save(Entity::Stream(stream)).unwrap();
        store.delete(&r).unwrap();
        assert!(matches!(store.load(&r), Err(PipelineError::NotFound(_))));
    });
}

#[test]
fn action_bundle_is_one_composite_read() {
    with_pool(|pool| {
        let store = PgEntityStore::new(PoolProvider { pool: pool.clone() });
        let stream = Stream::new("deploy");
        let auth = Auth::key_pair("deploy", "PRIVATE", "PUBLIC");
        let host = Host::new("10.0.0.9").with_auth(auth.id);
        let action = Action::new(stream.id).on_host(host.id);
        for e in [Entity::Stream(stream),
                  Entity::Auth(auth.clone()),
                  Entity::Host(host.clone()),
                  Entity::Action(action.clone())]
        {
            store.save(e).unwrap();
        }
        store.add_command(action.id, "ls").unwrap();
        let second = store.add_command(action.id, "pwd").unwrap();
        assert_eq!(second.position, 1);

        let bundle = store.load_action_bundle(action.id).unwrap();
        assert_eq!(bundle.action, action);
        assert_eq!(bundle.host, Some(host));
        assert_eq!(bundle.auth, Some(auth));
        let commands: Vec<_> = bundle.commands.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(commands, vec!["ls", "pwd"]);
    });
}

#[test]
fn add_command_requires_action_and_keeps_positions_dense_under_concurrency() {
    with_pool(|pool| {
        let store = std::sync::Arc::new(PgEntityStore::new(PoolProvider { pool: pool.clone() }));
        let err = store.add_command(Uuid::new_v4(), "ls").unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(r) if r.kind == EntityKind::Action));

        let action = Action::new(Uuid::new_v4());
        store.save(Entity::Action(action.clone())).unwrap();
        let handles: Vec<_> = (0..4).map(|t| {
                                        let store = store.clone();
                                        let id = action.id;
                                        std::thread::spawn(move || {
                                            for i in 0..5 {
                                                store.add_command(id, &format!("echo {t}-{i}")).unwrap();
                                            }
                                        })
                                    })
                                    .collect();
        for h in handles {
            h.join().unwrap();
        }
        let positions: Vec<u32> = store.commands_for(action.id).unwrap().iter().map(|c| c.position).collect();
        assert_eq!(positions, (0..20).collect::<Vec<u32>>());
    });
}
