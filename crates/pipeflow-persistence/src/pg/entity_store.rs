use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use log::debug;
use pipeflow_core::{ActionBundle, Command, Entity, EntityKind, EntityRef, EntityStore, PipelineError, Result};
use serde_json::Value;
use uuid::Uuid;

use super::{into_pipeline, with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::{commands, entities};

#[derive(Insertable, Debug)]
#[diesel(table_name = entities)]
struct NewEntityRow<'a> {
    kind: &'a str,
    id: Uuid,
    payload: &'a Value,
    updated_at: DateTime<Utc>,
}

#[derive(Queryable, Insertable, Debug)]
#[diesel(table_name = commands)]
struct CommandRow {
    id: Uuid,
    action_id: Uuid,
    position: i32,
    command: String,
}

impl From<CommandRow> for Command {
    fn from(row: CommandRow) -> Self {
        Command { id: row.id,
                  action_id: row.action_id,
                  position: row.position as u32,
                  command: row.command }
    }
}

fn fetch_entity(conn: &mut PgConnection, kind: EntityKind, id: Uuid) -> std::result::Result<Option<Entity>, PersistenceError> {
    let payload: Option<Value> = entities::table.filter(entities::kind.eq(kind.as_str()))
                                                .filter(entities::id.eq(id))
                                                .select(entities::payload)
                                                .first(conn)
                                                .optional()?;
    payload.map(|v| serde_json::from_value(v).map_err(|e| PersistenceError::CorruptRow(format!("{kind}#{id}: {e}"))))
           .transpose()
}

fn fetch_commands(conn: &mut PgConnection, action_id: Uuid) -> std::result::Result<Vec<Command>, PersistenceError> {
    let rows: Vec<CommandRow> = commands::table.filter(commands::action_id.eq(action_id))
                                               .order(commands::position.asc())
                                               .load(conn)?;
    Ok(rows.into_iter().map(Command::from).collect())
}

/// Entity store sobre Postgres. Cada entidad se guarda serializada completa
/// en `payload`; la lectura compuesta de una Action corre en una sola
/// transacción de lectura.
pub struct PgEntityStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgEntityStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> EntityStore for PgEntityStore<P> {
    fn load(&self, reference: &EntityRef) -> Result<Entity> {
        let found = with_retry(|| {
                        let mut conn = self.provider.connection()?;
                        fetch_entity(&mut conn, reference.kind, reference.id)
                    }).map_err(|e| into_pipeline(e, *reference))?;
        found.ok_or(PipelineError::NotFound(*reference))
    }

    fn save(&self, entity: Entity) -> Result<EntityRef> {
        let reference = entity.reference();
        let payload = serde_json::to_value(&entity)?;
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            let row = NewEntityRow { kind: reference.kind.as_str(),
                                     id: reference.id,
                                     payload: &payload,
                                     updated_at: Utc::now() };
            diesel::insert_into(entities::table).values(&row)
                                                .on_conflict((entities::kind, entities::id))
                                                .do_update()
                                                .set((entities::payload.eq(excluded(entities::payload)),
                                                      entities::updated_at.eq(excluded(entities::updated_at))))
                                                .execute(&mut conn)
                                                .map_err(PersistenceError::from)
        }).map_err(|e| into_pipeline(e, reference))?;
        debug!("entity:save {reference}");
        Ok(reference)
    }

    fn delete(&self, reference: &EntityRef) -> Result<()> {
        let deleted = with_retry(|| {
                          let mut conn = self.provider.connection()?;
                          conn.build_transaction()
                              .read_write()
                              .run(|tx| {
                                  let n = diesel::delete(entities::table.filter(entities::kind.eq(reference.kind.as_str()))
                                                                        .filter(entities::id.eq(reference.id)))
                                          .execute(tx)?;
                                  if n > 0 && reference.kind == EntityKind::Action {
                                      diesel::delete(commands::table.filter(commands::action_id.eq(reference.id)))
                                          .execute(tx)?;
                                  }
                                  Ok::<usize, diesel::result::Error>(n)
                              })
                              .map_err(PersistenceError::from)
                      }).map_err(|e| into_pipeline(e, *reference))?;
        if deleted == 0 {
            return Err(PipelineError::NotFound(*reference));
        }
        Ok(())
    }

    fn load_action_bundle(&self, action_id: Uuid) -> Result<ActionBundle> {
        let action_ref = EntityRef::new(EntityKind::Action, action_id);
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction().read_only().run::<_, PersistenceError, _>(|tx| {
                                                    let action = match fetch_entity(tx, EntityKind::Action, action_id)? {
                                                        Some(Entity::Action(a)) => a,
                                                        Some(_) | None => return Err(PersistenceError::NotFound),
                                                    };
                                                    let host = match action.host_id {
                                                        Some(id) => match fetch_entity(tx, EntityKind::Host, id)? {
                                                            Some(Entity::Host(h)) => Some(h),
                                                            _ => None,
                                                        },
                                                        None => None,
                                                    };
                                                    let auth = match ActionBundle::effective_auth_id(&action, host.as_ref()) {
                                                        Some(id) => match fetch_entity(tx, EntityKind::Auth, id)? {
                                                            Some(Entity::Auth(a)) => Some(a),
                                                            _ => None,
                                                        },
                                                        None => None,
                                                    };
                                                    let commands = fetch_commands(tx, action_id)?;
                                                    Ok(ActionBundle { action,
                                                                      host,
                                                                      auth,
                                                                      commands })
                                                })
        }).map_err(|e| into_pipeline(e, action_ref))
    }

    fn add_command(&self, action_id: Uuid, command: &str) -> Result<Command> {
        let action_ref = EntityRef::new(EntityKind::Action, action_id);
        let row = with_retry(|| {
                      let mut conn = self.provider.connection()?;
                      conn.build_transaction().read_write().run::<_, PersistenceError, _>(|tx| {
                                                               // Lock de la Action: serializa appends concurrentes.
                                                               let locked: Option<Uuid> =
                                                                   entities::table.filter(entities::kind.eq(EntityKind::Action.as_str()))
                                                                                  .filter(entities::id.eq(action_id))
                                                                                  .select(entities::id)
                                                                                  .for_update()
                                                                                  .first(tx)
                                                                                  .optional()?;
                                                               if locked.is_none() {
                                                                   return Err(PersistenceError::NotFound);
                                                               }
                                                               let count: i64 =
                                                                   commands::table.filter(commands::action_id.eq(action_id))
                                                                                  .count()
                                                                                  .get_result(tx)?;
                                                               let row = CommandRow { id: Uuid::new_v4(),
                                                                                      action_id,
                                                                                      position: count as i32,
                                                                                      command: command.to_string() };
                                                               diesel::insert_into(commands::table).values(&row)
                                                                                                   .execute(tx)?;
                                                               Ok(row)
                                                           })
                  }).map_err(|e| into_pipeline(e, action_ref))?;
        debug!("entity:add_command action={action_id} position={}", row.position);
        Ok(row.into())
    }

    fn commands_for(&self, action_id: Uuid) -> Result<Vec<Command>> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            fetch_commands(&mut conn, action_id)
        }).map_err(|e| into_pipeline(e, EntityRef::new(EntityKind::Action, action_id)))
    }
}
