use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::debug;
use pipeflow_core::{EntityKind, EntityRef, PipelineError, ProgressEntry, ProgressEntryKind, ProgressLedger, Result,
                    TravelerProgress};
use serde_json::Value;
use uuid::Uuid;

use super::{into_pipeline, with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::{progress_entries, traveler_progress};

#[derive(Insertable, Debug)]
#[diesel(table_name = progress_entries)]
struct NewEntryRow<'a> {
    progress_id: Uuid,
    kind: &'a str,
    payload: &'a Value,
}

/// Fila de `progress_entries`; `payload` es el JSON completo de
/// `ProgressEntryKind`, `kind` su tag para constraints e índices.
#[derive(Queryable, Debug)]
struct EntryRow {
    seq: i64,
    progress_id: Uuid,
    #[allow(dead_code)]
    kind: String,
    payload: Value,
    ts: DateTime<Utc>,
}

impl TryFrom<EntryRow> for ProgressEntry {
    type Error = PersistenceError;

    fn try_from(row: EntryRow) -> std::result::Result<Self, Self::Error> {
        let kind: ProgressEntryKind =
            serde_json::from_value(row.payload).map_err(|e| PersistenceError::CorruptRow(format!("entry {}: {e}", row.seq)))?;
        Ok(ProgressEntry { seq: row.seq as u64,
                           progress_id: row.progress_id,
                           kind,
                           ts: row.ts })
    }
}

fn progress_ref(progress_id: Uuid) -> EntityRef {
    EntityRef::new(EntityKind::TravelerProgress, progress_id)
}

fn insert_entry(conn: &mut PgConnection,
                progress_id: Uuid,
                kind: &ProgressEntryKind)
                -> std::result::Result<ProgressEntry, PersistenceError> {
    let payload = serde_json::to_value(kind).map_err(|e| PersistenceError::Unknown(format!("ser: {e}")))?;
    let (seq, ts): (i64, DateTime<Utc>) =
        diesel::insert_into(progress_entries::table).values(NewEntryRow { progress_id,
                                                                          kind: kind.as_str(),
                                                                          payload: &payload })
                                                    .returning((progress_entries::seq, progress_entries::ts))
                                                    .get_result(conn)?;
    Ok(ProgressEntry { seq: seq as u64,
                       progress_id,
                       kind: kind.clone(),
                       ts })
}

/// Ledger de progreso sobre Postgres.
///
/// - `append` es un INSERT simple: ramas concurrentes nunca pisan entradas.
/// - `append_once` bloquea la fila del linaje (`FOR UPDATE`) y chequea la
///   existencia del tipo antes de insertar. Para `pipeline_ended` además
///   hay un índice único parcial, así que un doble cierre termina en
///   `ON CONFLICT DO NOTHING`.
pub struct PgProgressLedger<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgProgressLedger<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> ProgressLedger for PgProgressLedger<P> {
    fn create(&self, stream_id: Uuid) -> Result<TravelerProgress> {
        let id = Uuid::new_v4();
        let progress = with_retry(|| {
                           let mut conn = self.provider.connection()?;
                           conn.build_transaction().read_write().run::<_, PersistenceError, _>(|tx| {
                                                                    // started_at lo fija la base para que una relectura
                                                                    // devuelva exactamente el mismo valor.
                                                                    let started_at: DateTime<Utc> =
                                                                        diesel::insert_into(traveler_progress::table)
                                                                            .values((traveler_progress::id.eq(id),
                                                                                     traveler_progress::stream_id.eq(stream_id)))
                                                                            .returning(traveler_progress::started_at)
                                                                            .get_result(tx)?;
                                                                    insert_entry(tx, id, &ProgressEntryKind::PipelineStarted)?;
                                                                    Ok(TravelerProgress { id,
                                                                                          stream_id,
                                                                                          started_at })
                                                                })
                       }).map_err(|e| into_pipeline(e, progress_ref(id)))?;
        debug!("progress:create id={} stream={}", progress.id, stream_id);
        Ok(progress)
    }

    fn load(&self, progress_id: Uuid) -> Result<TravelerProgress> {
        let row: Option<(Uuid, Uuid, DateTime<Utc>)> =
            with_retry(|| {
                let mut conn = self.provider.connection()?;
                traveler_progress::table.find(progress_id)
                                        .first(&mut conn)
                                        .optional()
                                        .map_err(PersistenceError::from)
            }).map_err(|e| into_pipeline(e, progress_ref(progress_id)))?;
        let (id, stream_id, started_at) = row.ok_or(PipelineError::NotFound(progress_ref(progress_id)))?;
        Ok(TravelerProgress { id,
                              stream_id,
                              started_at })
    }

    fn append(&self, progress_id: Uuid, kind: ProgressEntryKind) -> Result<ProgressEntry> {
        // Una FK violada significa linaje inexistente.
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            insert_entry(&mut conn, progress_id, &kind)
        }).map_err(|e| into_pipeline(e, progress_ref(progress_id)))
    }

    fn append_once(&self, progress_id: Uuid, kind: ProgressEntryKind) -> Result<Option<ProgressEntry>> {
        let payload = serde_json::to_value(&kind)?;
        let inserted = with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction().read_write().run::<_, PersistenceError, _>(|tx| {
                                                     let locked: Option<Uuid> =
                                                         traveler_progress::table.find(progress_id)
                                                                                 .select(traveler_progress::id)
                                                                                 .for_update()
                                                                                 .first(tx)
                                                                                 .optional()?;
                                                     if locked.is_none() {
                                                         return Err(PersistenceError::NotFound);
                                                     }
                                                     let exists: i64 =
                                                         progress_entries::table.filter(progress_entries::progress_id.eq(progress_id))
                                                                                .filter(progress_entries::kind.eq(kind.as_str()))
                                                                                .count()
                                                                                .get_result(tx)?;
                                                     if exists > 0 {
                                                         return Ok(None);
                                                     }
                                                     let row: Option<(i64, DateTime<Utc>)> =
                                                         diesel::insert_into(progress_entries::table)
                                                             .values(NewEntryRow { progress_id,
                                                                                   kind: kind.as_str(),
                                                                                   payload: &payload })
                                                             .on_conflict_do_nothing()
                                                             .returning((progress_entries::seq, progress_entries::ts))
                                                             .get_result(tx)
                                                             .optional()?;
                                                     Ok(row)
                                                 })
        }).map_err(|e| into_pipeline(e, progress_ref(progress_id)))?;
        Ok(inserted.map(|(seq, ts)| ProgressEntry { seq: seq as u64,
                                                    progress_id,
                                                    kind,
                                                    ts }))
    }

    fn list(&self, progress_id: Uuid) -> Result<Vec<ProgressEntry>> {
        let rows: Vec<EntryRow> = with_retry(|| {
                                      let mut conn = self.provider.connection()?;
                                      progress_entries::table.filter(progress_entries::progress_id.eq(progress_id))
                                                             .order(progress_entries::seq.asc())
                                                             .load(&mut conn)
                                                             .map_err(PersistenceError::from)
                                  }).map_err(|e| into_pipeline(e, progress_ref(progress_id)))?;
        if rows.is_empty() {
            // Todo linaje tiene al menos `pipeline_started`.
            self.load(progress_id)?;
        }
        let entries = rows.into_iter()
                          .map(ProgressEntry::try_from)
                          .collect::<std::result::Result<Vec<_>, _>>()
                          .map_err(|e| into_pipeline(e, progress_ref(progress_id)))?;
        debug!("progress:list id={progress_id} count={}", entries.len());
        Ok(entries)
    }
}
