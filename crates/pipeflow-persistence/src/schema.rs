//! Esquema Diesel (escrito a mano, equivalente a `diesel print-schema`).

diesel::table! {
    entities (kind, id) {
        kind -> Text,
        id -> Uuid,
        payload -> Jsonb,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    commands (id) {
        id -> Uuid,
        action_id -> Uuid,
        position -> Integer,
        command -> Text,
    }
}

diesel::table! {
    traveler_progress (id) {
        id -> Uuid,
        stream_id -> Uuid,
        started_at -> Timestamptz,
    }
}

diesel::table! {
    progress_entries (seq) {
        seq -> BigInt,
        progress_id -> Uuid,
        kind -> Text,
        payload -> Jsonb,
        ts -> Timestamptz,
    }
}

diesel::joinable!(progress_entries -> traveler_progress (progress_id));

diesel::allow_tables_to_appear_in_same_query!(
    entities,
    commands,
    traveler_progress,
    progress_entries,
);
