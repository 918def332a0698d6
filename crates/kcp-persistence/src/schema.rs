//! Esquema Diesel (escrito a mano). Reemplazable con `diesel print-schema`.

diesel::table! {
    operations (id) {
        id -> Uuid,
        version -> BigInt,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        instance_id -> Text,
        orchestration_id -> Nullable<Text>,
        target_operation_id -> Text,
        operation_type -> Text,
        state -> Text,
        description -> Text,
        data -> Jsonb,
    }
}
