// Defines database schema for diesel to use

pub mod sql_types {
    #[derive(diesel::sql_types::SqlType)]
    #[diesel(postgres_type(name = "event_status"))]
    pub struct EventStatus;
}

diesel::table! {
    use diesel::sql_types::*;
    use super::sql_types::EventStatus;

    events (id) {
        id -> Text,
        title -> Text,
        slug -> Text,
        description -> Nullable<Text>,
        event_date -> Timestamptz,
        location -> Nullable<Text>,
        region -> Nullable<Text>,
        max_capacity -> Int4,
        current_bookings -> Int4,
        status -> EventStatus,
        price_amount -> Int8,
        currency -> Text,
        booking_deadline -> Nullable<Timestamptz>,
        cancellation_deadline -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    orders (id) {
        id -> Text,
        cart_id -> Text,
        payment_intent_id -> Text,
        customer_id -> Nullable<Text>,
        customer_email -> Nullable<Text>,
        customer_details -> Nullable<Jsonb>,
        amount -> Int8,
        currency -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    payment_events (id) {
        id -> Uuid,
        stripe_event_id -> Text,
        payment_intent_id -> Text,
        status -> Text,
        created_at -> Timestamp,
        amount -> Nullable<Int8>,
        currency -> Nullable<Text>,
        customer_id -> Nullable<Text>,
        metadata -> Nullable<Json>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(events, orders, payment_events);
