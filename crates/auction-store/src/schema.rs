// @generated by hand, following the teacher's postgre_storage::schema layout.

diesel::table! {
    users (id) {
        id -> Uuid,
        username -> Varchar,
        email -> Varchar,
        password_hash -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    auctions (id) {
        id -> Uuid,
        title -> Varchar,
        description -> Text,
        car_id -> Varchar,
        starting_bid -> Int8,
        current_highest_bid -> Int8,
        bid_count -> Int4,
        start_time -> Timestamptz,
        end_time -> Timestamptz,
        winner_id -> Nullable<Uuid>,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    bids (id) {
        id -> Uuid,
        user_id -> Uuid,
        auction_id -> Uuid,
        amount -> Int8,
        timestamp -> Timestamptz,
        is_winning -> Bool,
        status -> Varchar,
    }
}

diesel::table! {
    bid_audit_log (id) {
        id -> Uuid,
        auction_id -> Uuid,
        user_id -> Uuid,
        amount -> Int8,
        success -> Bool,
        reason -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(users, auctions, bids, bid_audit_log,);
