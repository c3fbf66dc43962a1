//! Declared shape of the records database

use record_types::{BsonType, CollectionSpec, FieldRule, IndexKey, IndexSpec, Validator};

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$";

/// Every application collection, in reconciliation order
pub fn declared_collections() -> Vec<CollectionSpec> {
    vec![
        users(),
        records(),
        cashflows(),
        inventory(),
        coin_transactions(),
        audit_logs(),
    ]
}

fn users() -> CollectionSpec {
    use BsonType::*;

    let business_details = FieldRule::nullable("business_details", Object).with_properties(vec![
        FieldRule::typed("name", String),
        FieldRule::typed("address", String),
        FieldRule::typed("industry", String),
        FieldRule::typed("products_services", String),
        FieldRule::typed("phone_number", String),
    ]);
    let personal_details = FieldRule::nullable("personal_details", Object).with_properties(vec![
        FieldRule::typed("first_name", String),
        FieldRule::typed("last_name", String),
        FieldRule::typed("phone_number", String),
        FieldRule::typed("address", String),
    ]);
    let agent_details = FieldRule::nullable("agent_details", Object).with_properties(vec![
        FieldRule::typed("agent_name", String),
        FieldRule::typed("agent_id", String),
        FieldRule::typed("area", String),
        FieldRule::typed("role", String),
        FieldRule::typed("email", String),
        FieldRule::typed("phone", String),
    ]);

    CollectionSpec::new(
        "users",
        Validator::new(
            &["_id", "email", "password", "role"],
            vec![
                FieldRule::typed("_id", String),
                FieldRule::typed("email", String).with_pattern(EMAIL_PATTERN),
                FieldRule::typed("password", String),
                FieldRule::one_of("role", &["personal", "trader", "agent", "admin"]),
                FieldRule::typed("coin_balance", Int).with_minimum(0.0),
                FieldRule::one_of("language", &["en", "ha"]),
                FieldRule::typed("created_at", Date),
                FieldRule::nullable("display_name", String),
                FieldRule::typed("is_admin", Bool),
                FieldRule::typed("setup_complete", Bool),
                FieldRule::nullable("reset_token", String),
                FieldRule::nullable("reset_token_expiry", Date),
                FieldRule::nullable("otp", String),
                FieldRule::nullable("otp_expiry", Date),
                business_details,
                personal_details,
                agent_details,
            ],
        ),
        vec![
            IndexSpec::ascending("email").unique(),
            IndexSpec::ascending("reset_token").sparse(),
            IndexSpec::ascending("role"),
        ],
    )
}

fn records() -> CollectionSpec {
    use BsonType::*;

    CollectionSpec::new(
        "records",
        Validator::new(
            &["user_id", "type", "name", "amount_owed"],
            vec![
                FieldRule::typed("user_id", String),
                FieldRule::one_of("type", &["debtor", "creditor"]),
                FieldRule::typed("name", String),
                FieldRule::nullable("contact", String),
                FieldRule::typed("amount_owed", Number).with_minimum(0.0),
                FieldRule::nullable("description", String),
                FieldRule::typed("reminder_count", Int).with_minimum(0.0),
                FieldRule::typed("created_at", Date),
                FieldRule::nullable("updated_at", Date),
            ],
        ),
        owner_and_recency_indexes(),
    )
}

fn cashflows() -> CollectionSpec {
    use BsonType::*;

    CollectionSpec::new(
        "cashflows",
        Validator::new(
            &["user_id", "type", "party_name", "amount"],
            vec![
                FieldRule::typed("user_id", String),
                FieldRule::one_of("type", &["receipt", "payment"]),
                FieldRule::typed("party_name", String),
                FieldRule::typed("amount", Number).with_minimum(0.0),
                FieldRule::nullable("method", String),
                FieldRule::nullable("category", String),
                FieldRule::typed("created_at", Date),
                FieldRule::nullable("updated_at", Date),
            ],
        ),
        owner_and_recency_indexes(),
    )
}

/// `(user_id, type)` for per-tenant listings, `created_at` descending for recency
fn owner_and_recency_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::ascending("user_id").then(IndexKey::ascending("type")),
        IndexSpec::descending("created_at"),
    ]
}

fn inventory() -> CollectionSpec {
    use BsonType::*;

    CollectionSpec::new(
        "inventory",
        Validator::new(
            &["user_id", "item_name", "qty", "unit", "buying_price", "selling_price"],
            vec![
                FieldRule::typed("user_id", String),
                FieldRule::typed("item_name", String),
                FieldRule::typed("qty", Int).with_minimum(0.0),
                FieldRule::typed("unit", String),
                FieldRule::typed("buying_price", Number).with_minimum(0.0),
                FieldRule::typed("selling_price", Number).with_minimum(0.0),
                FieldRule::typed("threshold", Int).with_minimum(0.0),
                FieldRule::typed("created_at", Date),
                FieldRule::nullable("updated_at", Date),
            ],
        ),
        vec![
            IndexSpec::ascending("user_id"),
            IndexSpec::ascending("item_name"),
        ],
    )
}

fn coin_transactions() -> CollectionSpec {
    use BsonType::*;

    CollectionSpec::new(
        "coin_transactions",
        Validator::new(
            &["user_id", "amount", "type", "date"],
            vec![
                FieldRule::typed("user_id", String),
                FieldRule::typed("amount", Int),
                FieldRule::one_of("type", &["credit", "spend", "purchase", "admin_credit"]),
                FieldRule::nullable("ref", String),
                FieldRule::typed("date", Date),
                FieldRule::nullable("facilitated_by_agent", String),
                FieldRule::nullable("payment_method", String),
                FieldRule::nullable("cash_amount", Number),
                FieldRule::nullable("notes", String),
            ],
        ),
        vec![
            IndexSpec::ascending("user_id"),
            IndexSpec::descending("date"),
        ],
    )
}

fn audit_logs() -> CollectionSpec {
    use BsonType::*;

    CollectionSpec::new(
        "audit_logs",
        Validator::new(
            &["admin_id", "action", "timestamp"],
            vec![
                FieldRule::typed("admin_id", String),
                FieldRule::typed("action", String),
                FieldRule::nullable("details", Object),
                FieldRule::typed("timestamp", Date),
            ],
        ),
        vec![
            IndexSpec::ascending("admin_id"),
            IndexSpec::descending("timestamp"),
        ],
    )
}
