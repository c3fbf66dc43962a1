//! Record accessors
//!
//! Filtered, sorted reads and checked inserts over the reconciled collections. Route
//! handlers and calculation modules go through these instead of the raw store.

use crate::database::{DocumentStore, SortKey};
use crate::error::{RepositoryError, StoreError};
use crate::schema::seeds::COURSES;
use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// USERS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Personal,
    Trader,
    Agent,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Personal => "personal",
            UserRole::Trader => "trader",
            UserRole::Agent => "agent",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "personal" => Some(UserRole::Personal),
            "trader" => Some(UserRole::Trader),
            "agent" => Some(UserRole::Agent),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ha,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ha => "ha",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "en" => Some(Language::En),
            "ha" => Some(Language::Ha),
            _ => None,
        }
    }
}

/// Account as seen by the rest of the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: UserRole,
    pub display_name: String,
    pub is_admin: bool,
    pub setup_complete: bool,
    pub coin_balance: i64,
    pub language: Language,
    pub dark_mode: bool,
}

impl User {
    fn from_document(document: &Document) -> Result<Self, RepositoryError> {
        let invalid = |message: &str| RepositoryError::InvalidData {
            entity: "user",
            message: message.to_string(),
        };
        let id = document
            .get_str("_id")
            .map_err(|_| invalid("_id is missing or not a string"))?
            .to_string();
        let email = document
            .get_str("email")
            .map_err(|_| invalid("email is missing or not a string"))?
            .to_string();
        let flag = |field: &str| document.get_bool(field).unwrap_or(false);

        Ok(Self {
            username: id.clone(),
            display_name: document
                .get_str("display_name")
                .map(str::to_string)
                .unwrap_or_else(|_| id.clone()),
            role: document
                .get_str("role")
                .ok()
                .and_then(UserRole::parse)
                .unwrap_or_default(),
            is_admin: flag("is_admin"),
            setup_complete: flag("setup_complete"),
            coin_balance: document.get("coin_balance").and_then(as_i64).unwrap_or(0),
            language: document
                .get_str("language")
                .ok()
                .and_then(Language::parse)
                .unwrap_or_default(),
            dark_mode: flag("dark_mode"),
            id,
            email,
        })
    }
}

/// Registration input; password hashing happens before this point
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub setup_complete: bool,
    /// Starting balance, 10 coins when unset
    pub coin_balance: Option<i32>,
    pub language: Language,
    pub dark_mode: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub business_details: Option<Document>,
    pub personal_details: Option<Document>,
    pub agent_details: Option<Document>,
}

const DEFAULT_COIN_BALANCE: i32 = 10;

// ============================================================================
// REFERENCE DATA
// ============================================================================

/// Learning hub course, read from the seeded catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub title_key: String,
    pub title_en: String,
    pub title_ha: String,
    pub description_en: String,
    pub description_ha: String,
    #[serde(default)]
    pub is_premium: bool,
}

/// Sorted per-collection listings issued by the request handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    FinancialHealth,
    Budgets,
    Bills,
    NetWorth,
    EmergencyFunds,
    LearningProgress,
    QuizResults,
    NewsArticles,
    TaxRates,
    PaymentLocations,
    TaxReminders,
}

impl Listing {
    pub fn collection(&self) -> &'static str {
        match self {
            Listing::FinancialHealth => "financial_health",
            Listing::Budgets => "budgets",
            Listing::Bills => "bills",
            Listing::NetWorth => "net_worth",
            Listing::EmergencyFunds => "emergency_funds",
            Listing::LearningProgress => "learning_progress",
            Listing::QuizResults => "quiz_results",
            Listing::NewsArticles => "news_articles",
            Listing::TaxRates => "tax_rates",
            Listing::PaymentLocations => "payment_locations",
            Listing::TaxReminders => "tax_reminders",
        }
    }

    pub fn sort(&self) -> Option<SortKey> {
        match self {
            Listing::FinancialHealth
            | Listing::Budgets
            | Listing::NetWorth
            | Listing::EmergencyFunds
            | Listing::QuizResults => Some(SortKey::descending("created_at")),
            Listing::Bills | Listing::TaxReminders => Some(SortKey::ascending("due_date")),
            Listing::NewsArticles => Some(SortKey::descending("published_at")),
            Listing::TaxRates => Some(SortKey::ascending("min_income")),
            Listing::PaymentLocations => Some(SortKey::ascending("name")),
            Listing::LearningProgress => None,
        }
    }
}

// ============================================================================
// REPOSITORY
// ============================================================================

/// Record accessors over the shared database handle
#[derive(Clone)]
pub struct RecordsRepository {
    store: Arc<dyn DocumentStore>,
}

impl RecordsRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    // ==========================================
    // USERS
    // ==========================================

    pub async fn create_user(&self, new_user: NewUser) -> Result<User, RepositoryError> {
        let email = new_user.email.trim().to_lowercase();
        let local_part = match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => local,
            _ => {
                return Err(RepositoryError::InvalidData {
                    entity: "user",
                    message: format!("'{}' is not an email address", new_user.email),
                })
            }
        };
        if new_user.password_hash.is_empty() {
            return Err(RepositoryError::MissingFields {
                entity: "user",
                fields: vec!["password".to_string()],
            });
        }

        let user_id = new_user
            .username
            .as_deref()
            .unwrap_or(local_part)
            .to_lowercase();
        let display_name = new_user.display_name.clone().unwrap_or_else(|| user_id.clone());
        let coin_balance = new_user.coin_balance.unwrap_or(DEFAULT_COIN_BALANCE);
        let created_at = new_user.created_at.unwrap_or_else(Utc::now);

        let document = doc! {
            "_id": user_id.as_str(),
            "email": email.as_str(),
            "password": new_user.password_hash.as_str(),
            "role": new_user.role.as_str(),
            "display_name": display_name.as_str(),
            "is_admin": new_user.is_admin,
            "setup_complete": new_user.setup_complete,
            "coin_balance": coin_balance,
            "language": new_user.language.as_str(),
            "dark_mode": new_user.dark_mode,
            "created_at": bson::DateTime::from_chrono(created_at),
            "business_details": new_user.business_details.map(Bson::Document),
            "personal_details": new_user.personal_details.map(Bson::Document),
            "agent_details": new_user.agent_details.map(Bson::Document),
        };

        match self.store.insert_one("users", document).await {
            Ok(_) => {}
            Err(StoreError::DuplicateKey { message }) => {
                error!("Error creating user {}: duplicate key - {}", user_id, message);
                return Err(RepositoryError::UserExists);
            }
            Err(e) => {
                error!("Error creating user {}: {}", user_id, e);
                return Err(e.into());
            }
        }
        info!("Created user with ID: {}", user_id);

        Ok(User {
            id: user_id.clone(),
            email,
            username: user_id,
            role: new_user.role,
            display_name,
            is_admin: new_user.is_admin,
            setup_complete: new_user.setup_complete,
            coin_balance: i64::from(coin_balance),
            language: new_user.language,
            dark_mode: new_user.dark_mode,
        })
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, RepositoryError> {
        self.find_user(doc! { "_id": user_id }).await
    }

    /// Emails are stored lower-cased; lookups are case-insensitive
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.find_user(doc! { "email": email.trim().to_lowercase() })
            .await
    }

    async fn find_user(&self, filter: Document) -> Result<Option<User>, RepositoryError> {
        let found = self.store.find_one("users", filter.clone()).await.map_err(|e| {
            error!("Error getting user by {}: {}", filter, e);
            RepositoryError::from(e)
        })?;
        found.as_ref().map(User::from_document).transpose()
    }

    // ==========================================
    // LISTINGS
    // ==========================================

    /// Documents of a listing matching `filter`, in the listing's sort order
    pub async fn list(
        &self,
        listing: Listing,
        filter: Document,
    ) -> Result<Vec<Document>, RepositoryError> {
        self.store
            .find(listing.collection(), filter, listing.sort())
            .await
            .map_err(|e| {
                error!("Error getting {}: {}", listing.collection(), e);
                e.into()
            })
    }

    /// Course catalogue without store identifiers, in insertion order
    pub async fn load_courses(&self) -> Result<Vec<Course>, RepositoryError> {
        let documents = self.store.find(COURSES, doc! {}, None).await?;
        documents
            .into_iter()
            .map(|mut document| {
                document.remove("_id");
                bson::from_document::<Course>(document).map_err(|e| RepositoryError::InvalidData {
                    entity: "course",
                    message: e.to_string(),
                })
            })
            .collect()
    }

    // ==========================================
    // CHECKED INSERTS
    // ==========================================

    pub async fn create_feedback(&self, feedback: Document) -> Result<(), RepositoryError> {
        let tool_name = feedback.get_str("tool_name").unwrap_or_default().to_string();
        self.insert_checked(
            "feedback",
            "feedback",
            &["user_id", "tool_name", "rating", "timestamp"],
            feedback,
        )
        .await?;
        info!("Created feedback record for tool: {}", tool_name);
        Ok(())
    }

    /// New articles default to unverified and active
    pub async fn create_news_article(&self, mut article: Document) -> Result<String, RepositoryError> {
        if !article.contains_key("is_verified") {
            article.insert("is_verified", false);
        }
        if !article.contains_key("is_active") {
            article.insert("is_active", true);
        }
        self.insert_checked(
            "news article",
            "news_articles",
            &["title", "content", "source_type", "published_at"],
            article,
        )
        .await
    }

    pub async fn create_tax_rate(&self, tax_rate: Document) -> Result<String, RepositoryError> {
        self.insert_checked(
            "tax rate",
            "tax_rates",
            &["role", "min_income", "max_income", "rate", "description"],
            tax_rate,
        )
        .await
    }

    pub async fn create_payment_location(
        &self,
        location: Document,
    ) -> Result<String, RepositoryError> {
        self.insert_checked(
            "payment location",
            "payment_locations",
            &["name", "address", "contact"],
            location,
        )
        .await
    }

    pub async fn create_tax_reminder(&self, reminder: Document) -> Result<String, RepositoryError> {
        self.insert_checked(
            "tax reminder",
            "tax_reminders",
            &["user_id", "tax_type", "due_date", "amount", "status", "created_at"],
            reminder,
        )
        .await
    }

    /// Record a tool usage event. Failures are logged and dropped.
    pub async fn log_tool_usage(
        &self,
        tool_name: &str,
        user_id: Option<&str>,
        session_id: Option<&str>,
        action: Option<&str>,
    ) {
        let usage = doc! {
            "tool_name": tool_name,
            "user_id": user_id,
            "session_id": session_id,
            "action": action,
            "timestamp": bson::DateTime::from_chrono(Utc::now()),
        };
        match self.store.insert_one("tool_usage", usage).await {
            Ok(_) => info!("Logged tool usage: {} - {}", tool_name, action.unwrap_or("")),
            Err(e) => error!("Error logging tool usage for {}: {}", tool_name, e),
        }
    }

    async fn insert_checked(
        &self,
        entity: &'static str,
        collection: &str,
        required: &[&str],
        document: Document,
    ) -> Result<String, RepositoryError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|field| !document.contains_key(**field))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            error!("Missing required {} fields: {}", entity, missing.join(", "));
            return Err(RepositoryError::MissingFields {
                entity,
                fields: missing,
            });
        }

        let id = self
            .store
            .insert_one(collection, document)
            .await
            .map_err(|e| {
                error!("Error creating {}: {}", entity, e);
                RepositoryError::from(e)
            })?;
        let id = id_to_string(&id);
        info!("Created {} with ID: {}", entity, id);
        Ok(id)
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        _ => None,
    }
}

fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use record_types::IndexSpec;

    fn repository() -> (Arc<MemoryStore>, RecordsRepository) {
        let store = Arc::new(MemoryStore::new("minirecords"));
        let repository = RecordsRepository::new(store.clone());
        (store, repository)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "pbkdf2:sha256:600000$salt$hash".to_string(),
            ..NewUser::default()
        }
    }

    #[tokio::test]
    async fn test_create_user_defaults() {
        let (_, repository) = repository();
        let user = repository.create_user(new_user("Amina.Bello@Example.ng")).await.unwrap();
        assert_eq!(user.id, "amina.bello");
        assert_eq!(user.email, "amina.bello@example.ng");
        assert_eq!(user.display_name, "amina.bello");
        assert_eq!(user.role, UserRole::Personal);
        assert_eq!(user.coin_balance, 10);
        assert_eq!(user.language, Language::En);

        let fetched = repository
            .get_user_by_email("AMINA.BELLO@example.ng")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, user);
        assert_eq!(repository.get_user("amina.bello").await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn test_duplicate_user_rejected() {
        let (store, repository) = repository();
        store
            .create_index("users", &IndexSpec::ascending("email").unique())
            .await
            .unwrap();
        repository.create_user(new_user("bala@example.ng")).await.unwrap();

        let err = repository
            .create_user(NewUser {
                username: Some("bala2".into()),
                ..new_user("bala@example.ng")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UserExists));
    }

    #[tokio::test]
    async fn test_create_user_requires_email_and_password() {
        let (_, repository) = repository();
        assert!(matches!(
            repository.create_user(new_user("not-an-email")).await.unwrap_err(),
            RepositoryError::InvalidData { .. }
        ));
        let mut no_password = new_user("c@example.ng");
        no_password.password_hash.clear();
        assert!(matches!(
            repository.create_user(no_password).await.unwrap_err(),
            RepositoryError::MissingFields { .. }
        ));
    }

    #[tokio::test]
    async fn test_user_read_falls_back_to_defaults() {
        let (store, repository) = repository();
        store
            .insert_one(
                "users",
                doc! { "_id": "legacy", "email": "legacy@example.ng", "password": "x", "role": "trader" },
            )
            .await
            .unwrap();
        let user = repository.get_user("legacy").await.unwrap().unwrap();
        assert_eq!(user.role, UserRole::Trader);
        assert_eq!(user.display_name, "legacy");
        assert_eq!(user.coin_balance, 0);
        assert!(!user.is_admin);
        assert!(repository.get_user("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listing_sorts() {
        let (_, repository) = repository();
        for (name, due) in [("rent", 3), ("power", 1), ("water", 2)] {
            repository
                .store
                .insert_one("bills", doc! { "user_id": "u1", "bill_name": name, "due_date": due })
                .await
                .unwrap();
        }
        let bills = repository.list(Listing::Bills, doc! { "user_id": "u1" }).await.unwrap();
        let names: Vec<&str> = bills.iter().map(|b| b.get_str("bill_name").unwrap()).collect();
        assert_eq!(names, vec!["power", "water", "rent"]);

        for (title, published) in [("old", 1), ("new", 9)] {
            repository
                .store
                .insert_one("news_articles", doc! { "title": title, "published_at": published })
                .await
                .unwrap();
        }
        let articles = repository.list(Listing::NewsArticles, doc! {}).await.unwrap();
        assert_eq!(articles[0].get_str("title").unwrap(), "new");
    }

    #[tokio::test]
    async fn test_checked_insert_reports_missing_fields() {
        let (store, repository) = repository();
        let err = repository
            .create_tax_rate(doc! { "role": "personal", "rate": 0.1 })
            .await
            .unwrap_err();
        match err {
            RepositoryError::MissingFields { entity, fields } => {
                assert_eq!(entity, "tax rate");
                assert_eq!(fields, vec!["min_income", "max_income", "description"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.count_documents("tax_rates").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_news_article_defaults() {
        let (store, repository) = repository();
        let id = repository
            .create_news_article(doc! {
                "title": "Budget 2026",
                "content": "...",
                "source_type": "government",
                "published_at": bson::DateTime::now(),
            })
            .await
            .unwrap();
        assert_eq!(id.len(), 24);
        let stored = store.find_one("news_articles", doc! {}).await.unwrap().unwrap();
        assert_eq!(stored.get_bool("is_verified").unwrap(), false);
        assert_eq!(stored.get_bool("is_active").unwrap(), true);
    }

    #[tokio::test]
    async fn test_tool_usage_failure_is_swallowed() {
        let (store, repository) = repository();
        store.reject_writes_to("tool_usage").await;
        repository
            .log_tool_usage("budget", Some("u1"), None, Some("submit"))
            .await;
        assert_eq!(store.count_documents("tool_usage").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_feedback_requires_fields() {
        let (_, repository) = repository();
        let err = repository
            .create_feedback(doc! { "user_id": "u1", "tool_name": "budget" })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rating, timestamp"));
    }
}
