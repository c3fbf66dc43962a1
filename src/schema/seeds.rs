//! Canonical reference data for the seeded collections
//!
//! These sets are inserted only into empty collections. Editing them after a
//! deployment has seeded does not change already-populated data.

use bson::{doc, Document};

/// Reference documents for one collection
#[derive(Debug, Clone, PartialEq)]
pub struct SeedSet {
    pub collection: String,
    pub documents: Vec<Document>,
}

impl SeedSet {
    pub fn new(collection: impl Into<String>, documents: Vec<Document>) -> Self {
        Self {
            collection: collection.into(),
            documents,
        }
    }
}

pub const COURSES: &str = "courses";
pub const TAX_RATES: &str = "tax_rates";
pub const PAYMENT_LOCATIONS: &str = "payment_locations";

/// Seeded collections, in seeding order
pub fn declared_seed_sets() -> Vec<SeedSet> {
    vec![
        SeedSet::new(COURSES, courses()),
        SeedSet::new(TAX_RATES, tax_rates()),
        SeedSet::new(PAYMENT_LOCATIONS, payment_locations()),
    ]
}

fn courses() -> Vec<Document> {
    vec![
        doc! {
            "id": "budgeting_learning_101",
            "title_key": "learning_hub_course_budgeting101_title",
            "title_en": "Budgeting Learning 101",
            "title_ha": "Tsarin Kudi 101",
            "description_en": "Learn the basics of budgeting.",
            "description_ha": "Koyon asalin tsarin kudi.",
            "is_premium": false,
        },
        doc! {
            "id": "financial_quiz",
            "title_key": "learning_hub_course_financial_quiz_title",
            "title_en": "Financial Quiz",
            "title_ha": "Jarabawar Kudi",
            "description_en": "Test your financial knowledge.",
            "description_ha": "Gwada ilimin ku na kudi.",
            "is_premium": false,
        },
        doc! {
            "id": "savings_basics",
            "title_key": "learning_hub_course_savings_basics_title",
            "title_en": "Savings Basics",
            "title_ha": "Asalin Tattara Kudi",
            "description_en": "Understand how to save effectively.",
            "description_ha": "Fahimci yadda ake tattara kudi yadda ya kamata.",
            "is_premium": false,
        },
    ]
}

fn tax_rates() -> Vec<Document> {
    vec![
        doc! {
            "role": "personal",
            "min_income": 0,
            "max_income": 100_000,
            "rate": 0.1,
            "description": "10% tax for income up to 100,000",
        },
        doc! {
            "role": "trader",
            "min_income": 0,
            "max_income": 500_000,
            "rate": 0.15,
            "description": "15% tax for turnover up to 500,000",
        },
    ]
}

fn payment_locations() -> Vec<Document> {
    vec![doc! {
        "name": "Gombe State IRS Office",
        "address": "123 Tax Street, Gombe",
        "contact": "+234 123 456 7890",
        "coordinates": { "lat": 10.2896, "lng": 11.1673 },
    }]
}
