//! Rust structs that represent database table mappings.
//!
//! These models define the structure of data as it is stored in and retrieved from
//! SQLite, along with the closed vocabularies (statuses, kinds, categories) the tables
//! store as text. Most of them are serialized directly into API responses; the ones
//! carrying secrets (`UserCredentials`) never are.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::Role;

string_enum! {
    pub enum PropertyKind {
        Apartment => "apartment",
        ParkingSpot => "parking_spot",
    }
}

string_enum! {
    /// How the claimant relates to the property.
    pub enum ClaimRelation {
        Owner => "owner",
        Resident => "resident",
        Tenant => "tenant",
    }
}

impl ClaimRelation {
    /// Role granted when a claim with this relation is approved.
    pub fn granted_role(self) -> Role {
        match self {
            ClaimRelation::Owner => Role::Owner,
            ClaimRelation::Resident => Role::Resident,
            ClaimRelation::Tenant => Role::Tenant,
        }
    }
}

string_enum! {
    pub enum ClaimStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Cancelled => "cancelled",
    }
}

string_enum! {
    pub enum PublicationKind {
        News => "news",
        Event => "event",
        Announcement => "announcement",
    }
}

string_enum! {
    pub enum PublicationStatus {
        Draft => "draft",
        Published => "published",
        Archived => "archived",
    }
}

impl PublicationStatus {
    pub fn can_transition_to(self, next: PublicationStatus) -> bool {
        use PublicationStatus::*;
        matches!(
            (self, next),
            (Draft, Published)
                | (Draft, Archived)
                | (Published, Draft)
                | (Published, Archived)
                | (Archived, Draft)
        )
    }
}

string_enum! {
    pub enum ContactKind {
        Phone => "phone",
        Email => "email",
        Website => "website",
        Address => "address",
        Telegram => "telegram",
    }
}

string_enum! {
    pub enum FeedbackCategory {
        Question => "question",
        Complaint => "complaint",
        Suggestion => "suggestion",
        Other => "other",
    }
}

string_enum! {
    pub enum FeedbackStatus {
        New => "new",
        InProgress => "in_progress",
        Resolved => "resolved",
        Archived => "archived",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub blocked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: i64,
    pub password_hash: String,
    pub blocked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Building {
    pub id: i64,
    pub number: String,
    pub title: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Entrance {
    pub id: i64,
    pub building_id: i64,
    pub number: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Floor {
    pub id: i64,
    pub entrance_id: i64,
    pub number: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Apartment {
    pub id: i64,
    pub floor_id: i64,
    pub number: String,
    pub area: Option<f64>,
    pub rooms: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FloorTree {
    #[serde(flatten)]
    pub floor: Floor,
    pub apartments: Vec<Apartment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntranceTree {
    #[serde(flatten)]
    pub entrance: Entrance,
    pub floors: Vec<FloorTree>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildingTree {
    #[serde(flatten)]
    pub building: Building,
    pub entrances: Vec<EntranceTree>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParkingStructure {
    pub id: i64,
    pub title: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParkingFloor {
    pub id: i64,
    pub structure_id: i64,
    pub number: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParkingSpot {
    pub id: i64,
    pub floor_id: i64,
    pub number: String,
    pub area: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParkingFloorTree {
    #[serde(flatten)]
    pub floor: ParkingFloor,
    pub spots: Vec<ParkingSpot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParkingTree {
    #[serde(flatten)]
    pub structure: ParkingStructure,
    pub floors: Vec<ParkingFloorTree>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Claim {
    pub id: i64,
    pub user_id: i64,
    pub property_kind: PropertyKind,
    pub property_id: i64,
    /// Human readable location, e.g. "Building 2, apt. 41". `None` once the unit is gone.
    pub property_label: Option<String>,
    pub relation: ClaimRelation,
    pub comment: Option<String>,
    pub status: ClaimStatus,
    pub admin_comment: Option<String>,
    pub reviewed_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyLink {
    pub property_kind: PropertyKind,
    pub property_id: i64,
    pub property_label: Option<String>,
    pub relation: ClaimRelation,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Publication {
    pub id: i64,
    pub kind: PublicationKind,
    pub title: String,
    pub slug: String,
    pub content: Value,
    pub excerpt: String,
    pub status: PublicationStatus,
    pub pinned: bool,
    pub cover_media_id: Option<i64>,
    pub event_start: Option<DateTime<Utc>>,
    pub event_end: Option<DateTime<Utc>>,
    pub event_location: Option<String>,
    pub author_id: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Publication {
    /// Site page of the publication: events live under `/events`, everything else
    /// under `/news`.
    pub fn public_url(&self, base_url: &str) -> String {
        let section = match self.kind {
            PublicationKind::Event => "events",
            PublicationKind::News | PublicationKind::Announcement => "news",
        };
        format!("{}/{section}/{}", base_url.trim_end_matches('/'), self.slug)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryContact {
    pub kind: ContactKind,
    pub value: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryEntry {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub description: String,
    pub sort_order: i64,
    pub active: bool,
    pub contacts: Vec<DirectoryContact>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Feedback {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub category: FeedbackCategory,
    pub message: String,
    pub status: FeedbackStatus,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaItem {
    pub id: i64,
    pub file_name: String,
    pub original_name: String,
    pub mime: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<i64>,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub actor_id: Option<i64>,
    pub actor_email: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub maintenance_mode: bool,
    pub maintenance_message: String,
    pub site_title: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            maintenance_mode: false,
            maintenance_message: "The portal is under maintenance. Please come back later."
                .to_string(),
            site_title: "Courtyard".to_string(),
        }
    }
}

/// One-based page request, clamped to sane bounds.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

pub const MAX_PER_PAGE: u32 = 100;

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PageRequest {
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page.clamp(1, MAX_PER_PAGE))
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page.max(1),
            per_page: request.per_page.clamp(1, MAX_PER_PAGE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publication_lifecycle() {
        use PublicationStatus::*;
        assert!(Draft.can_transition_to(Published));
        assert!(Published.can_transition_to(Archived));
        assert!(Archived.can_transition_to(Draft));
        assert!(!Archived.can_transition_to(Published));
        assert!(!Draft.can_transition_to(Draft));
    }

    #[test]
    fn page_request_clamps() {
        let request = PageRequest {
            page: 0,
            per_page: 1000,
        };
        assert_eq!(request.limit(), 100);
        assert_eq!(request.offset(), 0);

        let request = PageRequest {
            page: 3,
            per_page: 10,
        };
        assert_eq!(request.offset(), 20);
    }

    #[test]
    fn enums_use_snake_case_names() {
        assert_eq!(ClaimRelation::parse("tenant"), Some(ClaimRelation::Tenant));
        assert_eq!(FeedbackStatus::InProgress.as_str(), "in_progress");
        assert_eq!(
            serde_json::to_value(PropertyKind::ParkingSpot).unwrap(),
            serde_json::json!("parking_spot")
        );
        assert!(PublicationKind::parse("blog").is_none());
    }
}
