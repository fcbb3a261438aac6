//! Seed data for development databases: venues, students and enrollments.
//!
//! ```json
//! {
//!   "students": [{ "student_id": "…", "name": "Ada", "department": "CS" }],
//!   "venues":   [{ "venue_id": "…", "name": "Lab 1", "faculty_id": "…",
//!                  "roster": ["…"] }]
//! }
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
  #[serde(default)]
  pub students: Vec<FixtureStudent>,
  #[serde(default)]
  pub venues:   Vec<FixtureVenue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureStudent {
  pub student_id: Uuid,
  pub name:       String,
  #[serde(default)]
  pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureVenue {
  pub venue_id:   Uuid,
  pub name:       String,
  #[serde(default)]
  pub faculty_id: Option<Uuid>,
  /// Student ids enrolled at this venue.
  #[serde(default)]
  pub roster:     Vec<Uuid>,
}

impl Fixture {
  pub fn from_json(s: &str) -> Result<Self> { Ok(serde_json::from_str(s)?) }
}
