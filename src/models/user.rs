//! Student profile as returned by the auth endpoints.

use serde::{Deserialize, Serialize};

/// Student record on the wire (`/auth/login`, `/auth/me`).
#[derive(Debug, Clone, Deserialize)]
pub struct Student {
    #[serde(alias = "_id")]
    pub id: String,
    pub matric_no: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub college: String,
    #[serde(default)]
    pub level: String,
    /// Sessions the student has already voted in
    #[serde(default)]
    pub has_voted_sessions: Vec<String>,
    #[serde(default)]
    pub first_login: bool,
}

/// Signed-in user held by the auth session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub matric_no: String,
    pub department: String,
    pub college: String,
    pub level: String,
}

impl From<Student> for User {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            email: student.email,
            name: student.full_name,
            matric_no: student.matric_no,
            department: student.department,
            college: student.college,
            level: student.level,
        }
    }
}
