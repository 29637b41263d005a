//! # StudyForge Domain Models
//!
//! Types shared between the study service and its tests.
//!
//! ## Key Models
//!
//! - **DocumentFormat** / **UploadedDocument**: what a client uploaded and how it will be read
//! - **StudyArtifact**: summary, flashcards, quiz and study guide produced for a document
//! - **Request/response bodies** for the question, flashcard, quiz and explanation endpoints
//!
//! Request bodies derive `validator::Validate`; blank required fields fail validation
//! rather than deserialization so every client mistake surfaces as a 400.

pub mod artifact;
pub mod document;
pub mod requests;


pub use artifact::*;
pub use document::*;
pub use requests::*;
