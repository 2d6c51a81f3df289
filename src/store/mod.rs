mod procedure;
mod schema;
mod sqlite;

pub use procedure::{RejectReason, SignupProcedure, SignupSubmission, SubmitReply};
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Reads that take an `owner_id` only ever return rows belonging to that
/// owner; a project owned by someone else looks exactly like a missing one.
pub trait Store: SignupProcedure {
    fn initialize(&self) -> Result<()>;

    // Owner operations
    fn create_owner(&self, owner: &Owner) -> Result<()>;
    fn get_owner(&self, id: &str) -> Result<Option<Owner>>;
    fn get_owner_by_email(&self, email: &str) -> Result<Option<Owner>>;
    fn has_owner(&self) -> Result<bool>;

    // Magic link operations
    fn create_magic_link(&self, link: &MagicLink) -> Result<()>;
    fn get_magic_link_by_lookup(&self, lookup: &str) -> Result<Option<MagicLink>>;
    /// Marks the link used. Returns false when it was already consumed.
    fn consume_magic_link(&self, id: &str) -> Result<bool>;

    // Session operations
    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>>;
    fn touch_session(&self, id: &str) -> Result<()>;
    fn delete_session(&self, id: &str) -> Result<bool>;

    // Project operations
    /// Fails with `AlreadyExists` when the slug is taken or burned. Burns the slug.
    fn create_project(&self, project: &Project) -> Result<()>;
    fn is_slug_available(&self, slug: &str) -> Result<bool>;
    fn get_project_by_slug(&self, slug: &str) -> Result<Option<Project>>;
    fn get_owned_project(&self, owner_id: &str, id: &str) -> Result<Option<Project>>;
    /// Newest first.
    fn list_owned_projects(&self, owner_id: &str) -> Result<Vec<Project>>;

    // Signup reads (writes go through `SignupProcedure`)
    fn list_project_signups(&self, owner_id: &str, project_id: &str) -> Result<Vec<Signup>>;
    fn list_owner_signups(&self, owner_id: &str) -> Result<Vec<Signup>>;
    fn get_signup_attempt(&self, project_id: &str, ip_address: &str) -> Result<Option<SignupAttempt>>;
}
