//! In-memory relational store.
//!
//! The underlying engine is modeled as a set of plain tables behind a single
//! mutex. The store provides no automatic on-delete cascade: every deletion
//! path in the lifecycle services spells out its own ordered bulk deletes,
//! which keeps the ordering contract visible and testable independent of any
//! particular engine. `Database::transaction` gives each root operation
//! all-or-nothing semantics by mutating a cloned snapshot and swapping it in
//! only on success.

pub mod blobs;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::domain::{
    Account, AccountId, AnswerId, ApplicantProfile, Application, ApplicationId, BlobHandle,
    BookmarkId, DisclosureAnswer, DisclosureQuestion, Organization, OrganizationId, Posting,
    PostingId, ProfileId, QuestionId, SavedBookmark, Skill, SkillId, StaffProfile,
};

/// Every entity and association table in the relational model.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub organizations: BTreeMap<OrganizationId, Organization>,
    /// Organization admin association (many-to-many).
    pub org_admins: BTreeSet<(OrganizationId, AccountId)>,
    pub accounts: BTreeMap<AccountId, Account>,
    pub staff_profiles: BTreeMap<AccountId, StaffProfile>,
    pub applicant_profiles: BTreeMap<ProfileId, ApplicantProfile>,
    pub postings: BTreeMap<PostingId, Posting>,
    /// Posting skill association (many-to-many).
    pub posting_skills: BTreeSet<(PostingId, SkillId)>,
    /// Applicant profile skill association (many-to-many).
    pub profile_skills: BTreeSet<(ProfileId, SkillId)>,
    pub skills: BTreeMap<SkillId, Skill>,
    pub applications: BTreeMap<ApplicationId, Application>,
    pub bookmarks: BTreeMap<BookmarkId, SavedBookmark>,
    pub questions: BTreeMap<QuestionId, DisclosureQuestion>,
    pub answers: BTreeMap<AnswerId, DisclosureAnswer>,
}

impl Tables {
    /// Ids of every application submitted against the given posting.
    pub fn applications_for_posting(&self, posting: &PostingId) -> BTreeSet<ApplicationId> {
        self.applications
            .values()
            .filter(|app| &app.posting == posting)
            .map(|app| app.id.clone())
            .collect()
    }

    /// Ids of every application submitted by the given profile.
    pub fn applications_for_profile(&self, profile: &ProfileId) -> BTreeSet<ApplicationId> {
        self.applications
            .values()
            .filter(|app| &app.profile == profile)
            .map(|app| app.id.clone())
            .collect()
    }

    /// Ids of every posting owned by the given organization.
    pub fn postings_for_organization(&self, organization: &OrganizationId) -> BTreeSet<PostingId> {
        self.postings
            .values()
            .filter(|posting| &posting.organization == organization)
            .map(|posting| posting.id.clone())
            .collect()
    }

    pub fn organization_by_handle(&self, handle: &str) -> Option<&Organization> {
        self.organizations.values().find(|org| org.handle == handle)
    }

    /// The live application, if any, for a (posting, profile) pair. The pair
    /// is unique by construction, so at most one row can match.
    pub fn application_for(
        &self,
        posting: &PostingId,
        profile: &ProfileId,
    ) -> Option<&Application> {
        self.applications
            .values()
            .find(|app| &app.posting == posting && &app.profile == profile)
    }

    /// Whether any live row still references the blob handle. Liveness is a
    /// relational question, so the check lives here rather than in the blob
    /// store; the orphan scan uses it to gate reclamation.
    pub fn blob_in_use(&self, handle: &BlobHandle) -> bool {
        let org_hit = self.organizations.values().any(|org| {
            org.logo.as_ref() == Some(handle) || org.banner.as_ref() == Some(handle)
        });
        let profile_hit = self
            .applicant_profiles
            .values()
            .any(|profile| profile.resume.as_ref() == Some(handle));
        let application_hit = self.applications.values().any(|app| {
            app.resume.as_ref() == Some(handle) || app.cover_letter.as_ref() == Some(handle)
        });
        org_hit || profile_hit || application_hit
    }
}

/// Handle to the shared relational store.
///
/// Ordinary row and table locking from a real engine collapses here into one
/// mutex; no additional application-level locks exist. Transactions clone the
/// table set, run the closure against the clone, and publish it only when the
/// closure succeeds, so a failed cascade commits nothing.
#[derive(Debug, Default)]
pub struct Database {
    tables: Mutex<Tables>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a read-only query against the current committed state.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let tables = self.tables.lock().expect("store mutex poisoned");
        f(&tables)
    }

    /// Run `f` inside an all-or-nothing transaction. On `Ok` the mutated
    /// snapshot replaces the committed state; on `Err` every change is
    /// discarded.
    pub fn transaction<T, E>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        let mut draft = tables.clone();
        let outcome = f(&mut draft)?;
        *tables = draft;
        Ok(outcome)
    }
}
