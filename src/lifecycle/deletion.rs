//! Deletion orchestrator: one idempotent entry point per root entity.
//!
//! The store provides no automatic cascade, so each entry point runs a fixed
//! top-down-by-dependency sequence of set-based bulk deletes inside a single
//! transaction. The ordering is load-bearing: a relational engine raises a
//! foreign-key error when a referenced row disappears first. Absent targets
//! are no-op successes because every step is a "delete where matching" over a
//! possibly-empty set.
//!
//! File blobs referenced by cascaded-away rows are intentionally left alone;
//! the retention sweeper's orphan scan reclaims them (delete eagerly, reclaim
//! lazily).

use std::sync::Arc;

use tracing::info;

use crate::domain::{AccountId, AccountRole, PostingId, ProfileId};
use crate::storage::{Database, Tables};

use super::{Actor, LifecycleError};

/// Remove a posting and every row that references it, in dependency order:
/// disclosure answers, disclosure questions, applications, bookmarks, skill
/// association rows, then the posting row itself.
pub(crate) fn cascade_posting(tables: &mut Tables, posting: &PostingId) {
    let applications = tables.applications_for_posting(posting);
    tables
        .answers
        .retain(|_, answer| !applications.contains(&answer.application));
    tables.questions.retain(|_, question| &question.posting != posting);
    tables
        .applications
        .retain(|_, application| &application.posting != posting);
    tables.bookmarks.retain(|_, bookmark| &bookmark.posting != posting);
    tables.posting_skills.retain(|(p, _)| p != posting);
    tables.postings.remove(posting);
}

/// Service owning every cascading deletion path.
pub struct DeletionService {
    db: Arc<Database>,
}

impl DeletionService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Delete a posting and its dependents. Allowed for an admin of the
    /// owning organization or the authoring staff account.
    pub fn delete_posting(
        &self,
        actor: &Actor,
        id: &PostingId,
    ) -> Result<(), LifecycleError> {
        self.db.transaction(|tables| {
            let Some(posting) = tables.postings.get(id).cloned() else {
                return Ok(());
            };

            let admin = actor.role == AccountRole::OrgAdmin
                && actor.belongs_to(&posting.organization);
            let author = actor.role == AccountRole::Staff
                && actor.account == posting.posted_by
                && actor.belongs_to(&posting.organization);
            if !(admin || author) {
                return Err(LifecycleError::Forbidden("delete this posting"));
            }

            cascade_posting(tables, id);
            info!(posting = %id, "posting deleted");
            Ok(())
        })
    }

    /// Delete a staff member: the full posting cascade for everything they
    /// authored, then their staff profile, then the account row. The caller
    /// must belong to the same organization, and organization admins cannot
    /// be deleted through this path.
    pub fn delete_staff(
        &self,
        actor: &Actor,
        id: &AccountId,
    ) -> Result<(), LifecycleError> {
        self.db.transaction(|tables| {
            let Some(target) = tables.accounts.get(id).cloned() else {
                return Ok(());
            };

            if target.role == AccountRole::OrgAdmin {
                return Err(LifecycleError::Forbidden(
                    "delete an organization admin as staff",
                ));
            }
            if target.role != AccountRole::Staff {
                return Err(LifecycleError::Forbidden("delete a non-staff account"));
            }
            let organization = target.organization.clone().ok_or_else(|| {
                LifecycleError::Integrity(format!("staff account {id} has no organization"))
            })?;
            if !actor.belongs_to(&organization) {
                return Err(LifecycleError::Forbidden(
                    "delete staff of another organization",
                ));
            }

            let authored: Vec<PostingId> = tables
                .postings
                .values()
                .filter(|posting| &posting.posted_by == id)
                .map(|posting| posting.id.clone())
                .collect();
            for posting in &authored {
                cascade_posting(tables, posting);
            }

            tables.staff_profiles.remove(id);
            tables.accounts.remove(id);
            info!(account = %id, postings = authored.len(), "staff member deleted");
            Ok(())
        })
    }

    /// Delete an organization and everything it owns, in ten ordered
    /// set-based steps scoped by organization id. Allowed only for an admin
    /// of that organization.
    pub fn delete_organization(
        &self,
        actor: &Actor,
        handle: &str,
    ) -> Result<(), LifecycleError> {
        self.db.transaction(|tables| {
            let Some(org) = tables.organization_by_handle(handle).cloned() else {
                return Ok(());
            };

            let is_admin = tables
                .org_admins
                .contains(&(org.id.clone(), actor.account.clone()));
            if !is_admin {
                return Err(LifecycleError::Forbidden("delete this organization"));
            }

            let postings = tables.postings_for_organization(&org.id);
            let applications: std::collections::BTreeSet<_> = tables
                .applications
                .values()
                .filter(|app| postings.contains(&app.posting))
                .map(|app| app.id.clone())
                .collect();

            tables
                .answers
                .retain(|_, answer| !applications.contains(&answer.application));
            tables
                .applications
                .retain(|_, app| !postings.contains(&app.posting));
            tables
                .bookmarks
                .retain(|_, bookmark| !postings.contains(&bookmark.posting));
            tables
                .posting_skills
                .retain(|(posting, _)| !postings.contains(posting));
            tables
                .questions
                .retain(|_, question| !postings.contains(&question.posting));
            tables
                .postings
                .retain(|_, posting| posting.organization != org.id);
            tables
                .staff_profiles
                .retain(|_, profile| profile.organization != org.id);
            tables.accounts.retain(|_, account| {
                !(account.role == AccountRole::Staff
                    && account.organization.as_ref() == Some(&org.id))
            });
            // Surviving admin accounts would otherwise keep a dangling
            // organization reference.
            for account in tables.accounts.values_mut() {
                if account.organization.as_ref() == Some(&org.id) {
                    account.organization = None;
                }
            }
            tables.org_admins.retain(|(o, _)| o != &org.id);
            tables.organizations.remove(&org.id);

            info!(
                organization = %org.id,
                handle,
                postings = postings.len(),
                "organization deleted"
            );
            Ok(())
        })
    }

    /// Delete an applicant profile together with its applications, their
    /// disclosure answers, its bookmarks, and its skill association rows.
    /// Allowed only for the owning account.
    pub fn delete_applicant_profile(
        &self,
        actor: &Actor,
        id: &ProfileId,
    ) -> Result<(), LifecycleError> {
        self.db.transaction(|tables| {
            let Some(profile) = tables.applicant_profiles.get(id).cloned() else {
                return Ok(());
            };
            if actor.account != profile.account {
                return Err(LifecycleError::Forbidden("delete this applicant profile"));
            }

            let applications = tables.applications_for_profile(id);
            tables
                .answers
                .retain(|_, answer| !applications.contains(&answer.application));
            tables
                .applications
                .retain(|_, app| !applications.contains(&app.id));
            tables.bookmarks.retain(|_, bookmark| &bookmark.profile != id);
            tables.profile_skills.retain(|(profile, _)| profile != id);
            tables.applicant_profiles.remove(id);

            info!(profile = %id, applications = applications.len(), "applicant profile deleted");
            Ok(())
        })
    }
}
