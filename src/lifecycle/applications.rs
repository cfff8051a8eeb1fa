//! Application intake and lifecycle transitions.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{
    AccountRole, AnswerId, Application, ApplicationId, ApplicationStatus, BlobHandle,
    BookmarkId, DisclosureAnswer, PostingId, ProfileId, QuestionId, SavedBookmark,
};
use crate::storage::blobs::BlobStore;
use crate::storage::Database;

use super::{Actor, ConflictKind, LifecycleError};

/// A file carried on an intake request.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub bytes: Vec<u8>,
    pub name: String,
    pub content_type: String,
}

/// Where the application's resume comes from.
///
/// `ProfileResume` never stores the profile's raw handle on the application:
/// the profile copy is mutable and independently deletable, so the service
/// snapshots it and the application keeps the snapshot handle.
#[derive(Debug, Clone)]
pub enum ResumeSource {
    Upload(FileUpload),
    ProfileResume,
    None,
}

/// Files attached to an intake request.
#[derive(Debug, Clone)]
pub struct ApplicationFiles {
    pub resume: ResumeSource,
    pub cover_letter: Option<FileUpload>,
}

/// Intake payload, already shape-validated by the request layer.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub posting: PostingId,
    pub profile: ProfileId,
    pub answers: Vec<(QuestionId, String)>,
    pub files: ApplicationFiles,
}

/// Service owning application creation and status transitions.
pub struct ApplicationService<B> {
    db: Arc<Database>,
    blobs: Arc<B>,
}

impl<B: BlobStore> ApplicationService<B> {
    pub fn new(db: Arc<Database>, blobs: Arc<B>) -> Self {
        Self { db, blobs }
    }

    /// Create an application. Guards run before any mutation; blob writes
    /// happen before the relational transaction, so a failed commit strands
    /// at most a snapshot blob for the orphan scan to reclaim.
    pub fn submit(
        &self,
        actor: &Actor,
        request: NewApplication,
        now: DateTime<Utc>,
    ) -> Result<Application, LifecycleError> {
        let profile_resume = self.db.read(|tables| {
            let profile = tables
                .applicant_profiles
                .get(&request.profile)
                .ok_or(LifecycleError::NotFound("applicant profile"))?;
            if actor.account != profile.account || actor.role != AccountRole::Applicant {
                return Err(LifecycleError::Forbidden("apply on behalf of this profile"));
            }

            let posting = tables
                .postings
                .get(&request.posting)
                .ok_or(LifecycleError::NotFound("posting"))?;
            // The deadline is checked only at creation; status updates on an
            // existing application are staff actions and stay permitted.
            if let Some(deadline) = posting.deadline {
                if deadline < now.date_naive() {
                    return Err(ConflictKind::DeadlinePassed.into());
                }
            }

            if let Some(existing) = tables.application_for(&request.posting, &request.profile) {
                let conflict = if existing.status.is_terminal() {
                    ConflictKind::AlreadyWithdrawn
                } else {
                    ConflictKind::AlreadyApplied
                };
                return Err(conflict.into());
            }

            for (question, _) in &request.answers {
                let owned = tables
                    .questions
                    .get(question)
                    .is_some_and(|q| q.posting == request.posting);
                if !owned {
                    return Err(LifecycleError::Integrity(format!(
                        "answer targets question {question} outside posting {}",
                        request.posting
                    )));
                }
            }

            Ok(profile.resume.clone())
        })?;

        let id = ApplicationId::next();
        let resume = self.resolve_resume(&id, request.files.resume, profile_resume)?;
        // Application-scoped files are snapshot uploads so the orphan scan
        // can reclaim them after the application is cascaded away.
        let cover_letter = match request.files.cover_letter {
            Some(file) => Some(
                self.blobs
                    .upload_snapshot(&file.bytes, &file.name, &file.content_type)?,
            ),
            None => None,
        };

        let application = Application {
            id: id.clone(),
            posting: request.posting.clone(),
            profile: request.profile.clone(),
            status: ApplicationStatus::Submitted,
            resume,
            cover_letter,
            created_at: now,
            updated_at: now,
        };

        self.db.transaction(|tables| {
            // Re-check the unique pair under the write lock in case a
            // concurrent submit landed after the guard phase.
            if let Some(existing) = tables.application_for(&request.posting, &request.profile) {
                let conflict = if existing.status.is_terminal() {
                    ConflictKind::AlreadyWithdrawn
                } else {
                    ConflictKind::AlreadyApplied
                };
                return Err(LifecycleError::Conflict(conflict));
            }

            tables
                .applications
                .insert(application.id.clone(), application.clone());
            for (question, response) in &request.answers {
                let answer = DisclosureAnswer {
                    id: AnswerId::next(),
                    application: application.id.clone(),
                    question: question.clone(),
                    response: response.clone(),
                };
                tables.answers.insert(answer.id.clone(), answer);
            }
            Ok(application.clone())
        })
    }

    fn resolve_resume(
        &self,
        application: &ApplicationId,
        source: ResumeSource,
        profile_resume: Option<BlobHandle>,
    ) -> Result<Option<BlobHandle>, LifecycleError> {
        match source {
            ResumeSource::Upload(file) => Ok(Some(self.blobs.upload_snapshot(
                &file.bytes,
                &file.name,
                &file.content_type,
            )?)),
            ResumeSource::ProfileResume => {
                let handle =
                    profile_resume.ok_or(LifecycleError::NotFound("profile resume"))?;
                let snapshot = self
                    .blobs
                    .copy(&handle, &format!("{application}-resume"))?;
                Ok(Some(snapshot))
            }
            ResumeSource::None => Ok(None),
        }
    }

    /// Staff-triggered move between `Shortlisted` and `Rejected` (either
    /// direction, re-enterable). Stamps `updated_at`.
    pub fn transition(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        status: ApplicationStatus,
        now: DateTime<Utc>,
    ) -> Result<Application, LifecycleError> {
        self.db.transaction(|tables| {
            let application = tables
                .applications
                .get(id)
                .cloned()
                .ok_or(LifecycleError::NotFound("application"))?;
            let posting = tables.postings.get(&application.posting).ok_or_else(|| {
                LifecycleError::Integrity(format!(
                    "application {id} references missing posting {}",
                    application.posting
                ))
            })?;

            let staff_of_org = matches!(actor.role, AccountRole::Staff | AccountRole::OrgAdmin)
                && actor.belongs_to(&posting.organization);
            if !staff_of_org {
                return Err(LifecycleError::Forbidden(
                    "review applications for this posting",
                ));
            }

            if application.status.is_terminal() {
                return Err(ConflictKind::AlreadyWithdrawn.into());
            }
            if !application.status.staff_can_enter(status) {
                return Err(LifecycleError::Forbidden("make this status transition"));
            }

            let entry = tables
                .applications
                .get_mut(id)
                .ok_or(LifecycleError::NotFound("application"))?;
            entry.status = status;
            entry.updated_at = now;
            Ok(entry.clone())
        })
    }

    /// Applicant-triggered withdrawal. Terminal: the (posting, profile) pair
    /// stays permanently blocked from re-applying. Withdrawing twice is a
    /// no-op success.
    pub fn withdraw(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        now: DateTime<Utc>,
    ) -> Result<Application, LifecycleError> {
        self.db.transaction(|tables| {
            let application = tables
                .applications
                .get(id)
                .cloned()
                .ok_or(LifecycleError::NotFound("application"))?;
            let profile = tables
                .applicant_profiles
                .get(&application.profile)
                .ok_or_else(|| {
                    LifecycleError::Integrity(format!(
                        "application {id} references missing profile {}",
                        application.profile
                    ))
                })?;
            if actor.account != profile.account {
                return Err(LifecycleError::Forbidden("withdraw this application"));
            }

            if application.status.is_terminal() {
                return Ok(application);
            }

            let entry = tables
                .applications
                .get_mut(id)
                .ok_or(LifecycleError::NotFound("application"))?;
            entry.status = ApplicationStatus::Withdrawn;
            entry.updated_at = now;
            Ok(entry.clone())
        })
    }

    /// Save a posting for later viewing. Unique per (profile, posting).
    pub fn bookmark(
        &self,
        actor: &Actor,
        profile: &ProfileId,
        posting: &PostingId,
        now: DateTime<Utc>,
    ) -> Result<SavedBookmark, LifecycleError> {
        self.db.transaction(|tables| {
            let owner = tables
                .applicant_profiles
                .get(profile)
                .ok_or(LifecycleError::NotFound("applicant profile"))?;
            if actor.account != owner.account {
                return Err(LifecycleError::Forbidden("bookmark for this profile"));
            }
            if !tables.postings.contains_key(posting) {
                return Err(LifecycleError::NotFound("posting"));
            }
            let duplicate = tables
                .bookmarks
                .values()
                .any(|b| &b.profile == profile && &b.posting == posting);
            if duplicate {
                return Err(ConflictKind::DuplicateBookmark.into());
            }

            let bookmark = SavedBookmark {
                id: BookmarkId::next(),
                profile: profile.clone(),
                posting: posting.clone(),
                created_at: now,
            };
            tables.bookmarks.insert(bookmark.id.clone(), bookmark.clone());
            Ok(bookmark)
        })
    }
}
