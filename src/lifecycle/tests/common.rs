use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::domain::{
    Account, AccountId, AccountRole, ApplicantProfile, Application, BlobHandle,
    DisclosureQuestion, Organization, OrganizationId, Posting, PostingId, PostingStatus,
    ProfileId, QuestionId, StaffProfile,
};
use crate::lifecycle::applications::{ApplicationFiles, NewApplication, ResumeSource};
use crate::lifecycle::{
    Actor, ApplicationService, DeletionService, RetentionPolicy, RetentionSweeper,
};
use crate::storage::blobs::{BlobError, BlobStore, MemoryBlobStore, StoredBlob};
use crate::storage::Database;

/// Fixed evaluation instant so time-sensitive assertions stay deterministic.
pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0)
        .single()
        .expect("valid instant")
}

/// Blob store double whose every call fails, for exercising outage paths.
pub(super) struct UnavailableBlobStore;

impl UnavailableBlobStore {
    fn outage<T>() -> Result<T, BlobError> {
        Err(BlobError::Unavailable("blob backend offline".to_string()))
    }
}

impl BlobStore for UnavailableBlobStore {
    fn upload(&self, _: &[u8], _: &str, _: &str) -> Result<BlobHandle, BlobError> {
        Self::outage()
    }

    fn upload_snapshot(&self, _: &[u8], _: &str, _: &str) -> Result<BlobHandle, BlobError> {
        Self::outage()
    }

    fn fetch(&self, _: &BlobHandle) -> Result<StoredBlob, BlobError> {
        Self::outage()
    }

    fn copy(&self, _: &BlobHandle, _: &str) -> Result<BlobHandle, BlobError> {
        Self::outage()
    }

    fn delete(&self, _: &BlobHandle) -> Result<(), BlobError> {
        Self::outage()
    }

    fn snapshots(&self) -> Result<Vec<BlobHandle>, BlobError> {
        Self::outage()
    }
}

pub(super) struct Fixture {
    pub db: Arc<Database>,
    pub blobs: Arc<MemoryBlobStore>,
    pub applications: ApplicationService<MemoryBlobStore>,
    pub deletion: DeletionService,
    pub sweeper: RetentionSweeper<MemoryBlobStore>,
}

pub(super) fn fixture() -> Fixture {
    let db = Arc::new(Database::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    Fixture {
        applications: ApplicationService::new(db.clone(), blobs.clone()),
        deletion: DeletionService::new(db.clone()),
        sweeper: RetentionSweeper::new(db.clone(), blobs.clone(), RetentionPolicy::default()),
        db,
        blobs,
    }
}

impl Fixture {
    /// Create an organization together with one admin account.
    pub fn seed_organization(&self, name: &str, handle: &str) -> (Organization, Actor) {
        let org = Organization {
            id: OrganizationId::next(),
            name: name.to_string(),
            handle: handle.to_string(),
            logo: None,
            banner: None,
        };
        let admin = Account {
            id: AccountId::next(),
            role: AccountRole::OrgAdmin,
            organization: Some(org.id.clone()),
            created_at: now(),
            updated_at: now(),
        };
        let actor = Actor {
            account: admin.id.clone(),
            role: AccountRole::OrgAdmin,
            organization: Some(org.id.clone()),
        };

        self.db
            .transaction(|tables| {
                tables.organizations.insert(org.id.clone(), org.clone());
                tables
                    .org_admins
                    .insert((org.id.clone(), admin.id.clone()));
                tables.accounts.insert(admin.id.clone(), admin.clone());
                Ok::<_, ()>(())
            })
            .expect("seed organization");

        (org, actor)
    }

    /// Create a staff account with its profile in the given organization.
    pub fn seed_staff(&self, org: &OrganizationId, title: &str) -> Actor {
        let account = Account {
            id: AccountId::next(),
            role: AccountRole::Staff,
            organization: Some(org.clone()),
            created_at: now(),
            updated_at: now(),
        };
        let profile = StaffProfile {
            account: account.id.clone(),
            organization: org.clone(),
            title: title.to_string(),
        };
        let actor = Actor {
            account: account.id.clone(),
            role: AccountRole::Staff,
            organization: Some(org.clone()),
        };

        self.db
            .transaction(|tables| {
                tables.accounts.insert(account.id.clone(), account.clone());
                tables
                    .staff_profiles
                    .insert(profile.account.clone(), profile.clone());
                Ok::<_, ()>(())
            })
            .expect("seed staff");

        actor
    }

    pub fn seed_posting(
        &self,
        org: &OrganizationId,
        author: &Actor,
        deadline: Option<NaiveDate>,
    ) -> Posting {
        let posting = Posting {
            id: PostingId::next(),
            organization: org.clone(),
            posted_by: author.account.clone(),
            title: "Backend Engineer".to_string(),
            status: PostingStatus::Open,
            deadline,
            created_at: now(),
            updated_at: now(),
        };

        self.db
            .transaction(|tables| {
                tables.postings.insert(posting.id.clone(), posting.clone());
                Ok::<_, ()>(())
            })
            .expect("seed posting");

        posting
    }

    pub fn seed_question(&self, posting: &PostingId, prompt: &str) -> QuestionId {
        let question = DisclosureQuestion {
            id: QuestionId::next(),
            posting: posting.clone(),
            prompt: prompt.to_string(),
        };
        let id = question.id.clone();

        self.db
            .transaction(|tables| {
                tables.questions.insert(question.id.clone(), question.clone());
                Ok::<_, ()>(())
            })
            .expect("seed question");

        id
    }

    /// Create an applicant account plus profile, optionally with a primary
    /// resume blob already uploaded.
    pub fn seed_applicant(
        &self,
        name: &str,
        resume: Option<&[u8]>,
    ) -> (ApplicantProfile, Actor) {
        let account = Account {
            id: AccountId::next(),
            role: AccountRole::Applicant,
            organization: None,
            created_at: now(),
            updated_at: now(),
        };
        let resume_handle = resume.map(|bytes| {
            self.blobs
                .upload(bytes, &format!("{name}-resume.pdf"), "application/pdf")
                .expect("resume upload")
        });
        let profile = ApplicantProfile {
            id: ProfileId::next(),
            account: account.id.clone(),
            full_name: name.to_string(),
            resume: resume_handle,
        };
        let actor = Actor {
            account: account.id.clone(),
            role: AccountRole::Applicant,
            organization: None,
        };

        self.db
            .transaction(|tables| {
                tables.accounts.insert(account.id.clone(), account.clone());
                tables
                    .applicant_profiles
                    .insert(profile.id.clone(), profile.clone());
                Ok::<_, ()>(())
            })
            .expect("seed applicant");

        (profile, actor)
    }

    /// Submit a bare application with no files and no answers.
    pub fn submit_simple(
        &self,
        actor: &Actor,
        posting: &PostingId,
        profile: &ProfileId,
    ) -> Application {
        self.applications
            .submit(
                actor,
                NewApplication {
                    posting: posting.clone(),
                    profile: profile.clone(),
                    answers: Vec::new(),
                    files: ApplicationFiles {
                        resume: ResumeSource::None,
                        cover_letter: None,
                    },
                },
                now(),
            )
            .expect("submission succeeds")
    }
}
