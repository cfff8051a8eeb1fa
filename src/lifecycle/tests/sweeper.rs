use chrono::Duration;

use super::common::{fixture, now};
use crate::domain::ApplicationStatus;
use crate::lifecycle::applications::{ApplicationFiles, FileUpload, NewApplication, ResumeSource};
use crate::storage::blobs::{BlobError, BlobStore};

#[test]
fn withdrawn_purge_honors_the_retention_window() {
    let f = fixture();
    let (org, admin) = f.seed_organization("Acme", "acme");
    let posting = f.seed_posting(&org.id, &admin, None);
    let question = f.seed_question(&posting.id, "Able to relocate?");
    let (profile, applicant) = f.seed_applicant("Kim Doe", None);

    let application = f
        .applications
        .submit(
            &applicant,
            NewApplication {
                posting: posting.id.clone(),
                profile: profile.id.clone(),
                answers: vec![(question, "Yes".to_string())],
                files: ApplicationFiles {
                    resume: ResumeSource::None,
                    cover_letter: None,
                },
            },
            now(),
        )
        .expect("submission succeeds");
    f.applications
        .withdraw(&applicant, &application.id, now())
        .expect("withdraw");

    let day_14 = f
        .sweeper
        .purge_withdrawn(now() + Duration::days(14))
        .expect("sweep runs");
    assert_eq!(day_14.removed, 0);
    assert_eq!(day_14.examined, 1);
    f.db.read(|tables| assert_eq!(tables.applications.len(), 1));

    let day_16 = f
        .sweeper
        .purge_withdrawn(now() + Duration::days(16))
        .expect("sweep runs");
    assert_eq!(day_16.removed, 1);
    f.db.read(|tables| {
        assert!(tables.applications.is_empty());
        assert!(tables.answers.is_empty(), "answers go in the same pass");
    });

    // Idempotent: re-running right away finds nothing and succeeds.
    let again = f
        .sweeper
        .purge_withdrawn(now() + Duration::days(16))
        .expect("sweep runs");
    assert_eq!(again, crate::lifecycle::SweepOutcome::default());
}

#[test]
fn withdrawn_purge_leaves_active_applications_alone() {
    let f = fixture();
    let (org, admin) = f.seed_organization("Acme", "acme");
    let posting = f.seed_posting(&org.id, &admin, None);
    let (profile, applicant) = f.seed_applicant("Kim Doe", None);
    f.submit_simple(&applicant, &posting.id, &profile.id);

    let outcome = f
        .sweeper
        .purge_withdrawn(now() + Duration::days(365))
        .expect("sweep runs");
    assert_eq!(outcome.removed, 0);
    f.db.read(|tables| {
        assert_eq!(
            tables.applications.values().next().expect("row present").status,
            ApplicationStatus::Submitted
        );
    });
}

#[test]
fn expired_posting_purge_cascades_old_postings_only() {
    let f = fixture();
    let (org, admin) = f.seed_organization("Acme", "acme");
    let today = now().date_naive();

    let stale = f.seed_posting(&org.id, &admin, Some(today - Duration::days(16)));
    f.seed_question(&stale.id, "Able to relocate?");
    let fresh = f.seed_posting(&org.id, &admin, Some(today - Duration::days(14)));
    let open_ended = f.seed_posting(&org.id, &admin, None);

    let outcome = f.sweeper.purge_expired_postings(now());
    assert_eq!(outcome.examined, 1);
    assert_eq!(outcome.removed, 1);

    f.db.read(|tables| {
        assert!(!tables.postings.contains_key(&stale.id));
        assert!(tables.questions.is_empty());
        assert!(tables.postings.contains_key(&fresh.id));
        assert!(tables.postings.contains_key(&open_ended.id));
    });
}

#[test]
fn orphan_scan_reclaims_unreferenced_snapshots_only() {
    let f = fixture();
    let (org, admin) = f.seed_organization("Acme", "acme");
    let posting = f.seed_posting(&org.id, &admin, None);
    let (profile, applicant) = f.seed_applicant("Kim Doe", Some(b"v1 resume"));
    let primary = profile.resume.clone().expect("primary resume");

    let application = f
        .applications
        .submit(
            &applicant,
            NewApplication {
                posting: posting.id.clone(),
                profile: profile.id.clone(),
                answers: Vec::new(),
                files: ApplicationFiles {
                    resume: ResumeSource::ProfileResume,
                    cover_letter: None,
                },
            },
            now(),
        )
        .expect("submission succeeds");
    let snapshot = application.resume.clone().expect("snapshot stored");

    // A copy stranded by a transaction that never committed.
    let stranded = f.blobs.copy(&primary, "stranded.pdf").expect("copy");

    let first = f.sweeper.reclaim_orphan_blobs().expect("scan runs");
    assert_eq!(first.examined, 2);
    assert_eq!(first.removed, 1);
    assert!(matches!(f.blobs.fetch(&stranded), Err(BlobError::NotFound)));
    assert!(f.blobs.fetch(&snapshot).is_ok(), "referenced snapshot survives");

    // Cascading the posting away orphans the application's snapshot; the
    // deletion path leaves the blob store alone and the next scan reclaims it.
    f.deletion
        .delete_posting(&admin, &posting.id)
        .expect("cascade succeeds");
    assert!(f.blobs.fetch(&snapshot).is_ok(), "cascade does not touch blobs");

    let second = f.sweeper.reclaim_orphan_blobs().expect("scan runs");
    assert_eq!(second.removed, 1);
    assert!(matches!(f.blobs.fetch(&snapshot), Err(BlobError::NotFound)));

    // The profile's primary upload is never a snapshot, so it stays.
    assert!(f.blobs.fetch(&primary).is_ok());
}

#[test]
fn orphan_scan_reclaims_application_uploads_after_cascade() {
    let f = fixture();
    let (org, admin) = f.seed_organization("Acme", "acme");
    let posting = f.seed_posting(&org.id, &admin, None);
    let (profile, applicant) = f.seed_applicant("Kim Doe", None);

    let application = f
        .applications
        .submit(
            &applicant,
            NewApplication {
                posting: posting.id.clone(),
                profile: profile.id.clone(),
                answers: Vec::new(),
                files: ApplicationFiles {
                    resume: ResumeSource::Upload(FileUpload {
                        bytes: b"fresh resume".to_vec(),
                        name: "resume.pdf".to_string(),
                        content_type: "application/pdf".to_string(),
                    }),
                    cover_letter: Some(FileUpload {
                        bytes: b"dear team".to_vec(),
                        name: "cover.txt".to_string(),
                        content_type: "text/plain".to_string(),
                    }),
                },
            },
            now(),
        )
        .expect("submission succeeds");
    let resume = application.resume.clone().expect("resume stored");
    let cover = application.cover_letter.clone().expect("cover letter stored");

    // While the application row lives, its uploads are examined but kept.
    let before = f.sweeper.reclaim_orphan_blobs().expect("scan runs");
    assert_eq!(before.examined, 2);
    assert_eq!(before.removed, 0);

    f.deletion
        .delete_posting(&admin, &posting.id)
        .expect("cascade succeeds");

    let after = f.sweeper.reclaim_orphan_blobs().expect("scan runs");
    assert_eq!(after.removed, 2);
    assert!(matches!(f.blobs.fetch(&resume), Err(BlobError::NotFound)));
    assert!(matches!(f.blobs.fetch(&cover), Err(BlobError::NotFound)));
}

#[test]
fn sweeps_commute_with_manual_deletion() {
    let f = fixture();
    let (org, admin) = f.seed_organization("Acme", "acme");
    let today = now().date_naive();
    let posting = f.seed_posting(&org.id, &admin, Some(today + Duration::days(1)));
    f.seed_posting(&org.id, &admin, Some(today - Duration::days(30)));
    let (profile, applicant) = f.seed_applicant("Kim Doe", None);
    let application = f.submit_simple(&applicant, &posting.id, &profile.id);
    f.applications
        .withdraw(&applicant, &application.id, now())
        .expect("withdraw");

    f.deletion
        .delete_organization(&admin, "acme")
        .expect("manual deletion");

    // Re-running every sweep immediately afterwards is safe and quiet.
    let withdrawn = f
        .sweeper
        .purge_withdrawn(now() + Duration::days(30))
        .expect("sweep runs");
    assert_eq!(withdrawn.removed, 0);
    let expired = f.sweeper.purge_expired_postings(now());
    assert_eq!(expired.examined, 0);
    let orphans = f.sweeper.reclaim_orphan_blobs().expect("scan runs");
    assert_eq!(orphans.removed, 0);
}
