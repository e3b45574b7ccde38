use crate::support::*;
use lodestar::db::search::Predicate;
use lodestar::db::DocumentStore;
use lodestar::models::{CreationDetails, Launch};
use lodestar::Error;
use serde_json::json;

fn stored_engagement() -> lodestar::db::Document {
    EngagementBuilder::new("1234")
        .customer("Acme")
        .project("Pilot")
        .project_id(7)
        .created_by("alex")
        .status("green")
        .subdomain("env-one")
        .version("v1")
        .build()
}

#[tokio::test]
async fn cas_update_succeeds_once_per_version() -> anyhow::Result<()> {
    let repo = repository(vec![stored_engagement()]);
    let candidate = EngagementBuilder::new("1234")
        .description("first edit")
        .build_engagement();

    let updated = repo
        .update_if_version_matches(&candidate, "v1", false)
        .await?
        .expect("current version matches");
    assert_eq!(updated.description.as_deref(), Some("first edit"));
    let new_version = updated.last_update.clone().expect("version stamped");
    assert_ne!(new_version, "v1");

    let stale = repo
        .update_if_version_matches(&candidate, "v1", false)
        .await?;
    assert!(stale.is_none(), "stale version must not match");

    let again = repo
        .update_if_version_matches(&candidate, &new_version, false)
        .await?;
    assert!(again.is_some());
    Ok(())
}

#[tokio::test]
async fn immutable_fields_survive_updates() -> anyhow::Result<()> {
    let repo = repository(vec![stored_engagement()]);
    let mut candidate = EngagementBuilder::new("1234")
        .project_id(99)
        .created_by("mallory")
        .status("red")
        .launched_by("mallory")
        .description("edited")
        .build_engagement();
    candidate.mongo_id = Some("forged".to_string());

    let updated = repo
        .update_if_version_matches(&candidate, "v1", false)
        .await?
        .expect("version matches");

    assert_eq!(updated.project_id, Some(7));
    assert_eq!(
        updated.creation_details,
        Some(CreationDetails {
            created_by_user: Some("alex".to_string()),
            ..Default::default()
        })
    );
    assert_eq!(
        updated.status.and_then(|s| s.overall_status),
        Some("green".to_string())
    );
    assert!(updated.launch.is_none(), "launch is only written when permitted");
    assert_ne!(updated.mongo_id.as_deref(), Some("forged"));
    assert_eq!(updated.description.as_deref(), Some("edited"));
    Ok(())
}

#[tokio::test]
async fn launch_is_written_when_permitted() -> anyhow::Result<()> {
    let repo = repository(vec![stored_engagement()]);
    let candidate = EngagementBuilder::new("1234")
        .launched_by("sam")
        .build_engagement();

    let updated = repo
        .update_if_version_matches(&candidate, "v1", true)
        .await?
        .expect("version matches");
    assert_eq!(
        updated.launch.and_then(|l| l.launched_by),
        Some("sam".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn service_reports_conflicts_and_missing_engagements() -> anyhow::Result<()> {
    let svc = service(vec![stored_engagement()]);
    let candidate = EngagementBuilder::new("1234")
        .description("edit")
        .build_engagement();

    svc.update(&candidate, "v1").await?;

    let err = svc.update(&candidate, "v1").await.expect_err("stale token");
    assert!(err.is_conflict());
    assert_eq!(err.status_code(), 409);

    let ghost = EngagementBuilder::new("0000").build_engagement();
    let err = svc.update(&ghost, "v1").await.expect_err("unknown uuid");
    assert!(matches!(err, Error::EngagementNotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn service_launch_sets_launch_once() -> anyhow::Result<()> {
    let svc = service(vec![stored_engagement()]);

    let launched = svc.launch("1234", "v1", "sam", "sam@redhat.com").await?;
    let Launch {
        launched_by,
        launched_by_email,
        launched_date_time,
    } = launched.launch.clone().expect("launched");
    assert_eq!(launched_by.as_deref(), Some("sam"));
    assert_eq!(launched_by_email.as_deref(), Some("sam@redhat.com"));
    assert!(launched_date_time.is_some());
    assert_eq!(launched.customer_name.as_deref(), Some("Acme"));

    let version = launched.last_update.expect("version stamped");
    let err = svc
        .launch("1234", &version, "kim", "kim@redhat.com")
        .await
        .expect_err("already launched");
    assert!(matches!(err, Error::BusinessRule(_)));
    Ok(())
}

#[tokio::test]
async fn service_rejects_duplicate_names_and_taken_subdomains() -> anyhow::Result<()> {
    let other = EngagementBuilder::new("5678")
        .customer("Globex")
        .project("Migration")
        .version("v1")
        .build();
    let svc = service(vec![stored_engagement(), other]);

    let rename = EngagementBuilder::new("5678")
        .customer("Acme")
        .project("Pilot")
        .build_engagement();
    let err = svc.update(&rename, "v1").await.expect_err("duplicate pair");
    assert!(matches!(err, Error::BusinessRule(_)));

    let steal = EngagementBuilder::new("5678")
        .subdomain("ENV-ONE")
        .build_engagement();
    let err = svc.update(&steal, "v1").await.expect_err("subdomain taken");
    assert!(matches!(err, Error::BusinessRule(_)));

    // An engagement may keep its own subdomain and names.
    let keep = EngagementBuilder::new("1234")
        .customer("Acme")
        .project("Pilot")
        .subdomain("env-one")
        .build_engagement();
    svc.update(&keep, "v1").await?;

    let stored = svc
        .repository()
        .store()
        .find_one(&Predicate::eq("uuid", "5678"), None)
        .await?
        .expect("still stored");
    assert_eq!(stored.get("customerName"), Some(&json!("Globex")));
    Ok(())
}

#[tokio::test]
async fn partial_rename_cannot_duplicate_a_name_pair() -> anyhow::Result<()> {
    let other = EngagementBuilder::new("5678")
        .customer("Globex")
        .project("Pilot")
        .version("v1")
        .build();
    let svc = service(vec![stored_engagement(), other]);

    // Only the customer changes; the stored project completes the pair.
    let rename = EngagementBuilder::new("5678")
        .customer("Acme")
        .build_engagement();
    let err = svc.update(&rename, "v1").await.expect_err("duplicate pair");
    assert!(matches!(err, Error::BusinessRule(_)));

    let stored = svc.get("5678", None).await?;
    assert_eq!(stored.customer_name.as_deref(), Some("Globex"));

    let unique = EngagementBuilder::new("5678")
        .project("Rollout")
        .build_engagement();
    let updated = svc.update(&unique, "v1").await?;
    assert_eq!(updated.customer_name.as_deref(), Some("Globex"));
    assert_eq!(updated.project_name.as_deref(), Some("Rollout"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_with_one_token_have_one_winner() -> anyhow::Result<()> {
    let repo = repository(vec![stored_engagement()]);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move {
                let candidate = EngagementBuilder::new("1234")
                    .description(&format!("writer {}", i))
                    .build_engagement();
                repo.update_if_version_matches(&candidate, "v1", false)
                    .await
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        if let Some(updated) = handle.await?? {
            winners.push(updated);
        }
    }
    assert_eq!(winners.len(), 1, "exactly one writer holds the current token");

    let stored = repo.find_by_uuid("1234", None).await?.expect("still stored");
    assert_eq!(stored.description, winners[0].description);
    assert_ne!(stored.last_update.as_deref(), Some("v1"));
    Ok(())
}
