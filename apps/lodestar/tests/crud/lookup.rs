use crate::support::*;
use lodestar::db::search::FilterSpec;

#[tokio::test]
async fn find_by_subdomain_honours_the_excluded_owner() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());

    let excluded = repo.find_by_subdomain("env-one", Some("1234")).await?;
    assert!(excluded.is_none());

    let owner = repo
        .find_by_subdomain("env-one", None)
        .await?
        .expect("env-one is owned");
    assert_eq!(owner.uuid.as_deref(), Some("1234"));
    Ok(())
}

#[tokio::test]
async fn find_by_subdomain_is_case_insensitive_and_literal() -> anyhow::Result<()> {
    let documents = vec![
        EngagementBuilder::new("a").subdomain("envXone").build(),
        EngagementBuilder::new("b").subdomain("Env.One").build(),
    ];
    let repo = repository(documents);

    let found = repo
        .find_by_subdomain("env.one", None)
        .await?
        .expect("dot matches literally");
    assert_eq!(found.uuid.as_deref(), Some("b"));

    // Anchored: a prefix of an existing subdomain is not a match.
    assert!(repo.find_by_subdomain("env", None).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn subdomain_availability_through_the_service() -> anyhow::Result<()> {
    let svc = service(sample_engagements());
    assert!(!svc.is_subdomain_available("ENV-TWO", None).await?);
    assert!(svc.is_subdomain_available("env-two", Some("5678")).await?);
    assert!(svc.is_subdomain_available("env-three", None).await?);
    Ok(())
}

#[tokio::test]
async fn find_by_uuid_applies_the_projection() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());

    let full = repo.find_by_uuid("9012", None).await?.expect("exists");
    assert_eq!(full.customer_name.as_deref(), Some("Globex"));
    assert!(full.mongo_id.is_none(), "lookups never return the internal id");

    let projected = repo
        .find_by_uuid("9012", Some(&FilterSpec::new().include(["uuid", "projectName"])))
        .await?
        .expect("exists");
    assert_eq!(projected.project_name.as_deref(), Some("Migration"));
    assert!(projected.customer_name.is_none());
    assert!(projected.engagement_users.is_none());

    assert!(repo.find_by_uuid("missing", None).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn find_by_customer_and_project_matches_the_exact_pair() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());

    let found = repo
        .find_by_customer_and_project("acme", "Rollout", None)
        .await?
        .expect("pair exists");
    assert_eq!(found.uuid.as_deref(), Some("5678"));

    assert!(repo
        .find_by_customer_and_project("Acme", "Rollout", None)
        .await?
        .is_none());

    let trimmed = repo
        .find_by_customer_and_project(
            "Globex",
            "Migration",
            Some(&FilterSpec::new().exclude(["engagementUsers", "description"])),
        )
        .await?
        .expect("pair exists");
    assert!(trimmed.description.is_none());
    assert!(trimmed.engagement_users.is_none());
    assert_eq!(trimmed.project_id, Some(3));
    Ok(())
}

#[tokio::test]
async fn service_get_reports_missing_engagements() -> anyhow::Result<()> {
    let svc = service(sample_engagements());
    assert_eq!(svc.get("1234", None).await?.project_id, Some(1));

    let err = svc.get("nope", None).await.expect_err("missing");
    assert_eq!(err.status_code(), 404);
    Ok(())
}
