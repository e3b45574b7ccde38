use crate::support::*;
use lodestar::db::pipeline::SortOrder;
use lodestar::db::search::FilterSpec;
use lodestar::Error;
use serde_json::json;

#[tokio::test]
async fn pages_cover_consecutive_slices_of_the_sorted_set() -> anyhow::Result<()> {
    let repo = repository(numbered_engagements(23));
    let per_page = 5u32;

    for page in 1..=6u32 {
        let result = repo
            .find_page(
                &FilterSpec::new()
                    .sort("projectId", SortOrder::Asc)
                    .page(page, per_page),
            )
            .await?;

        assert!(result.results.len() <= per_page as usize);
        assert_eq!(result.total_count, 23);
        assert_eq!(result.current_page, page);
        assert_eq!(result.per_page, u64::from(per_page));

        let start = (per_page * (page - 1)) as usize;
        let end = ((per_page * page) as usize).min(23);
        let expected: Vec<String> = (start..end.max(start)).map(|i| format!("e{:02}", i)).collect();
        assert_eq!(uuids(&result), expected, "page {}", page);
    }
    Ok(())
}

#[tokio::test]
async fn per_page_defaults_to_twenty() -> anyhow::Result<()> {
    let repo = repository(numbered_engagements(25));
    let spec = FilterSpec {
        page: Some(2),
        ..Default::default()
    };
    let page = repo.find_page(&spec).await?;
    assert_eq!(page.per_page, 20);
    assert_eq!(uuids(&page), vec!["e20", "e21", "e22", "e23", "e24"]);
    Ok(())
}

#[tokio::test]
async fn descending_sort_keeps_store_order_for_ties() -> anyhow::Result<()> {
    let repo = repository(numbered_engagements(8));
    let page = repo
        .find_page(&FilterSpec::new().sort("customerName", SortOrder::Desc))
        .await?;
    // Customers cycle 0..4, so each name appears twice in store order.
    assert_eq!(
        uuids(&page),
        vec!["e03", "e07", "e02", "e06", "e01", "e05", "e00", "e04"]
    );
    Ok(())
}

#[tokio::test]
async fn include_projection_keeps_only_listed_fields() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());
    let page = repo
        .find_page(
            &FilterSpec::new()
                .search("customerName=Globex")
                .include(["uuid", "description"]),
        )
        .await?;
    let results: Vec<serde_json::Value> = page
        .results
        .into_iter()
        .map(serde_json::Value::Object)
        .collect();
    assert_eq!(
        results,
        vec![json!({"uuid": "9012", "description": "Platform migration"})]
    );
    Ok(())
}

#[tokio::test]
async fn exclude_projection_drops_listed_fields_and_internal_id() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());
    let page = repo
        .find_page(&FilterSpec::new().exclude(["engagementUsers", "hostingEnvironments"]))
        .await?;
    assert_eq!(page.results.len(), 3);
    for doc in &page.results {
        assert!(!doc.contains_key("_id"));
        assert!(!doc.contains_key("engagementUsers"));
        assert!(!doc.contains_key("hostingEnvironments"));
        assert!(doc.contains_key("uuid"));
    }
    Ok(())
}

#[tokio::test]
async fn include_together_with_exclude_is_rejected() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());
    let err = repo
        .find_page(&FilterSpec::new().include(["uuid"]).exclude(["description"]))
        .await
        .expect_err("include and exclude are exclusive");
    assert!(matches!(err, Error::InvalidFilter(_)));
    assert_eq!(err.status_code(), 400);
    Ok(())
}
