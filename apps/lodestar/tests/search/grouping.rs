use crate::support::*;
use lodestar::db::pipeline::SortOrder;
use lodestar::db::search::FilterSpec;
use serde_json::{json, Value};

fn rows(page: &lodestar::db::ResultPage) -> Vec<Value> {
    page.results.iter().cloned().map(Value::Object).collect()
}

#[tokio::test]
async fn case_variants_merge_into_one_group() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());
    let page = repo
        .find_page(&FilterSpec::new().group_by("customerName"))
        .await?;

    assert_eq!(
        rows(&page),
        vec![
            json!({"customerName": "Acme", "count": 2}),
            json!({"customerName": "Globex", "count": 1}),
        ]
    );
    assert_eq!(page.total_count, 2);
    Ok(())
}

#[tokio::test]
async fn groups_sort_by_count_and_page() -> anyhow::Result<()> {
    let repo = repository(numbered_engagements(10));
    let page = repo
        .find_page(
            &FilterSpec::new()
                .group_by("customerName")
                .sort("count", SortOrder::Desc)
                .page(1, 2),
        )
        .await?;

    // 10 engagements over 4 customers: 0 and 1 have three each.
    assert_eq!(
        rows(&page),
        vec![
            json!({"customerName": "Customer 0", "count": 3}),
            json!({"customerName": "Customer 1", "count": 3}),
        ]
    );
    assert_eq!(page.total_count, 4);
    Ok(())
}

#[tokio::test]
async fn exclude_with_group_returns_representative_documents() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());
    let page = repo
        .find_page(
            &FilterSpec::new()
                .group_by("customerName")
                .exclude(["engagementUsers", "hostingEnvironments", "categories"]),
        )
        .await?;

    let first = &page.results[0];
    assert_eq!(first.get("uuid"), Some(&json!("1234")));
    assert_eq!(first.get("count"), Some(&json!(2)));
    assert!(!first.contains_key("_groupKey"));
    assert!(!first.contains_key("_id"));
    Ok(())
}

#[tokio::test]
async fn nested_group_field_is_renamed_to_its_trailing_segment() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());
    let page = repo
        .find_page(
            &FilterSpec::new()
                .unwind("hostingEnvironments")
                .group_by("hostingEnvironments.ocpSubDomain"),
        )
        .await?;

    assert_eq!(
        rows(&page),
        vec![
            json!({"ocpSubDomain": "env-one", "count": 1}),
            json!({"ocpSubDomain": "env-two", "count": 1}),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn suggestions_match_fragments_case_insensitively() -> anyhow::Result<()> {
    let svc = service(sample_engagements());
    let page = svc.suggest("customerName", "ACM").await?;
    assert_eq!(rows(&page), vec![json!({"customerName": "Acme", "count": 2})]);

    // Regex metacharacters in the fragment are literal.
    let none = svc.suggest("customerName", "a.m").await?;
    assert!(none.results.is_empty());
    assert_eq!(none.total_count, 0);
    Ok(())
}

#[tokio::test]
async fn suggestions_keep_ampersands_in_the_fragment() -> anyhow::Result<()> {
    let mut documents = sample_engagements();
    documents.push(
        EngagementBuilder::new("3456")
            .customer("Smith & Sons")
            .project("Audit")
            .build(),
    );
    let svc = service(documents);

    let page = svc.suggest("customerName", "smith & s").await?;
    assert_eq!(
        rows(&page),
        vec![json!({"customerName": "Smith & Sons", "count": 1})]
    );
    assert_eq!(page.total_count, 1);
    Ok(())
}
