use crate::support::*;
use lodestar::db::search::FilterSpec;
use lodestar::db::PartitionCounts;
use serde_json::{json, Value};

#[tokio::test]
async fn unwind_project_flattens_nested_rows() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());
    let page = repo
        .find_page(
            &FilterSpec::new()
                .unwind("categories")
                .unwind_project("name,count"),
        )
        .await?;

    let rows: Vec<Value> = page.results.into_iter().map(Value::Object).collect();
    assert_eq!(
        rows,
        vec![
            json!({"name": "DevOps", "count": 1, "engagementUuid": "1234"}),
            json!({"name": "Containers", "count": 1, "engagementUuid": "1234"}),
            json!({"name": "devops", "count": 1, "engagementUuid": "5678"}),
        ]
    );
    assert_eq!(page.total_count, 3);
    Ok(())
}

#[tokio::test]
async fn search_on_the_unwound_field_filters_elements() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());
    let page = repo
        .find_page(
            &FilterSpec::new()
                .search("categories.name like dev&customerName=Acme")
                .unwind("categories")
                .unwind_project("categories.name"),
        )
        .await?;

    let rows: Vec<Value> = page.results.into_iter().map(Value::Object).collect();
    assert_eq!(rows, vec![json!({"name": "DevOps", "engagementUuid": "1234"})]);
    Ok(())
}

#[tokio::test]
async fn unwind_then_group_counts_distinct_elements() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());
    let page = repo
        .find_page(
            &FilterSpec::new()
                .unwind("categories")
                .unwind_project("name")
                .group_by("name"),
        )
        .await?;

    let rows: Vec<Value> = page.results.into_iter().map(Value::Object).collect();
    assert_eq!(
        rows,
        vec![
            json!({"name": "DevOps", "count": 2}),
            json!({"name": "Containers", "count": 1}),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn participant_counts_split_red_hat_from_others() -> anyhow::Result<()> {
    let svc = service(sample_engagements());

    let all = svc.participant_counts(&FilterSpec::new()).await?;
    assert_eq!(
        all,
        PartitionCounts {
            total_count: Some(4),
            matching: Some(2),
            complement: Some(2),
        }
    );

    let globex = svc
        .participant_counts(&FilterSpec::new().search("customerName=Globex"))
        .await?;
    assert_eq!(globex.matching, None);
    assert_eq!(globex.complement, Some(1));
    Ok(())
}

#[tokio::test]
async fn participant_counts_over_nothing_are_all_absent() -> anyhow::Result<()> {
    let svc = service(sample_engagements());
    let none = svc
        .participant_counts(&FilterSpec::new().search("customerName=Initech"))
        .await?;
    assert_eq!(none, PartitionCounts::default());
    assert_eq!(serde_json::to_value(&none)?, json!({}));
    Ok(())
}
