use crate::support::*;
use lodestar::db::search::FilterSpec;
use lodestar::Error;
use serde_json::Value;
use std::collections::BTreeSet;

#[tokio::test]
async fn equality_search_returns_exactly_the_matching_documents() -> anyhow::Result<()> {
    let documents = sample_engagements();
    let repo = repository(documents.clone());

    for doc in &documents {
        for field in ["customerName", "projectName", "projectId"] {
            let value = &doc[field];
            let raw = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let page = repo
                .find_page(&FilterSpec::new().search(format!("{}={}", field, raw)))
                .await?;

            let expected: Vec<String> = documents
                .iter()
                .filter(|d| &d[field] == value)
                .map(|d| d["uuid"].as_str().unwrap_or_default().to_string())
                .collect();
            assert_eq!(uuids(&page), expected, "search {}={}", field, raw);
        }
    }
    Ok(())
}

#[tokio::test]
async fn like_and_not_like_partition_the_collection() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());
    let all: BTreeSet<String> = uuids(&repo.find_page(&FilterSpec::new()).await?)
        .into_iter()
        .collect();

    for fragment in ["acme", "^glo", "e", "nothing-matches"] {
        let like: BTreeSet<String> = uuids(
            &repo
                .find_page(&FilterSpec::new().search(format!("customerName like {}", fragment)))
                .await?,
        )
        .into_iter()
        .collect();
        let not_like: BTreeSet<String> = uuids(
            &repo
                .find_page(
                    &FilterSpec::new().search(format!("customerName not like {}", fragment)),
                )
                .await?,
        )
        .into_iter()
        .collect();

        assert!(like.is_disjoint(&not_like), "fragment {}", fragment);
        let union: BTreeSet<String> = like.union(&not_like).cloned().collect();
        assert_eq!(union, all, "fragment {}", fragment);
    }
    Ok(())
}

#[tokio::test]
async fn active_state_inside_a_window_returns_the_middle_engagement() -> anyhow::Result<()> {
    let documents = vec![
        EngagementBuilder::new("a")
            .launched_by("x")
            .end_date("2019-12-01")
            .build(),
        EngagementBuilder::new("b")
            .launched_by("x")
            .end_date("2020-03-01")
            .build(),
        EngagementBuilder::new("c")
            .launched_by("x")
            .end_date("2020-07-01")
            .build(),
    ];
    let page = repository(documents)
        .find_page(&FilterSpec::new().search("state=active&start=2020-01-01&end=2020-06-01"))
        .await?;

    assert_eq!(uuids(&page), vec!["b"]);
    assert_eq!(page.total_count, 1);
    Ok(())
}

#[tokio::test]
async fn states_split_launched_engagements_by_end_date() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());

    let upcoming = repo.find_page(&FilterSpec::new().search("state=upcoming")).await?;
    assert_eq!(uuids(&upcoming), vec!["5678"]);

    let past = repo.find_page(&FilterSpec::new().search("state=past")).await?;
    assert_eq!(uuids(&past), vec!["1234", "9012"]);

    let unknown = repo.find_page(&FilterSpec::new().search("state=someday")).await?;
    assert_eq!(uuids(&unknown), uuids(&upcoming));
    Ok(())
}

#[tokio::test]
async fn exists_forms_select_by_presence() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());

    let with = repo.find_page(&FilterSpec::new().search("description exists")).await?;
    assert_eq!(uuids(&with), vec!["9012"]);

    let without = repo
        .find_page(&FilterSpec::new().search("not description exists"))
        .await?;
    assert_eq!(uuids(&without), vec!["1234", "5678"]);
    Ok(())
}

#[tokio::test]
async fn unrecognized_components_do_not_filter() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());
    let page = repo
        .find_page(&FilterSpec::new().search("customerName=Globex&this is not a component"))
        .await?;
    assert_eq!(uuids(&page), vec!["9012"]);
    Ok(())
}

#[tokio::test]
async fn uncoercible_values_fail_the_query() -> anyhow::Result<()> {
    let repo = repository(sample_engagements());
    let err = repo
        .find_page(&FilterSpec::new().search("projectId=first"))
        .await
        .expect_err("projectId is an integer field");
    match err {
        Error::InvalidSearchField { field, .. } => assert_eq!(field, "projectId"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        repo.find_page(&FilterSpec::new().search("noSuchField=1"))
            .await
            .expect_err("unknown field")
            .status_code(),
        400
    );
    Ok(())
}
