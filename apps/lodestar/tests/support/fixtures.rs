use super::builders::EngagementBuilder;
use chrono::NaiveDate;
use lodestar::db::search::{PipelineCompiler, SearchExpressionParser};
use lodestar::db::{Document, EngagementRepository, MemoryDocumentStore, ResultPage};
use lodestar::services::EngagementService;

/// Reference date for temporal-state searches in tests
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 6, 1).expect("valid date")
}

pub fn repository(documents: Vec<Document>) -> EngagementRepository<MemoryDocumentStore> {
    let compiler =
        PipelineCompiler::new().with_parser(SearchExpressionParser::with_today(today()));
    EngagementRepository::new(MemoryDocumentStore::with_documents(documents))
        .with_compiler(compiler)
}

pub fn service(documents: Vec<Document>) -> EngagementService<MemoryDocumentStore> {
    EngagementService::new(repository(documents))
}

/// `uuid` of every result, in page order
pub fn uuids(page: &ResultPage) -> Vec<String> {
    page.results
        .iter()
        .filter_map(|doc| doc.get("uuid").and_then(|v| v.as_str()))
        .map(str::to_string)
        .collect()
}

/// `count` engagements with uuids `e00`, `e01`, ... and increasing project ids
pub fn numbered_engagements(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            EngagementBuilder::new(format!("e{:02}", i))
                .customer(&format!("Customer {}", i % 4))
                .project(&format!("Project {}", i))
                .project_id(i as i64)
                .version("v1")
                .build()
        })
        .collect()
}

/// A small mixed collection covering names, states and nested arrays
pub fn sample_engagements() -> Vec<Document> {
    vec![
        EngagementBuilder::new("1234")
            .customer("Acme")
            .project("Pilot")
            .project_id(1)
            .end_date("2020-03-01")
            .launched_by("sam")
            .category("DevOps")
            .category("Containers")
            .subdomain("env-one")
            .user("alex@redhat.com", "lead")
            .user("jo@acme.com", "developer")
            .version("v1")
            .build(),
        EngagementBuilder::new("5678")
            .customer("acme")
            .project("Rollout")
            .project_id(2)
            .end_date("2020-07-01")
            .category("devops")
            .subdomain("env-two")
            .user("kim@redhat.com", "architect")
            .version("v1")
            .build(),
        EngagementBuilder::new("9012")
            .customer("Globex")
            .project("Migration")
            .project_id(3)
            .description("Platform migration")
            .end_date("2019-12-01")
            .launched_by("pat")
            .user("lee@globex.com", "developer")
            .version("v1")
            .build(),
    ]
}
