//! End-to-end workflow through the service facade
//!
//! Credential, profile, template and post are created for one tenant, the
//! profile's link set is replaced, and delivery attempts are recorded the way
//! the delivery side writes them.

use libsynk::service::SynkService;
use libsynk::types::{
    ChannelType, ColorId, NewCredential, NewPost, NewProfile, NewTemplate, PostId,
    PublicationStatus, TenantId,
};
use libsynk::{Config, CredentialId};
use tempfile::TempDir;

async fn setup_test_service() -> (SynkService, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let config = Config::with_database_path(db_path.to_str().unwrap());

    let service = SynkService::from_config(config).await.unwrap();
    (service, temp_dir)
}

async fn record_attempt(service: &SynkService, post: PostId, credential: CredentialId, status: &str) {
    sqlx::query("INSERT INTO publication_attempt (post_id, credential_id, status) VALUES (?, ?, ?)")
        .bind(post)
        .bind(credential)
        .bind(status)
        .execute(service.database().pool())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_scheduling_workflow() {
    let (service, _temp_dir) = setup_test_service().await;
    let tenant = TenantId(7);

    // Step 1: register a telegram credential
    let c1 = service
        .credentials()
        .add(tenant, NewCredential::new("Ops bot", "telegram", "{\"chat\":\"-100\"}"))
        .await
        .unwrap();
    let stored = service.credentials().by_id(tenant, c1).await.unwrap().unwrap();
    assert_eq!(stored.channel_type, ChannelType::Telegram);

    // Step 2: a profile linking it
    let p1 = service
        .profiles()
        .add(tenant, NewProfile::new("Launch", ColorId(1), [c1]))
        .await
        .unwrap();
    let linked = service
        .credentials()
        .basic_list_by_profile(tenant, p1)
        .await
        .unwrap();
    assert_eq!(linked.iter().map(|c| c.id).collect::<Vec<_>>(), vec![c1]);

    // Step 3: replace the link set with nothing
    let rows = service
        .profiles()
        .update(tenant, p1, NewProfile::new("Launch", ColorId(1), []))
        .await
        .unwrap();
    assert_eq!(rows, 1);
    assert!(service
        .credentials()
        .basic_list_by_profile(tenant, p1)
        .await
        .unwrap()
        .is_empty());

    // Step 4: a post on that profile with no attempts yet
    let template = service
        .templates()
        .add(tenant, NewTemplate::new("Weekly", "This week at Synk"))
        .await
        .unwrap();
    let post = service
        .posts()
        .add(tenant, NewPost::new("Week 12", "This week at Synk", template, p1))
        .await
        .unwrap();

    let listed = service.posts().list(tenant, Some(post), false).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, PublicationStatus::Published);
    assert_eq!(listed[0].profile_name, "Launch");
    assert_eq!(listed[0].template_name, "Weekly");

    // Step 5: one pending attempt
    record_attempt(&service, post, c1, "pending").await;
    assert_eq!(
        service.publication().status_of(post).await.unwrap(),
        PublicationStatus::Pending
    );

    // Step 6: one failed attempt outranks it
    record_attempt(&service, post, c1, "failed").await;
    let listed = service.posts().list(tenant, Some(post), false).await.unwrap();
    assert_eq!(listed[0].status, PublicationStatus::Failed);
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let tenant = TenantId(3);

    let credential = {
        let service =
            SynkService::from_config(Config::with_database_path(db_path.to_str().unwrap()))
                .await
                .unwrap();
        let id = service
            .credentials()
            .add(tenant, NewCredential::new("Main", "linkedin", "{}"))
            .await
            .unwrap();
        service.database().close().await;
        id
    };

    let service = SynkService::from_config(Config::with_database_path(db_path.to_str().unwrap()))
        .await
        .unwrap();
    let listed = service.credentials().list(tenant, None, true).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, credential);
    assert_eq!(listed[0].config, "{}");
}
