mod common;

use chrono::Utc;
use common::*;
use lead_sleuth_core::providers::{OfficialName, Providers};
use lead_sleuth_core::store::{ContactStore, JsonFileStore};
use lead_sleuth_core::{
    AppError, BatchOrchestrator, BusinessRecord, Config, DiscoverySource, EmailStatus,
    PersistedContact, Role,
};
use std::path::Path;
use std::sync::Arc;

fn write_businesses(path: &Path, businesses: &[BusinessRecord]) {
    std::fs::write(path, serde_json::to_string(businesses).unwrap()).unwrap();
}

fn orchestrator(
    config: Config,
    providers: Providers,
    verifier: Arc<ScriptedVerifier>,
    store: Arc<JsonFileStore>,
) -> BatchOrchestrator {
    let config = Arc::new(config);
    let cascade = lead_sleuth_core::ProviderCascade::new(config.clone(), providers, verifier);
    BatchOrchestrator::new(config, cascade, store.clone(), store)
}

fn owner_search() -> Arc<ScriptedPeopleSearch> {
    Arc::new(ScriptedPeopleSearch::returning(
        vec![person(
            "Jane",
            "Doe",
            "Owner",
            Some("jane@oakstreetclinic.com"),
            88,
            EmailStatus::Unknown,
        )],
        &["k1"],
    ))
}

#[tokio::test]
async fn rerunning_a_batch_updates_the_same_contact() {
    let dir = tempfile::tempdir().unwrap();
    let businesses = dir.path().join("businesses.json");
    let contacts = dir.path().join("contacts.json");
    write_businesses(
        &businesses,
        &[business("b1", "Oak Street Clinic", Some("oakstreetclinic.com"))],
    );

    for _ in 0..2 {
        let store = Arc::new(JsonFileStore::open(&businesses, &contacts).unwrap());
        let providers = Providers {
            people_search: Some(owner_search()),
            ..Providers::default()
        };
        let summary = orchestrator(
            test_config(&["k1"]),
            providers,
            Arc::new(ScriptedVerifier::new(false)),
            store,
        )
        .run()
        .await
        .unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.contacts_persisted, 1);
        assert_eq!(summary.unknown_found, 1);
    }

    let stored = JsonFileStore::open(&businesses, &contacts).unwrap().all_contacts();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].business_id, "b1");
    assert_eq!(stored[0].email, "jane@oakstreetclinic.com");
    assert_eq!(stored[0].role, Role::Owner);
    assert_eq!(stored[0].source, DiscoverySource::PeopleSearch);
    assert!(!stored[0].email_verified);
}

#[tokio::test]
async fn businesses_with_a_valid_contact_or_no_domain_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let businesses = dir.path().join("businesses.json");
    let contacts = dir.path().join("contacts.json");
    write_businesses(
        &businesses,
        &[
            business("b1", "Oak Street Clinic", Some("oakstreetclinic.com")),
            business("b2", "Elm Dental", Some("https://elmdental.com")),
            business("b3", "Pine Physio", Some("https://www.yelp.com/biz/pine-physio")),
            business("b4", "Birch Spa", None),
            business("b2", "Elm Dental (duplicate)", Some("https://elmdental.com")),
        ],
    );

    let store = Arc::new(JsonFileStore::open(&businesses, &contacts).unwrap());
    store
        .upsert_contact(&PersistedContact {
            id: "existing".into(),
            business_id: "b1".into(),
            first_name: "Ann".into(),
            last_name: "Oak".into(),
            title: "Owner".into(),
            role: Role::Owner,
            email: "ann@oakstreetclinic.com".into(),
            phone: None,
            profile_url: None,
            confidence: 95,
            source: DiscoverySource::PeopleSearch,
            email_verified: true,
            email_verification_status: EmailStatus::Valid,
            enriched_at: Utc::now(),
        })
        .await
        .unwrap();

    let people = owner_search();
    let providers = Providers {
        people_search: Some(people.clone()),
        ..Providers::default()
    };
    let summary = orchestrator(
        test_config(&["k1"]),
        providers,
        Arc::new(ScriptedVerifier::new(false)),
        store.clone(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.skipped_already_valid, 1);
    assert_eq!(summary.skipped_no_domain, 2);
    assert_eq!(summary.processed, 1);
    assert_eq!(people.calls().len(), 1);
    assert_eq!(store.all_contacts().len(), 2);
}

#[tokio::test]
async fn limit_caps_the_number_of_processed_businesses() {
    let dir = tempfile::tempdir().unwrap();
    let businesses = dir.path().join("businesses.json");
    let records: Vec<BusinessRecord> = (0..5)
        .map(|i| business(&format!("b{}", i), "Oak Street Clinic", Some("oakstreetclinic.com")))
        .collect();
    write_businesses(&businesses, &records);

    let store = Arc::new(JsonFileStore::open(&businesses, dir.path().join("contacts.json")).unwrap());
    let mut config = test_config(&["k1"]);
    config.limit = 3;
    let providers = Providers {
        people_search: Some(owner_search()),
        ..Providers::default()
    };
    let summary = orchestrator(config, providers, Arc::new(ScriptedVerifier::new(false)), store.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.people_search_hits, 3);
    assert_eq!(store.all_contacts().len(), 3);
}

#[tokio::test]
async fn run_without_discovery_credentials_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let businesses = dir.path().join("businesses.json");
    write_businesses(
        &businesses,
        &[business("b1", "Oak Street Clinic", Some("oakstreetclinic.com"))],
    );
    let store = Arc::new(JsonFileStore::open(&businesses, dir.path().join("contacts.json")).unwrap());

    let result = orchestrator(
        test_config(&[]),
        Providers::default(),
        Arc::new(ScriptedVerifier::new(true)),
        store.clone(),
    )
    .run()
    .await;

    assert!(matches!(result, Err(AppError::Config(_))));
    assert!(store.all_contacts().is_empty());
}

#[tokio::test]
async fn unknown_sweep_resolves_stored_contacts_through_the_api() {
    let dir = tempfile::tempdir().unwrap();
    let businesses = dir.path().join("businesses.json");
    let contacts = dir.path().join("contacts.json");
    write_businesses(&businesses, &[]);

    let stored_unknown = |id: &str, email: &str| PersistedContact {
        id: id.into(),
        business_id: format!("biz-{}", id),
        first_name: "Sam".into(),
        last_name: "Reed".into(),
        title: "Practice Manager".into(),
        role: Role::ClinicManager,
        email: email.into(),
        phone: None,
        profile_url: None,
        confidence: 60,
        source: DiscoverySource::EmailFinder,
        email_verified: false,
        email_verification_status: EmailStatus::Unknown,
        enriched_at: Utc::now(),
    };
    let seeded = vec![
        stored_unknown("c1", "sam@gone.example"),
        stored_unknown("c2", "sam@fine.example"),
        stored_unknown("c3", "sam@shrug.example"),
    ];
    std::fs::write(&contacts, serde_json::to_string(&seeded).unwrap()).unwrap();

    let store = Arc::new(JsonFileStore::open(&businesses, &contacts).unwrap());
    let verifier = Arc::new(
        ScriptedVerifier::new(true)
            .with("sam@gone.example", EmailStatus::Invalid)
            .with("sam@fine.example", EmailStatus::Valid),
    );
    let summary = orchestrator(test_config(&["k1"]), Providers::default(), verifier, store.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.verified_unknown_emails, 3);
    assert_eq!(summary.unknown_emails_resolved, 2);

    let reopened = JsonFileStore::open(&businesses, &contacts).unwrap().all_contacts();
    let status_of = |id: &str| {
        reopened
            .iter()
            .find(|c| c.id == id)
            .map(|c| (c.email_verification_status, c.email_verified))
            .unwrap()
    };
    assert_eq!(status_of("c1"), (EmailStatus::Invalid, false));
    assert_eq!(status_of("c2"), (EmailStatus::Valid, true));
    assert_eq!(status_of("c3"), (EmailStatus::Unknown, false));
}

#[tokio::test]
async fn unknown_sweep_respects_verify_limit_and_needs_an_api() {
    let dir = tempfile::tempdir().unwrap();
    let businesses = dir.path().join("businesses.json");
    let contacts = dir.path().join("contacts.json");
    write_businesses(&businesses, &[]);

    let seeded: Vec<PersistedContact> = (0..4)
        .map(|i| PersistedContact {
            id: format!("c{}", i),
            business_id: format!("b{}", i),
            first_name: "Sam".into(),
            last_name: "Reed".into(),
            title: "Owner".into(),
            role: Role::Owner,
            email: format!("sam{}@oak.example", i),
            phone: None,
            profile_url: None,
            confidence: 70,
            source: DiscoverySource::PeopleSearch,
            email_verified: false,
            email_verification_status: EmailStatus::Unknown,
            enriched_at: Utc::now(),
        })
        .collect();
    std::fs::write(&contacts, serde_json::to_string(&seeded).unwrap()).unwrap();

    let mut config = test_config(&["k1"]);
    config.verify_limit = 2;
    let store = Arc::new(JsonFileStore::open(&businesses, &contacts).unwrap());
    let verifier = Arc::new(ScriptedVerifier::new(true));
    let summary = orchestrator(config.clone(), Providers::default(), verifier.clone(), store.clone())
        .run()
        .await
        .unwrap();
    assert_eq!(summary.verified_unknown_emails, 2);
    assert_eq!(verifier.calls().len(), 2);

    let no_api = Arc::new(ScriptedVerifier::new(false));
    let summary = orchestrator(config, Providers::default(), no_api.clone(), store)
        .run()
        .await
        .unwrap();
    assert_eq!(summary.verified_unknown_emails, 0);
    assert!(no_api.calls().is_empty());
}

fn stored_owner(business_id: &str) -> PersistedContact {
    PersistedContact {
        id: "stored-owner".into(),
        business_id: business_id.into(),
        first_name: "Ann".into(),
        last_name: "Oak".into(),
        title: "Owner".into(),
        role: Role::Owner,
        email: "ann@oakstreetclinic.com".into(),
        phone: None,
        profile_url: None,
        confidence: 70,
        source: DiscoverySource::PeopleSearch,
        email_verified: false,
        email_verification_status: EmailStatus::Unknown,
        enriched_at: Utc::now(),
    }
}

#[tokio::test]
async fn better_ranked_contact_replaces_the_stored_row() {
    let dir = tempfile::tempdir().unwrap();
    let businesses = dir.path().join("businesses.json");
    let contacts = dir.path().join("contacts.json");
    write_businesses(
        &businesses,
        &[business("b1", "Oak Street Clinic", Some("oakstreetclinic.com"))],
    );

    let runs = [
        person(
            "Mark",
            "Lee",
            "Office Manager",
            Some("mark.lee@oakstreetclinic.com"),
            90,
            EmailStatus::Unknown,
        ),
        person(
            "Jane",
            "Doe",
            "Owner",
            Some("jane.doe@oakstreetclinic.com"),
            80,
            EmailStatus::Unknown,
        ),
    ];
    for found in runs {
        let store = Arc::new(JsonFileStore::open(&businesses, &contacts).unwrap());
        let providers = Providers {
            people_search: Some(Arc::new(ScriptedPeopleSearch::returning(vec![found], &["k1"]))),
            ..Providers::default()
        };
        let summary = orchestrator(
            test_config(&["k1"]),
            providers,
            Arc::new(ScriptedVerifier::new(false)),
            store,
        )
        .run()
        .await
        .unwrap();
        assert_eq!(summary.contacts_persisted, 1);
        assert_eq!(summary.contacts_kept_existing, 0);
    }

    let store = JsonFileStore::open(&businesses, &contacts).unwrap();
    let rows = store.contacts_for_business("b1").await.unwrap();
    assert_eq!(rows.len(), 1, "business b1 must keep a single contact row");
    assert_eq!(rows[0].email, "jane.doe@oakstreetclinic.com");
    assert_eq!(rows[0].role, Role::Owner);
}

#[tokio::test]
async fn outranked_registry_guess_keeps_the_stored_owner() {
    let dir = tempfile::tempdir().unwrap();
    let businesses = dir.path().join("businesses.json");
    let contacts = dir.path().join("contacts.json");
    write_businesses(
        &businesses,
        &[business("b1", "Oak Street Clinic", Some("oakstreetclinic.com"))],
    );
    std::fs::write(&contacts, serde_json::to_string(&vec![stored_owner("b1")]).unwrap()).unwrap();

    let store = Arc::new(JsonFileStore::open(&businesses, &contacts).unwrap());
    let providers = Providers {
        people_search: Some(Arc::new(ScriptedPeopleSearch::default())),
        registry: Some(Arc::new(FixedRegistry(Some(OfficialName {
            first_name: "John".into(),
            last_name: "Smith".into(),
            title: Some("Office Manager".into()),
        })))),
        ..Providers::default()
    };
    let verifier = Arc::new(
        ScriptedVerifier::new(true).with("john.smith@oakstreetclinic.com", EmailStatus::Valid),
    );
    let mut config = test_config(&["k1"]);
    config.verify_unknowns = false;

    let summary = orchestrator(config, providers, verifier, store.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.registry_hits, 1);
    assert_eq!(summary.valid_found, 1);
    assert_eq!(summary.contacts_kept_existing, 1);
    assert_eq!(summary.contacts_persisted, 0);

    let rows = store.all_contacts();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "stored-owner");
    assert_eq!(rows[0].email, "ann@oakstreetclinic.com");
}

#[tokio::test]
async fn verifier_key_alone_runs_the_registry_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let businesses = dir.path().join("businesses.json");
    write_businesses(
        &businesses,
        &[business("b1", "Oak Street Clinic", Some("oakstreetclinic.com"))],
    );
    let store = Arc::new(JsonFileStore::open(&businesses, dir.path().join("contacts.json")).unwrap());

    let providers = Providers {
        registry: Some(Arc::new(FixedRegistry(Some(OfficialName {
            first_name: "John".into(),
            last_name: "Smith".into(),
            title: None,
        })))),
        ..Providers::default()
    };
    let verifier = Arc::new(
        ScriptedVerifier::new(true).with("john.smith@oakstreetclinic.com", EmailStatus::Valid),
    );
    let mut config = test_config(&[]);
    config.verifier_key = Some("vk".into());

    let summary = orchestrator(config, providers, verifier, store.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.registry_hits, 1);
    assert_eq!(summary.contacts_persisted, 1);
    let rows = store.all_contacts();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].email, "john.smith@oakstreetclinic.com");
    assert!(rows[0].email_verified);
}
