//! Entity, class, object and tag integration tests

use sof_core::{RecordKind, Registration, RegistryError, RegistrySettings};
use sof_types::{Account, EntityId, EntityKind, RoleId, TagId, TagKind};

mod common;
use common::TestFixture;

#[tokio::test]
async fn test_register_entity_with_tags() {
    let fixture = TestFixture::new().await;
    let role = fixture.role("gate.owner").await;
    let fuel = fixture.tag(TagKind::Property, "fuel").await;
    let hub = fixture.tag(TagKind::ResourceRelation, "hub").await;
    let id = EntityId::from(100u64);

    fixture
        .registry
        .register_entity(&fixture.owner, &id, &role, &[fuel, hub])
        .await
        .unwrap();

    let record = fixture.registry.entity(&id).await.unwrap().unwrap();
    assert_eq!(record.kind, EntityKind::Singleton);
    assert_eq!(record.access_role, role);
    assert_eq!(fixture.registry.tags_of(&id).await.unwrap(), vec![fuel, hub]);
    assert_eq!(
        fixture.registry.entities().tags_of(&id, TagKind::Property).await.unwrap(),
        vec![fuel]
    );
    assert_eq!(fixture.registry.entities_tagged(&hub).await.unwrap(), vec![id]);
}

#[tokio::test]
async fn test_register_twice_reports_existing_kind() {
    let fixture = TestFixture::new().await;
    let role = fixture.role("r").await;
    let class = fixture.class(1, &role).await;

    let err = fixture
        .registry
        .register_entity(&fixture.owner, &class, &role, &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::AlreadyExists {
            kind: RecordKind::Class,
            ..
        }
    ));
}

#[tokio::test]
async fn test_register_requires_active_role() {
    let fixture = TestFixture::new().await;
    let missing = RoleId::from_name("missing");
    let id = EntityId::from(5u64);

    let err = fixture
        .registry
        .register_entity(&fixture.owner, &id, &missing, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::RoleNotFound(role) if role == missing));
    assert!(!fixture.registry.entity_exists(&id).await.unwrap());
}

#[tokio::test]
async fn test_lazy_role_creation() {
    let fixture = TestFixture::with_settings(RegistrySettings {
        lazy_role_creation: true,
        ..RegistrySettings::default()
    })
    .await;
    let role = RoleId::from_name("lazy");
    let id = fixture.entity(5, &role).await;

    assert!(fixture.registry.role_exists(&role).await.unwrap());
    assert_eq!(fixture.registry.role_admin(&role).await.unwrap(), Some(role));
    assert_eq!(
        fixture.registry.entities().access_role_of(&id).await.unwrap(),
        Some(role)
    );
}

#[tokio::test]
async fn test_register_with_unknown_tag_rolls_back() {
    let fixture = TestFixture::new().await;
    let role = fixture.role("r").await;
    let id = EntityId::from(7u64);
    let unknown = TagId::new(TagKind::Property, "unknown");

    let err = fixture
        .registry
        .register_entity(&fixture.owner, &id, &role, &[unknown])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::NotFound {
            kind: RecordKind::Tag,
            ..
        }
    ));
    assert!(!fixture.registry.entity_exists(&id).await.unwrap());
}

#[tokio::test]
async fn test_object_requires_class() {
    let fixture = TestFixture::new().await;
    let role = fixture.role("r").await;
    let singleton = fixture.entity(1, &role).await;

    let err = fixture
        .registry
        .register_object(&fixture.owner, &EntityId::from(2u64), &role, Some(&singleton), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidStateTransition(_)));

    let err = fixture
        .registry
        .register_object(
            &fixture.owner,
            &EntityId::from(2u64),
            &role,
            Some(&EntityId::from(3u64)),
            &[],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn test_set_class_moves_object() {
    let fixture = TestFixture::new().await;
    let role = fixture.role("r").await;
    let c1 = fixture.class(1, &role).await;
    let c2 = fixture.class(2, &role).await;
    let object = fixture.object(10, &role, Some(&c1)).await;
    let sibling = fixture.object(11, &role, Some(&c1)).await;

    assert!(fixture.registry.set_class(&fixture.owner, &object, &c2).await.unwrap());
    assert!(!fixture.registry.set_class(&fixture.owner, &object, &c2).await.unwrap());

    assert_eq!(fixture.registry.objects_of(&c1).await.unwrap(), vec![sibling]);
    assert_eq!(fixture.registry.objects_of(&c2).await.unwrap(), vec![object]);
    assert_eq!(fixture.registry.entities().class_of(&object).await.unwrap(), Some(c2));

    assert_eq!(
        fixture.registry.clear_class(&fixture.owner, &object).await.unwrap(),
        Some(c2)
    );
    assert_eq!(fixture.registry.clear_class(&fixture.owner, &object).await.unwrap(), None);
    assert!(fixture.registry.objects_of(&c2).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_set_class_rejects_non_objects() {
    let fixture = TestFixture::new().await;
    let role = fixture.role("r").await;
    let c1 = fixture.class(1, &role).await;
    let c2 = fixture.class(2, &role).await;

    let err = fixture.registry.set_class(&fixture.owner, &c1, &c2).await.unwrap_err();
    assert!(matches!(err, RegistryError::InvalidStateTransition(_)));

    let err = fixture
        .registry
        .set_class(&fixture.owner, &EntityId::from(99u64), &c2)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::NotFound {
            kind: RecordKind::Entity,
            ..
        }
    ));
}

#[tokio::test]
async fn test_entity_relation_tag_is_single_valued() {
    let fixture = TestFixture::new().await;
    let role = fixture.role("r").await;
    let owned_by = fixture.tag(TagKind::EntityRelation, "owned_by").await;
    let linked_to = fixture.tag(TagKind::EntityRelation, "linked_to").await;
    let id = fixture.entity(1, &role).await;

    fixture
        .registry
        .attach_tag(&fixture.owner, &id, &owned_by, Some(b"ship-7".to_vec()))
        .await
        .unwrap();
    assert_eq!(
        fixture.registry.entities().tag_value(&id, &owned_by).await.unwrap(),
        Some(b"ship-7".to_vec())
    );

    fixture
        .registry
        .attach_tag(&fixture.owner, &id, &linked_to, None)
        .await
        .unwrap();
    assert_eq!(
        fixture.registry.entities().tags_of(&id, TagKind::EntityRelation).await.unwrap(),
        vec![linked_to]
    );
    assert!(fixture.registry.entities_tagged(&owned_by).await.unwrap().is_empty());
    let record = fixture.registry.entity(&id).await.unwrap().unwrap();
    assert_eq!(record.relation_tag, Some(linked_to));

    assert!(fixture
        .registry
        .detach_tag(&fixture.owner, &id, &linked_to)
        .await
        .unwrap());
    let record = fixture.registry.entity(&id).await.unwrap().unwrap();
    assert_eq!(record.relation_tag, None);
}

#[tokio::test]
async fn test_attach_is_idempotent_and_overwrites_value() {
    let fixture = TestFixture::new().await;
    let role = fixture.role("r").await;
    let fuel = fixture.tag(TagKind::Property, "fuel").await;
    let id = fixture.entity(1, &role).await;

    assert!(fixture
        .registry
        .attach_tag(&fixture.owner, &id, &fuel, Some(vec![1]))
        .await
        .unwrap());
    assert!(!fixture
        .registry
        .attach_tag(&fixture.owner, &id, &fuel, Some(vec![2]))
        .await
        .unwrap());
    assert_eq!(fixture.registry.tags_of(&id).await.unwrap(), vec![fuel]);
    assert_eq!(
        fixture.registry.entities().tag_value(&id, &fuel).await.unwrap(),
        Some(vec![2])
    );
}

#[tokio::test]
async fn test_deregister_clears_every_tag_reverse_set() {
    let fixture = TestFixture::new().await;
    let role = fixture.role("r").await;
    let tags = [
        fixture.tag(TagKind::Property, "a").await,
        fixture.tag(TagKind::Property, "b").await,
        fixture.tag(TagKind::ResourceRelation, "c").await,
        fixture.tag(TagKind::EntityRelation, "d").await,
    ];
    let doomed = EntityId::from(1u64);
    let survivor = EntityId::from(2u64);
    for id in [&doomed, &survivor] {
        fixture
            .registry
            .register_entity(&fixture.owner, id, &role, &tags)
            .await
            .unwrap();
    }

    let record = fixture.registry.deregister(&fixture.owner, &doomed).await.unwrap();
    assert_eq!(record.kind, EntityKind::Singleton);

    for tag in &tags {
        assert_eq!(
            fixture.registry.entities_tagged(tag).await.unwrap(),
            vec![survivor],
            "reverse set of {}",
            tag
        );
    }
    assert!(fixture.registry.tags_of(&doomed).await.unwrap().is_empty());
    assert!(!fixture.registry.entity_exists(&doomed).await.unwrap());

    let err = fixture
        .registry
        .deregister(&fixture.owner, &doomed)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { .. }));
}

#[tokio::test]
async fn test_deregister_class_orphans_objects() {
    let fixture = TestFixture::new().await;
    let role = fixture.role("r").await;
    let class = fixture.class(1, &role).await;
    let objects = [
        fixture.object(10, &role, Some(&class)).await,
        fixture.object(11, &role, Some(&class)).await,
    ];

    fixture.registry.deregister(&fixture.owner, &class).await.unwrap();

    assert!(fixture.registry.objects_of(&class).await.unwrap().is_empty());
    for object in &objects {
        let record = fixture.registry.entity(object).await.unwrap().unwrap();
        assert_eq!(record.class, None);
    }

    // The id can be reused, with a different kind
    fixture
        .registry
        .register(&fixture.owner, &Registration::entity(class, role))
        .await
        .unwrap();
    assert_eq!(
        fixture.registry.entity(&class).await.unwrap().unwrap().kind,
        EntityKind::Singleton
    );
}

#[tokio::test]
async fn test_delete_tag_detaches_everywhere() {
    let fixture = TestFixture::new().await;
    let role = fixture.role("r").await;
    let fuel = fixture.tag(TagKind::Property, "fuel").await;
    let a = fixture.entity(1, &role).await;
    let b = fixture.entity(2, &role).await;
    for id in [&a, &b] {
        fixture.registry.attach_tag(&fixture.owner, id, &fuel, None).await.unwrap();
    }

    let mut detached = fixture.registry.delete_tag(&fixture.owner, &fuel).await.unwrap();
    detached.sort();
    assert_eq!(detached, vec![a, b]);
    assert!(fixture.registry.tags_of(&a).await.unwrap().is_empty());
    assert!(!fixture.registry.tags().tag_exists(&fuel).await.unwrap());

    let err = fixture
        .registry
        .attach_tag(&fixture.owner, &a, &fuel, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::NotFound {
            kind: RecordKind::Tag,
            ..
        }
    ));
}

#[tokio::test]
async fn test_set_access_role() {
    let fixture = TestFixture::new().await;
    let first = fixture.role("first").await;
    let second = fixture.role("second").await;
    let id = fixture.entity(1, &first).await;

    let previous = fixture
        .registry
        .set_access_role(&fixture.owner, &id, &second)
        .await
        .unwrap();
    assert_eq!(previous, first);
    assert_eq!(
        fixture.registry.entities().access_role_of(&id).await.unwrap(),
        Some(second)
    );

    let err = fixture
        .registry
        .set_access_role(&Account::from(5), &id, &RoleId::from_name("none"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::RoleNotFound(_)));
}
