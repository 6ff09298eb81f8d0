use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use hearth_core::{
    ApplicationDoc, ApplicationRow, ApplicationStatus, FieldOrigin, HouseDoc, HouseRow,
    HouseStatus, RoomDoc, RoomRow, RoomStatus, RoomType, Source, UserDoc, UserRole, UserRow,
};
use hearth_reconcile::{
    ApplicationFilters, Catalog, FixedClock, HouseFilters, Page, ReconcileConfig, RoomFilters,
    Stores, UserFilters,
};
use hearth_storage::{MemoryCollection, MemoryParticipation, MemoryTable};

fn at(month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, month, day, 9, 0, 0).single().unwrap()
}

fn house_row(id: &str, content_ref: Option<&str>, name: &str, status: HouseStatus, occupancy: i32) -> HouseRow {
    HouseRow {
        id: id.into(),
        content_ref: content_ref.map(str::to_string),
        name: name.into(),
        status,
        city: Some("Portland".into()),
        capacity: 4,
        occupancy,
        monthly_rent_cents: Some(120_000),
        created_at: at(1, 1),
    }
}

fn house_doc(id: &str, name: &str, tagline: &str) -> HouseDoc {
    HouseDoc {
        content_id: id.into(),
        name: Some(name.into()),
        slug: None,
        tagline: Some(tagline.into()),
        description: None,
        hero_image: None,
        gallery: Vec::new(),
        amenities: vec!["garden".into()],
        city: None,
    }
}

fn room_row(id: &str, content_ref: Option<&str>, house_id: &str, name: &str, price: i64) -> RoomRow {
    RoomRow {
        id: id.into(),
        content_ref: content_ref.map(str::to_string),
        house_id: house_id.into(),
        name: name.into(),
        room_type: RoomType::Private,
        status: RoomStatus::Available,
        capacity: 1,
        occupied: 0,
        monthly_price_cents: Some(price),
        available_from: None,
    }
}

fn room_doc(id: &str, name: &str, description: &str) -> RoomDoc {
    RoomDoc {
        content_id: id.into(),
        name: Some(name.into()),
        description: Some(description.into()),
        images: Vec::new(),
        features: vec!["skylight".into()],
    }
}

fn user_row(id: &str, content_ref: Option<&str>, name: &str, role: UserRole, house_id: &str) -> UserRow {
    UserRow {
        id: id.into(),
        content_ref: content_ref.map(str::to_string),
        email: format!("{id}@hearth.example"),
        display_name: name.into(),
        role,
        house_id: Some(house_id.into()),
        joined_at: at(1, 15),
    }
}

fn user_doc(id: &str, name: &str, bio: &str) -> UserDoc {
    UserDoc {
        content_id: id.into(),
        display_name: Some(name.into()),
        bio: Some(bio.into()),
        avatar: None,
        pronouns: None,
        interests: Vec::new(),
    }
}

fn application_row(
    id: &str,
    content_ref: Option<&str>,
    user_id: &str,
    status: ApplicationStatus,
    submitted_at: DateTime<Utc>,
) -> ApplicationRow {
    ApplicationRow {
        id: id.into(),
        content_ref: content_ref.map(str::to_string),
        user_id: user_id.into(),
        house_id: "h1".into(),
        status,
        submitted_at: Some(submitted_at),
        reviewed_at: None,
        move_in_date: None,
    }
}

fn application_doc(id: &str, statement: &str) -> ApplicationDoc {
    ApplicationDoc {
        content_id: id.into(),
        statement: Some(statement.into()),
        answers: Vec::new(),
        portfolio_url: None,
    }
}

struct Community {
    houses: Arc<MemoryTable<HouseRow>>,
    catalog: Catalog,
}

/// Every family holds one row with a document, one row without, and one
/// document without a row.
fn community() -> Community {
    let houses = Arc::new(MemoryTable::new(vec![
        house_row("h1", Some("hd1"), "Maple House", HouseStatus::Active, 2),
        house_row("h2", None, "Oak House", HouseStatus::Full, 4),
    ]));
    let stores = Stores {
        houses: houses.clone(),
        house_docs: Arc::new(MemoryCollection::new(vec![
            house_doc("hd1", "Maple (draft copy)", "Porch and garden"),
            house_doc("hd2", "Cedar Loft", "Opening soon"),
        ])),
        rooms: Arc::new(MemoryTable::new(vec![
            room_row("rm1", Some("rd1"), "h1", "Attic", 90_000),
            room_row("rm2", None, "h2", "Bay window", 60_000),
        ])),
        room_docs: Arc::new(MemoryCollection::new(vec![
            room_doc("rd1", "Attic suite", "Sloped ceiling"),
            room_doc("rd2", "Cellar studio", "Quiet and cool"),
        ])),
        events: Arc::new(MemoryTable::new(Vec::new())),
        event_docs: Arc::new(MemoryCollection::new(Vec::new())),
        users: Arc::new(MemoryTable::new(vec![
            user_row("u1", Some("ud1"), "Ada", UserRole::Resident, "h1"),
            user_row("u2", None, "Bo", UserRole::Member, "h2"),
        ])),
        user_docs: Arc::new(MemoryCollection::new(vec![
            user_doc("ud1", "Ada L.", "Builds furniture"),
            user_doc("ud2", "Cy", "Visiting for the summer"),
        ])),
        applications: Arc::new(MemoryTable::new(vec![
            application_row("a1", Some("ad1"), "u1", ApplicationStatus::UnderReview, at(2, 20)),
            application_row("a2", None, "u2", ApplicationStatus::Rejected, at(2, 25)),
        ])),
        application_docs: Arc::new(MemoryCollection::new(vec![
            application_doc("ad1", "I tend the garden"),
            application_doc("ad2", "Half-finished statement"),
        ])),
        participation: Arc::new(MemoryParticipation::default()),
    };
    let clock = Arc::new(FixedClock(at(3, 1)));
    Community {
        houses,
        catalog: Catalog::new(stores, ReconcileConfig::default(), clock),
    }
}

fn page() -> Page {
    Page::new(0, 20)
}

#[tokio::test]
async fn houses_classify_and_filter() {
    let community = community();
    let listing = community
        .catalog
        .list_houses(&HouseFilters::default(), page())
        .await
        .unwrap();
    let summary = listing
        .items
        .iter()
        .map(|h| (h.id.as_str(), h.source))
        .collect::<Vec<_>>();
    assert_eq!(
        summary,
        vec![("hd2", Source::Content), ("h1", Source::Both), ("h2", Source::Operational)]
    );

    let maple = &listing.items[1];
    assert_eq!(maple.fields.name.get().map(String::as_str), Some("Maple House"));
    assert_eq!(maple.fields.name.origin, FieldOrigin::Operational);
    assert_eq!(maple.fields.tagline.get().map(String::as_str), Some("Porch and garden"));
    assert_eq!(maple.metrics.available_beds, 2);

    let available = community
        .catalog
        .list_houses(
            &HouseFilters {
                available_only: true,
                ..HouseFilters::default()
            },
            page(),
        )
        .await
        .unwrap();
    let ids = available.items.iter().map(|h| h.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["h1"]);

    let full = community
        .catalog
        .list_houses(
            &HouseFilters {
                statuses: vec![HouseStatus::Full],
                ..HouseFilters::default()
            },
            page(),
        )
        .await
        .unwrap();
    let ids = full.items.iter().map(|h| h.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["h2"]);

    let by_document = community.catalog.get_house("hd1").await.unwrap();
    assert_eq!(by_document.id, "h1");
    assert_eq!(community.catalog.get_house("hd2").await.unwrap().source, Source::Content);
}

#[tokio::test]
async fn rooms_carry_their_house_name_from_one_lookup() {
    let community = community();
    let listing = community
        .catalog
        .list_rooms(&RoomFilters::default(), page())
        .await
        .unwrap();
    let summary = listing
        .items
        .iter()
        .map(|r| (r.id.as_str(), r.source))
        .collect::<Vec<_>>();
    assert_eq!(
        summary,
        vec![("rm1", Source::Both), ("rm2", Source::Operational), ("rd2", Source::Content)]
    );

    let attic = &listing.items[0];
    assert_eq!(attic.fields.name.get().map(String::as_str), Some("Attic"));
    assert_eq!(attic.fields.description.get().map(String::as_str), Some("Sloped ceiling"));
    assert_eq!(attic.fields.house_name.get().map(String::as_str), Some("Maple House"));
    assert_eq!(attic.fields.house_name.origin, FieldOrigin::Lookup);
    assert_eq!(
        listing.items[1].fields.house_name.get().map(String::as_str),
        Some("Oak House")
    );
    assert_eq!(listing.items[2].fields.house_name.get(), None);
    assert_eq!(community.houses.calls().batches(), 1);

    let room = community.catalog.get_room("rd1").await.unwrap();
    assert_eq!(room.id, "rm1");
    assert_eq!(room.fields.house_name.origin, FieldOrigin::Lookup);
}

#[tokio::test]
async fn room_price_cap_excludes_unpriced_and_verified_rows() {
    let community = community();
    let listing = community
        .catalog
        .list_rooms(
            &RoomFilters {
                max_price_cents: Some(70_000),
                ..RoomFilters::default()
            },
            page(),
        )
        .await
        .unwrap();
    let ids = listing.items.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["rm2"]);
}

#[tokio::test]
async fn users_classify_and_filter_by_role() {
    let community = community();
    let listing = community
        .catalog
        .list_users(&UserFilters::default(), page())
        .await
        .unwrap();
    let summary = listing
        .items
        .iter()
        .map(|u| (u.id.as_str(), u.source))
        .collect::<Vec<_>>();
    assert_eq!(
        summary,
        vec![("u1", Source::Both), ("u2", Source::Operational), ("ud2", Source::Content)]
    );

    let residents = community
        .catalog
        .list_users(
            &UserFilters {
                roles: vec![UserRole::Resident],
                ..UserFilters::default()
            },
            page(),
        )
        .await
        .unwrap();
    assert_eq!(residents.items.len(), 1);
    let ada = &residents.items[0];
    assert_eq!(ada.id, "u1");
    assert_eq!(ada.fields.display_name.get().map(String::as_str), Some("Ada"));
    assert_eq!(ada.fields.bio.get().map(String::as_str), Some("Builds furniture"));
    assert_eq!(ada.fields.bio.origin, FieldOrigin::Content);
    assert!(ada.metrics.is_resident);

    assert_eq!(
        community.catalog.get_user("u2").await.unwrap().source,
        Source::Operational
    );
}

#[tokio::test]
async fn applications_sort_newest_first_and_filter_by_applicant() {
    let community = community();
    let listing = community
        .catalog
        .list_applications(&ApplicationFilters::default(), page())
        .await
        .unwrap();
    let summary = listing
        .items
        .iter()
        .map(|a| (a.id.as_str(), a.source))
        .collect::<Vec<_>>();
    assert_eq!(
        summary,
        vec![("a2", Source::Operational), ("a1", Source::Both), ("ad2", Source::Content)]
    );

    let mine = community
        .catalog
        .list_applications(
            &ApplicationFilters {
                user_id: Some("u1".into()),
                ..ApplicationFilters::default()
            },
            page(),
        )
        .await
        .unwrap();
    let ids = mine.items.iter().map(|a| a.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["a1"]);

    let open = community
        .catalog
        .list_applications(
            &ApplicationFilters {
                open_only: true,
                ..ApplicationFilters::default()
            },
            page(),
        )
        .await
        .unwrap();
    let ids = open.items.iter().map(|a| a.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["a1", "ad2"]);

    let application = community.catalog.get_application("ad1").await.unwrap();
    assert_eq!(application.id, "a1");
    assert_eq!(
        application.fields.statement.get().map(String::as_str),
        Some("I tend the garden")
    );
    assert_eq!(application.metrics.days_since_submitted, Some(9));
}
