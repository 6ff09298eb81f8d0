use std::collections::HashMap;
use std::sync::Arc;

use hearth_core::{
    ApplicationDoc, ApplicationRow, ApplicationStatus, EntityKind, EventDoc, EventRow, HouseDoc, HouseRow,
    ParticipationRecord, RoomDoc, RoomRow, UserDoc, UserRow,
};
use hearth_mapping::{
    describe, status_catalog, Application, Event, House, HouseScoped, MergedEntity, Room,
    StatusDescriptor, User,
};
use hearth_storage::{ContentCollection, OperationalTable, ParticipationStore};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::{
    ApplicationFilters, Clock, EventFilters, HouseFilters, Listing, Page, ReconcileConfig,
    ReconcileError, ReconcileResult, Reconciler, RoomFilters, UserFilters,
};

/// Store clients for every entity family.
#[derive(Clone)]
pub struct Stores {
    pub houses: Arc<dyn OperationalTable<HouseRow>>,
    pub house_docs: Arc<dyn ContentCollection<HouseDoc>>,
    pub rooms: Arc<dyn OperationalTable<RoomRow>>,
    pub room_docs: Arc<dyn ContentCollection<RoomDoc>>,
    pub events: Arc<dyn OperationalTable<EventRow>>,
    pub event_docs: Arc<dyn ContentCollection<EventDoc>>,
    pub users: Arc<dyn OperationalTable<UserRow>>,
    pub user_docs: Arc<dyn ContentCollection<UserDoc>>,
    pub applications: Arc<dyn OperationalTable<ApplicationRow>>,
    pub application_docs: Arc<dyn ContentCollection<ApplicationDoc>>,
    pub participation: Arc<dyn ParticipationStore>,
}

impl Stores {
    /// One client serving every table, one serving every collection.
    pub fn shared<O, C, P>(operational: Arc<O>, content: Arc<C>, participation: Arc<P>) -> Self
    where
        O: OperationalTable<HouseRow>
            + OperationalTable<RoomRow>
            + OperationalTable<EventRow>
            + OperationalTable<UserRow>
            + OperationalTable<ApplicationRow>
            + 'static,
        C: ContentCollection<HouseDoc>
            + ContentCollection<RoomDoc>
            + ContentCollection<EventDoc>
            + ContentCollection<UserDoc>
            + ContentCollection<ApplicationDoc>
            + 'static,
        P: ParticipationStore + 'static,
    {
        Self {
            houses: operational.clone(),
            house_docs: content.clone(),
            rooms: operational.clone(),
            room_docs: content.clone(),
            events: operational.clone(),
            event_docs: content.clone(),
            users: operational.clone(),
            user_docs: content.clone(),
            applications: operational,
            application_docs: content,
            participation,
        }
    }
}

fn request_span(entity: &'static str, operation: &'static str) -> tracing::Span {
    info_span!(
        "reconcile",
        request_id = %Uuid::new_v4(),
        entity,
        operation
    )
}

/// Consumer-facing read API over both stores.
#[derive(Clone)]
pub struct Catalog {
    stores: Stores,
    reconciler: Reconciler,
}

impl Catalog {
    pub fn new(stores: Stores, config: ReconcileConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            stores,
            reconciler: Reconciler::new(config, clock),
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        self.reconciler.config()
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.reconciler.clock().now()
    }

    /// First page at the configured default size.
    pub fn default_page(&self) -> Page {
        Page::new(0, self.config().default_page_size)
    }

    pub async fn list_events(
        &self,
        filters: &EventFilters,
        page: Page,
        user_id: Option<&str>,
    ) -> ReconcileResult<Listing<Event>> {
        async {
            let listing = self
                .reconciler
                .list::<Event, _>(&*self.stores.events, &*self.stores.event_docs, filters, page)
                .await?;
            let (items, participation) = tokio::join!(
                self.attach_house_names(listing.items),
                self.participation_for(user_id),
            );
            let items = attach_participation(items?, participation?);
            info!(
                items = items.len(),
                has_more = listing.has_more,
                degraded = listing.degraded,
                "listed events"
            );
            Ok(Listing {
                items,
                has_more: listing.has_more,
                degraded: listing.degraded,
            })
        }
        .instrument(request_span("event", "list_events"))
        .await
    }

    pub async fn get_event(
        &self,
        id: &str,
        user_id: Option<&str>,
    ) -> ReconcileResult<MergedEntity<Event>> {
        async {
            let event = self
                .reconciler
                .get::<Event>(&*self.stores.events, &*self.stores.event_docs, id)
                .await?;
            let (items, participation) = tokio::join!(
                self.attach_house_names(vec![event]),
                self.participation_for(user_id),
            );
            attach_participation(items?, participation?)
                .pop()
                .ok_or_else(|| ReconcileError::NotFound {
                    entity: EntityKind::Event,
                    id: id.to_string(),
                })
        }
        .instrument(request_span("event", "get_event"))
        .await
    }

    /// Records a user's participation in an event that exists in either store.
    pub async fn record_participation(
        &self,
        record: ParticipationRecord,
    ) -> ReconcileResult<ParticipationRecord> {
        async {
            if record.user_id.trim().is_empty() {
                return Err(ReconcileError::validation("user_id must not be empty"));
            }
            let event = self
                .reconciler
                .get::<Event>(&*self.stores.events, &*self.stores.event_docs, &record.event_id)
                .await?;
            let record = ParticipationRecord {
                event_id: event.id,
                ..record
            };
            let saved = self
                .reconciler
                .operational_call(self.stores.participation.upsert(record))
                .await
                .map_err(|err| {
                    ReconcileError::operational(
                        EntityKind::Event,
                        "record_participation",
                        err,
                    )
                })?;
            info!(user_id = %saved.user_id, event_id = %saved.event_id, status = %saved.status, "recorded participation");
            Ok(saved)
        }
        .instrument(request_span("event", "record_participation"))
        .await
    }

    pub async fn list_houses(
        &self,
        filters: &HouseFilters,
        page: Page,
    ) -> ReconcileResult<Listing<House>> {
        self.reconciler
            .list::<House, _>(&*self.stores.houses, &*self.stores.house_docs, filters, page)
            .instrument(request_span("house", "list_houses"))
            .await
    }

    pub async fn get_house(&self, id: &str) -> ReconcileResult<MergedEntity<House>> {
        self.reconciler
            .get::<House>(&*self.stores.houses, &*self.stores.house_docs, id)
            .instrument(request_span("house", "get_house"))
            .await
    }

    pub async fn list_rooms(
        &self,
        filters: &RoomFilters,
        page: Page,
    ) -> ReconcileResult<Listing<Room>> {
        async {
            let listing = self
                .reconciler
                .list::<Room, _>(&*self.stores.rooms, &*self.stores.room_docs, filters, page)
                .await?;
            Ok(Listing {
                items: self.attach_house_names(listing.items).await?,
                ..listing
            })
        }
        .instrument(request_span("room", "list_rooms"))
        .await
    }

    pub async fn get_room(&self, id: &str) -> ReconcileResult<MergedEntity<Room>> {
        async {
            let room = self
                .reconciler
                .get::<Room>(&*self.stores.rooms, &*self.stores.room_docs, id)
                .await?;
            let mut rooms = self.attach_house_names(vec![room]).await?;
            rooms.pop().ok_or_else(|| ReconcileError::NotFound {
                entity: EntityKind::Room,
                id: id.to_string(),
            })
        }
        .instrument(request_span("room", "get_room"))
        .await
    }

    pub async fn list_users(
        &self,
        filters: &UserFilters,
        page: Page,
    ) -> ReconcileResult<Listing<User>> {
        self.reconciler
            .list::<User, _>(&*self.stores.users, &*self.stores.user_docs, filters, page)
            .instrument(request_span("user", "list_users"))
            .await
    }

    pub async fn get_user(&self, id: &str) -> ReconcileResult<MergedEntity<User>> {
        self.reconciler
            .get::<User>(&*self.stores.users, &*self.stores.user_docs, id)
            .instrument(request_span("user", "get_user"))
            .await
    }

    pub async fn list_applications(
        &self,
        filters: &ApplicationFilters,
        page: Page,
    ) -> ReconcileResult<Listing<Application>> {
        self.reconciler
            .list::<Application, _>(
                &*self.stores.applications,
                &*self.stores.application_docs,
                filters,
                page,
            )
            .instrument(request_span("application", "list_applications"))
            .await
    }

    pub async fn get_application(&self, id: &str) -> ReconcileResult<MergedEntity<Application>> {
        self.reconciler
            .get::<Application>(&*self.stores.applications, &*self.stores.application_docs, id)
            .instrument(request_span("application", "get_application"))
            .await
    }

    /// Descriptor for caller-supplied status text.
    pub fn describe_status(&self, status: &str) -> ReconcileResult<StatusDescriptor> {
        status
            .parse::<ApplicationStatus>()
            .map(describe)
            .map_err(|err| ReconcileError::validation(err.to_string()))
    }

    pub fn status_catalog(&self) -> Vec<(ApplicationStatus, StatusDescriptor)> {
        status_catalog()
    }

    /// Fills `house_name` from one batch lookup over every referenced house.
    async fn attach_house_names<E: HouseScoped>(
        &self,
        items: Vec<MergedEntity<E>>,
    ) -> ReconcileResult<Vec<MergedEntity<E>>> {
        let houses = self
            .reconciler
            .operational_call(
                self.reconciler
                    .batch()
                    .operational(&*self.stores.houses, items.iter().filter_map(|item| item.house_id())),
            )
            .await
            .map_err(|err| ReconcileError::operational(E::KIND, "house_lookup", err))?;
        Ok(items
            .into_iter()
            .map(|item| {
                let name = item
                    .house_id()
                    .and_then(|house_id| houses.get(house_id))
                    .map(|house| house.name.clone());
                item.with_house_name(name)
            })
            .collect())
    }

    async fn participation_for(
        &self,
        user_id: Option<&str>,
    ) -> ReconcileResult<HashMap<String, ParticipationRecord>> {
        let Some(user_id) = user_id.filter(|id| !id.trim().is_empty()) else {
            return Ok(HashMap::new());
        };
        let records = self
            .reconciler
            .operational_call(self.stores.participation.get_for_user(user_id))
            .await
            .map_err(|err| {
                ReconcileError::operational(EntityKind::Event, "participation_lookup", err)
            })?;
        Ok(records
            .into_iter()
            .map(|record| (record.event_id.clone(), record))
            .collect())
    }
}

/// Attaches each event's record by identity, operational id before content id.
fn attach_participation(
    items: Vec<MergedEntity<Event>>,
    mut by_event: HashMap<String, ParticipationRecord>,
) -> Vec<MergedEntity<Event>> {
    if by_event.is_empty() {
        return items;
    }
    items
        .into_iter()
        .map(|item| {
            let key = item
                .identities()
                .find(|id| by_event.contains_key(*id))
                .map(str::to_string);
            let record = key.and_then(|key| by_event.remove(&key));
            item.with_participation(record)
        })
        .collect()
}
