use super::*;
use crate::db::Database;
use crate::rsvp::{RsvpStatus, RsvpStore};
use crate::user::{Argon2PasswordHasher, User, UserDirectory};
use chrono::{Duration, TimeZone};
use std::sync::Arc;

struct Fixture {
    users: UserDirectory,
    events: EventStore,
    rsvps: RsvpStore,
}

fn fixture() -> Fixture {
    let database = Arc::new(Database::in_memory().expect("in-memory db failed"));
    Fixture {
        users: UserDirectory::new(database.clone(), Arc::new(Argon2PasswordHasher::with_cost(8, 1, 1).unwrap())),
        events: EventStore::new(database.clone()),
        rsvps: RsvpStore::new(database),
    }
}

impl Fixture {
    fn user(&self, name: &str) -> User {
        self.users
            .create(name, &format!("{}@example.com", name.to_lowercase()), "secret1")
            .expect("user create failed")
    }
}

fn new_event(title: &str, day: u32, capacity: u32, is_public: bool) -> NewEvent {
    let start = Utc.with_ymd_and_hms(2030, 5, day, 18, 0, 0).unwrap();
    NewEvent {
        title: title.to_string(),
        description: String::new(),
        location: "Town hall".to_string(),
        start_time: start,
        end_time: start + Duration::hours(2),
        capacity,
        is_public,
    }
}

#[test]
fn test_create_and_find_by_id() {
    let f = fixture();
    let organizer = f.user("Olive");

    let created = f
        .events
        .create(new_event("Rust meetup", 10, 20, true), organizer.id)
        .expect("create failed");

    assert_eq!(created.title, "Rust meetup");
    assert_eq!(created.capacity, 20);
    assert_eq!(created.organizer, organizer.id);
    assert!(created.attendees.is_empty());
    assert!(created.is_organized_by(organizer.id));

    let found = f.events.find_by_id(created.id).unwrap().unwrap();
    assert_eq!(found, created);
    assert!(f.events.find_by_id(Uuid::now_v7()).unwrap().is_none());
}

#[test]
fn test_find_lists_public_events_by_start_time() {
    let f = fixture();
    let organizer = f.user("Olive");

    f.events.create(new_event("Late", 20, 0, true), organizer.id).unwrap();
    f.events.create(new_event("Early", 1, 0, true), organizer.id).unwrap();
    f.events.create(new_event("Hidden", 5, 0, false), organizer.id).unwrap();
    f.events.create(new_event("Middle", 10, 0, true), organizer.id).unwrap();

    let listed = f.events.find(&EventFilter::public()).unwrap();
    let titles: Vec<&str> = listed.iter().map(|(e, _)| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Early", "Middle", "Late"]);

    let (_, org) = &listed[0];
    assert_eq!(org.id, organizer.id);
    assert_eq!(org.name, "Olive");
}

#[test]
fn test_find_organizer_sees_own_private_events() {
    let f = fixture();
    let olive = f.user("Olive");
    let pete = f.user("Pete");

    f.events.create(new_event("Olive public", 1, 0, true), olive.id).unwrap();
    f.events.create(new_event("Olive private", 2, 0, false), olive.id).unwrap();
    f.events.create(new_event("Pete public", 3, 0, true), pete.id).unwrap();

    let mine = f.events.find(&EventFilter::organized_by(olive.id)).unwrap();
    let titles: Vec<&str> = mine.iter().map(|(e, _)| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Olive public", "Olive private"]);
}

#[test]
fn test_find_search_is_case_insensitive_substring() {
    let f = fixture();
    let organizer = f.user("Olive");

    f.events.create(new_event("Rust Meetup", 1, 0, true), organizer.id).unwrap();
    f.events.create(new_event("Go meetup", 2, 0, true), organizer.id).unwrap();
    f.events.create(new_event("Crab (rust) night", 3, 0, true), organizer.id).unwrap();

    let found = f.events.find(&EventFilter::public().with_search("RUST")).unwrap();
    let titles: Vec<&str> = found.iter().map(|(e, _)| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Rust Meetup", "Crab (rust) night"]);

    // Regex metacharacters are literal
    let found = f.events.find(&EventFilter::public().with_search("(rust)")).unwrap();
    assert_eq!(found.len(), 1);

    let all = f.events.find(&EventFilter::public().with_search("   ")).unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn test_update_fields_applies_only_set_fields() {
    let f = fixture();
    let organizer = f.user("Olive");
    let event = f
        .events
        .create(new_event("Rust meetup", 10, 20, true), organizer.id)
        .unwrap();

    let patch = EventPatch {
        title: Some("Rust meetup #2".to_string()),
        capacity: Some(5),
        is_public: Some(false),
        ..EventPatch::default()
    };
    assert!(!patch.is_empty());

    let updated = match f.events.update_fields(event.id, &patch).unwrap() {
        FieldUpdate::Updated(event) => event,
        other => panic!("expected update, got {:?}", other),
    };
    assert_eq!(updated.title, "Rust meetup #2");
    assert_eq!(updated.capacity, 5);
    assert!(!updated.is_public);
    assert_eq!(updated.location, event.location);
    assert_eq!(updated.start_time, event.start_time);
    assert!(updated.updated_at >= event.updated_at);
}

#[test]
fn test_update_missing_event() {
    let f = fixture();
    let patch = EventPatch {
        title: Some("x".to_string()),
        capacity: Some(4),
        ..EventPatch::default()
    };
    assert_eq!(
        f.events.update_fields(Uuid::now_v7(), &patch).unwrap(),
        FieldUpdate::EventMissing
    );
    assert!(EventPatch::default().is_empty());
}

#[test]
fn test_capacity_update_rechecked_against_late_admission() {
    let f = fixture();
    let organizer = f.user("Olive");
    let ann = f.user("Ann");
    let bob = f.user("Bob");
    let event = f.events.create(new_event("Workshop", 1, 3, true), organizer.id).unwrap();
    f.events.add_attendee_within_capacity(event.id, ann.id).unwrap();

    // Validated while only Ann attends
    let current = f.events.find_by_id(event.id).unwrap().unwrap();
    let patch = crate::validation::UpdateEventPayload {
        capacity: Some(1),
        ..Default::default()
    }
    .validate(&current)
    .expect("one seat for one attendee is valid");

    // Bob is admitted before the write lands
    assert_eq!(
        f.events.add_attendee_within_capacity(event.id, bob.id).unwrap(),
        Admission::Admitted
    );

    assert_eq!(
        f.events.update_fields(event.id, &patch).unwrap(),
        FieldUpdate::CapacityBelowAttendees { attending: 2 }
    );
    let stored = f.events.find_by_id(event.id).unwrap().unwrap();
    assert_eq!(stored.capacity, 3);
    assert_eq!(stored.attendees, vec![ann.id, bob.id]);
}

#[test]
fn test_capacity_update_allows_unlimited_and_exact_fit() {
    let f = fixture();
    let organizer = f.user("Olive");
    let event = f.events.create(new_event("Workshop", 1, 5, true), organizer.id).unwrap();
    for name in ["Ann", "Bob"] {
        let user = f.user(name);
        f.events.add_attendee_within_capacity(event.id, user.id).unwrap();
    }

    for capacity in [2, 0] {
        let patch = EventPatch {
            capacity: Some(capacity),
            ..EventPatch::default()
        };
        match f.events.update_fields(event.id, &patch).unwrap() {
            FieldUpdate::Updated(updated) => assert_eq!(updated.capacity, capacity),
            other => panic!("capacity {} rejected: {:?}", capacity, other),
        }
    }
}

#[test]
fn test_admission_respects_capacity() {
    let f = fixture();
    let organizer = f.user("Olive");
    let ann = f.user("Ann");
    let bob = f.user("Bob");
    let event = f.events.create(new_event("Tiny", 1, 1, true), organizer.id).unwrap();

    assert_eq!(
        f.events.add_attendee_within_capacity(event.id, ann.id).unwrap(),
        Admission::Admitted
    );
    assert_eq!(
        f.events.add_attendee_within_capacity(event.id, ann.id).unwrap(),
        Admission::AlreadyAttending
    );
    assert_eq!(
        f.events.add_attendee_within_capacity(event.id, bob.id).unwrap(),
        Admission::Full
    );

    let event = f.events.find_by_id(event.id).unwrap().unwrap();
    assert_eq!(event.attendees, vec![ann.id]);
}

#[test]
fn test_admission_unlimited_capacity() {
    let f = fixture();
    let organizer = f.user("Olive");
    let event = f.events.create(new_event("Open", 1, 0, true), organizer.id).unwrap();
    assert_eq!(event.capacity, 0);

    for name in ["Ann", "Bob", "Cat", "Dan"] {
        let user = f.user(name);
        assert_eq!(
            f.events.add_attendee_within_capacity(event.id, user.id).unwrap(),
            Admission::Admitted
        );
    }

    let event = f.events.find_by_id(event.id).unwrap().unwrap();
    assert_eq!(event.attendees.len(), 4);
}

#[test]
fn test_admission_to_missing_event() {
    let f = fixture();
    let ann = f.user("Ann");
    assert_eq!(
        f.events.add_attendee_within_capacity(Uuid::now_v7(), ann.id).unwrap(),
        Admission::EventMissing
    );
}

#[test]
fn test_remove_attendee_keeps_order_of_others() {
    let f = fixture();
    let organizer = f.user("Olive");
    let event = f.events.create(new_event("Ordered", 1, 0, true), organizer.id).unwrap();
    let ann = f.user("Ann");
    let bob = f.user("Bob");
    let cat = f.user("Cat");

    for user in [&ann, &bob, &cat] {
        f.events.add_attendee_within_capacity(event.id, user.id).unwrap();
    }

    assert!(f.events.remove_attendee(event.id, bob.id).unwrap());
    assert!(!f.events.remove_attendee(event.id, bob.id).unwrap());

    let event_after = f.events.find_by_id(event.id).unwrap().unwrap();
    assert_eq!(event_after.attendees, vec![ann.id, cat.id]);

    // Rejoining goes to the back
    f.events.add_attendee_within_capacity(event.id, bob.id).unwrap();
    let profiles = f.events.attendees(event.id).unwrap();
    let names: Vec<&str> = profiles.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["Ann", "Cat", "Bob"]);
}

#[test]
fn test_delete_cascades_rsvps_and_attendees() {
    let f = fixture();
    let organizer = f.user("Olive");
    let event = f.events.create(new_event("Doomed", 1, 0, true), organizer.id).unwrap();
    let other = f.events.create(new_event("Survivor", 2, 0, true), organizer.id).unwrap();

    let users: Vec<User> = ["Ann", "Bob", "Cat"].iter().map(|name| f.user(name)).collect();
    for user in &users {
        f.rsvps.upsert(event.id, user.id, RsvpStatus::Yes, None).unwrap();
        f.rsvps.upsert(other.id, user.id, RsvpStatus::Maybe, None).unwrap();
        f.events.add_attendee_within_capacity(event.id, user.id).unwrap();
    }

    assert!(f.events.delete(event.id).unwrap());

    assert!(f.events.find_by_id(event.id).unwrap().is_none());
    assert!(f.events.attendees(event.id).unwrap().is_empty());
    for user in &users {
        assert!(f.rsvps.find(event.id, user.id).unwrap().is_none());
        assert!(f.rsvps.find(other.id, user.id).unwrap().is_some());
    }

    assert!(!f.events.delete(event.id).unwrap());
}

#[test]
fn test_concurrent_admissions_never_exceed_capacity() {
    let f = fixture();
    let organizer = f.user("Olive");
    let event_id = f
        .events
        .create(new_event("Popular", 1, 3, true), organizer.id)
        .unwrap()
        .id;
    let users: Vec<User> = (0..12).map(|i| f.user(&format!("Guest{}", i))).collect();

    let events = Arc::new(f.events);
    let handles: Vec<_> = users
        .into_iter()
        .map(|user| {
            let events = Arc::clone(&events);
            std::thread::spawn(move || {
                events
                    .add_attendee_within_capacity(event_id, user.id)
                    .expect("admission failed")
            })
        })
        .collect();

    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|a| *a == Admission::Admitted)
        .count();

    assert_eq!(admitted, 3);
    let event = events.find_by_id(event_id).unwrap().unwrap();
    assert_eq!(event.attendees.len(), 3);
}

#[test]
fn test_filter_matches_title() {
    assert!(EventFilter::public().matches_title("anything"));
    assert!(EventFilter::public().with_search("ÜBER").matches_title("Über party"));
    assert!(!EventFilter::public().with_search("jazz").matches_title("Rust meetup"));
}
