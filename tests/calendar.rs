use chrono::NaiveDate;
use tokio::sync::broadcast::error::TryRecvError;
use usermetrics::{
    calendar::DailyValue::{self, Absent, Value},
    projector::{events::ProjectorEvent, CalendarProjector},
    store::metrics::{LocalUserStore, UserLookup},
    theme::{ColorTheme, ColorThemeProvider, PaletteThemeProvider},
    utils::clock::FixedClock,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 100, 95, three zeros, 90, 85, 80, 75, 27 zeros, 70, 65.
fn steps() -> Vec<DailyValue> {
    let mut values = vec![100., 95., 0., 0., 0., 90., 85., 80., 75.];
    values.extend([0.; 27]);
    values.extend([70., 65.]);
    values.into_iter().map(Value).collect()
}

fn projector(store: LocalUserStore) -> CalendarProjector<LocalUserStore> {
    CalendarProjector::new(
        Box::new(FixedClock(date(2001, 1, 7))),
        store,
        Box::new(PaletteThemeProvider::default()),
    )
}

#[test]
fn test_series_is_projected_onto_both_months() {
    let mut store = LocalUserStore::new();
    let user = store.find_mut(&"alice".to_string());
    user.series("steps").set_series(date(2001, 1, 7), steps());
    user.series("steps").set_label_template("%1 steps today");

    let mut projector = projector(store);
    projector.set_username("alice");
    projector.refresh();

    assert_eq!(projector.current_day(), 7);
    assert_eq!(projector.label(), "100 steps today");

    let january = projector.first_month();
    assert_eq!((january.year(), january.month(), january.len()), (2001, 1, 31));
    assert_eq!(january.day(7), Value(100.));
    assert_eq!(january.day(6), Value(95.));
    assert_eq!(january.day(4), Value(0.));
    assert_eq!(january.day(2), Value(90.));
    assert_eq!(january.day(1), Value(85.));
    assert!((8..=31).all(|day| january.day(day) == Absent));

    let december = projector.second_month();
    assert_eq!((december.year(), december.month(), december.len()), (2000, 12, 31));
    assert_eq!(december.day(31), Value(80.));
    assert_eq!(december.day(30), Value(75.));
    assert!((3..=29).all(|day| december.day(day) == Value(0.)));
    assert_eq!(december.day(2), Value(70.));
    assert_eq!(december.day(1), Value(65.));

    let themes = PaletteThemeProvider::default().color_theme("steps");
    assert_eq!(*projector.first_color(), themes.primary);
    assert_eq!(*projector.second_color(), themes.secondary);
}

#[test]
fn test_stale_series_has_no_data_today() {
    let mut store = LocalUserStore::new();
    store
        .find_mut(&"bob".to_string())
        .series("calls")
        .set_series(date(2000, 12, 25), [5., 0., 3., 2.].map(Value));

    let mut projector = projector(store);
    projector.set_username("bob");
    projector.refresh();

    assert_eq!(projector.label(), "No data for today");
    assert!(projector.first_month().is_all_absent());
    let present = (1..=31)
        .filter(|day| projector.second_month().day(*day) != Absent)
        .collect::<Vec<_>>();
    assert_eq!(present, vec![22, 23, 24, 25]);
}

#[test]
fn test_unknown_user_gets_blank_calendar() {
    let mut projector = projector(LocalUserStore::new());
    projector.set_username("nobody");
    projector.refresh();

    assert_eq!(projector.label(), "No data sources available");
    assert!(projector.first_month().is_all_absent());
    assert!(projector.second_month().is_all_absent());
    assert_eq!(*projector.first_color(), ColorTheme::BLANK);
    // Looking the user up created an empty record for them.
    assert!(projector.store_mut().find_user("nobody").is_empty());
}

#[test]
fn test_observers_see_refresh_only() {
    let mut store = LocalUserStore::new();
    let user = store.find_mut(&"alice".to_string());
    user.series("steps").set_series(date(2001, 1, 7), [Value(1.)]);
    user.series("calls").set_series(date(2001, 1, 7), [Value(2.)]);

    let mut projector = projector(store);
    let mut events = projector.subscribe();

    projector.set_username("alice");
    projector.advance_source();
    assert_eq!(
        events.try_recv().unwrap(),
        ProjectorEvent::UsernameChanged("alice".into())
    );
    assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);
    assert_eq!(projector.label(), "No data sources available");

    projector.refresh();
    let labels = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|event| match event {
            ProjectorEvent::LabelChanged(label) => Some(label),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(labels, vec!["2".to_string()]);
    assert_eq!(projector.active_source(), Some("calls"));
}
