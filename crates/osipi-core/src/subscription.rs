// ── Subscription manager ──
//
// Change detection over stream reads. Nothing polls on its own: every
// stream read made through a `Point` reports its result via `observe()`,
// which compares it with the last observation cached for each matching
// registration and fires callbacks when the value changed.
//
// Registrations are keyed by (point web-id, stream kind, optional
// timestamp). A keyed registration only watches the value at its own
// timestamp; an unkeyed one watches the whole result of a read.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::model::{Point, Value};
use crate::stream::{StreamArgs, StreamKind};

/// Change callback. Receives the point whose stream changed; its current
/// value slot has already been refreshed when the stream yields one.
pub type Callback = Arc<dyn Fn(&Point) + Send + Sync>;

/// Identifies one (point, stream, callback) registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// The registrations created by one `subscribe` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscriptions(BTreeSet<SubscriptionId>);

impl Subscriptions {
    pub fn ids(&self) -> impl Iterator<Item = SubscriptionId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.0.contains(&id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SubscriptionKey {
    web_id: String,
    stream: StreamKind,
    at: Option<String>,
}

#[derive(Default)]
struct Entry {
    /// `None` until the first observation after registration.
    last: Option<Vec<Value>>,
    callbacks: Vec<(SubscriptionId, Callback)>,
}

#[derive(Default)]
struct Registry {
    entries: IndexMap<SubscriptionKey, Entry>,
    active: HashMap<SubscriptionId, SubscriptionKey>,
}

impl Registry {
    fn remove_id(&mut self, id: SubscriptionId) -> bool {
        let Some(key) = self.active.remove(&id) else {
            return false;
        };
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.callbacks.retain(|(cb_id, _)| *cb_id != id);
            if entry.callbacks.is_empty() {
                self.entries.shift_remove(&key);
            }
        }
        true
    }
}

/// Registry of change callbacks, shared by every entity of a session.
pub struct SubscriptionManager {
    next_id: AtomicU64,
    registry: Mutex<Registry>,
}

impl fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("subscriptions", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            registry: Mutex::new(Registry::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // Callbacks run outside the lock, so a poisoned registry is still consistent.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `callback` for `stream` on every point in `points`.
    ///
    /// Points must come as a collection; a bare value is rejected at
    /// compile time:
    ///
    /// ```compile_fail
    /// # use osipi_core::{StreamArgs, StreamKind, SubscriptionManager};
    /// let manager = SubscriptionManager::new();
    /// manager.subscribe(1, StreamKind::Current, |_| {}, StreamArgs::default());
    /// ```
    pub fn subscribe<I, P>(
        &self,
        points: I,
        stream: StreamKind,
        callback: impl Fn(&Point) + Send + Sync + 'static,
        args: StreamArgs,
    ) -> Subscriptions
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Point>,
    {
        let callback: Callback = Arc::new(callback);
        let mut created = BTreeSet::new();
        let mut registry = self.lock();

        for point in points {
            let key = SubscriptionKey {
                web_id: point.as_ref().web_id().to_owned(),
                stream,
                at: args.at.clone(),
            };
            let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
            debug!(%id, web_id = %key.web_id, %stream, at = ?key.at, "subscribed");

            registry
                .entries
                .entry(key.clone())
                .or_default()
                .callbacks
                .push((id, Arc::clone(&callback)));
            registry.active.insert(id, key);
            created.insert(id);
        }

        Subscriptions(created)
    }

    /// Remove every registration for `stream` on the given points,
    /// whatever its timestamp key. Returns the number removed.
    pub fn unsubscribe<I, P>(&self, points: I, stream: StreamKind) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Point>,
    {
        let mut registry = self.lock();
        let mut removed = 0;

        for point in points {
            let web_id = point.as_ref().web_id();
            let ids: Vec<SubscriptionId> = registry
                .active
                .iter()
                .filter(|(_, key)| key.web_id == web_id && key.stream == stream)
                .map(|(id, _)| *id)
                .collect();
            for id in ids {
                if registry.remove_id(id) {
                    removed += 1;
                }
            }
            debug!(web_id, %stream, removed, "unsubscribed");
        }

        removed
    }

    /// Remove the given registrations. Returns the number still active
    /// beforehand.
    pub fn unsubscribe_ids(&self, subscriptions: &Subscriptions) -> usize {
        let mut registry = self.lock();
        subscriptions
            .ids()
            .filter(|id| registry.remove_id(*id))
            .count()
    }

    pub fn is_subscribed(&self, point: &Point, stream: StreamKind) -> bool {
        self.lock()
            .entries
            .keys()
            .any(|key| key.web_id == point.web_id() && key.stream == stream)
    }

    pub fn is_active(&self, id: SubscriptionId) -> bool {
        self.lock().active.contains_key(&id)
    }

    /// Number of active registrations.
    pub fn len(&self) -> usize {
        self.lock().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Report the result of a stream read.
    ///
    /// `values` is the read's result. `times` holds the requested
    /// timestamp of each value for reads made at explicit times and is
    /// empty otherwise. Returns how many callbacks ran.
    pub fn observe(
        &self,
        point: &Point,
        stream: StreamKind,
        values: &[Value],
        times: &[String],
    ) -> usize {
        if !times.is_empty() && times.len() != values.len() {
            warn!(
                web_id = point.web_id(),
                %stream,
                requested = times.len(),
                returned = values.len(),
                "value count differs from requested times; timestamp subscriptions skipped"
            );
        }

        let due: Vec<(SubscriptionId, Callback)> = {
            let mut registry = self.lock();
            let mut due = Vec::new();

            for (key, entry) in registry
                .entries
                .iter_mut()
                .filter(|(key, _)| key.web_id == point.web_id() && key.stream == stream)
            {
                let observed = match &key.at {
                    None => values.to_vec(),
                    Some(at) if times.len() == values.len() => {
                        match times.iter().position(|t| t == at) {
                            Some(i) => vec![values[i].clone()],
                            None => continue,
                        }
                    }
                    Some(_) => continue,
                };

                if entry.last.as_ref() == Some(&observed) {
                    trace!(web_id = %key.web_id, %stream, at = ?key.at, "unchanged");
                    continue;
                }

                debug!(
                    web_id = %key.web_id,
                    %stream,
                    at = ?key.at,
                    callbacks = entry.callbacks.len(),
                    "stream changed"
                );
                entry.last = Some(observed);
                due.extend(entry.callbacks.iter().cloned());
            }
            due
        };

        let mut fired = 0;
        for (id, callback) in due {
            // An earlier callback may have unsubscribed this one.
            if !self.is_active(id) {
                continue;
            }
            callback(point);
            fired += 1;
        }
        fired
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;
    use url::Url;

    use crate::session::Session;

    fn point(web_id: &str) -> Arc<Point> {
        let session = Session::new(osipi_api::PiClient::with_client(
            reqwest::Client::new(),
            Url::parse("https://pi.example.com/piwebapi").unwrap(),
            osipi_api::Credentials::Anonymous,
        ));
        Arc::new(Point::from_json(
            &json!({ "WebId": web_id, "Name": web_id, "PointType": "Float32" }),
            &session,
        ))
    }

    fn value(ts: &str, v: f64) -> Value {
        Value::from_json(&json!({ "Timestamp": ts, "Value": v }), None)
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Point) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move |_: &Point| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn first_observation_fires_then_only_changes() {
        let manager = SubscriptionManager::new();
        let p = point("P1");
        let (count, cb) = counter();
        manager.subscribe([&p], StreamKind::Current, cb, StreamArgs::default());

        let v1 = [value("2017-05-16T07:00:00Z", 1.0)];
        let v2 = [value("2017-05-16T07:05:00Z", 2.0)];

        assert_eq!(manager.observe(&p, StreamKind::Current, &v1, &[]), 1);
        assert_eq!(manager.observe(&p, StreamKind::Current, &v1, &[]), 0);
        assert_eq!(manager.observe(&p, StreamKind::Current, &v2, &[]), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn other_streams_and_points_do_not_fire() {
        let manager = SubscriptionManager::new();
        let (a, b) = (point("A"), point("B"));
        let (count, cb) = counter();
        manager.subscribe([&a], StreamKind::End, cb, StreamArgs::default());

        let v = [value("2017-05-16T07:00:00Z", 1.0)];
        manager.observe(&a, StreamKind::Current, &v, &[]);
        manager.observe(&b, StreamKind::End, &v, &[]);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn callbacks_fire_in_registration_order() {
        let manager = SubscriptionManager::new();
        let p = point("P1");
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            manager.subscribe(
                [&p],
                StreamKind::Current,
                move |_| order.lock().unwrap().push(n),
                StreamArgs::default(),
            );
        }
        manager.observe(&p, StreamKind::Current, &[value("2017-05-16T07:00:00Z", 1.0)], &[]);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn unsubscribe_removes_all_keys_for_stream() {
        let manager = SubscriptionManager::new();
        let p = point("P1");
        let (count, cb) = counter();
        let cb = Arc::new(cb);
        for at in [None, Some("2017-05-16T07:00:00Z")] {
            let cb = Arc::clone(&cb);
            manager.subscribe(
                [&p],
                StreamKind::InterpolatedAtTimes,
                move |pt: &Point| (*cb)(pt),
                StreamArgs { at: at.map(String::from) },
            );
        }
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.unsubscribe([&p], StreamKind::InterpolatedAtTimes), 2);
        assert!(!manager.is_subscribed(&p, StreamKind::InterpolatedAtTimes));

        let times = ["2017-05-16T07:00:00Z".to_string()];
        manager.observe(
            &p,
            StreamKind::InterpolatedAtTimes,
            &[value("2017-05-16T07:00:00Z", 1.0)],
            &times,
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn keyed_subscription_watches_its_timestamp_only() {
        let manager = SubscriptionManager::new();
        let p = point("P1");
        let (count, cb) = counter();
        manager.subscribe(
            [&p],
            StreamKind::InterpolatedAtTimes,
            cb,
            StreamArgs::at("2017-05-16T08:00:00Z"),
        );

        let (t1, t2) = ("2017-05-16T07:00:00Z", "2017-05-16T08:00:00Z");
        let times = [t1.to_string(), t2.to_string()];
        let first = [value(t1, 1.0), value(t2, 5.0)];
        let other_changed = [value(t1, 9.0), value(t2, 5.0)];
        let mine_changed = [value(t1, 9.0), value(t2, 6.0)];

        manager.observe(&p, StreamKind::InterpolatedAtTimes, &first, &times);
        manager.observe(&p, StreamKind::InterpolatedAtTimes, &other_changed, &times);
        manager.observe(&p, StreamKind::InterpolatedAtTimes, &mine_changed, &times);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn callback_can_unsubscribe_a_later_one() {
        let manager = Arc::new(SubscriptionManager::new());
        let p = point("P1");
        let (count, cb) = counter();

        let victim: Arc<Mutex<Option<Subscriptions>>> = Arc::default();
        let handle = Arc::clone(&victim);
        let mgr = Arc::clone(&manager);
        manager.subscribe(
            [&p],
            StreamKind::Current,
            move |_| {
                if let Some(subs) = handle.lock().unwrap().take() {
                    mgr.unsubscribe_ids(&subs);
                }
            },
            StreamArgs::default(),
        );
        let subs = manager.subscribe([&p], StreamKind::Current, cb, StreamArgs::default());
        *victim.lock().unwrap() = Some(subs);

        manager.observe(&p, StreamKind::Current, &[value("2017-05-16T07:00:00Z", 1.0)], &[]);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn subscriptions_track_created_ids() {
        let manager = SubscriptionManager::new();
        let points = vec![point("A"), point("B")];
        let subs = manager.subscribe(&points, StreamKind::Plot, |_| {}, StreamArgs::default());
        assert_eq!(subs.len(), 2);
        assert!(subs.ids().all(|id| manager.is_active(id)));
        assert_eq!(manager.unsubscribe_ids(&subs), 2);
        assert!(manager.is_empty());
    }
}
