//! The lazily-fetched session store and its memoized queries.
//!
//! The dataset is fetched at most once for the store's lifetime. Every query
//! derives its answer from that cached sequence and memoizes the result, so
//! repeated calls with the same key are lookups. Caches populate
//! monotonically and are never invalidated; a value is computed outside the
//! lock and published whole.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use parking_lot::Mutex;

use crate::decode::decode_record;
use crate::error::SessionsError;
use crate::source::SessionSource;
use crate::types::{Bounds, Clinic, LatLng, Session, SessionHistograms};

type Result<T> = std::result::Result<T, SessionsError>;

/// Fetches the dataset at most once and answers memoized analytical queries
/// over it. Cheap to share behind an `Arc`; all methods take `&self`.
pub struct SessionStore {
    source: Arc<dyn SessionSource>,

    /// One-shot dataset cache. The async mutex is held across the fetch so
    /// concurrent first calls coalesce into a single request. A failed fetch
    /// leaves the slot empty and the next caller retries.
    sessions: tokio::sync::Mutex<Option<Arc<[Session]>>>,

    // Per-date memo caches. Four independent maps rather than one map of
    // partially-filled records, so each query publishes a whole value.
    by_day: Mutex<HashMap<NaiveDate, Arc<[Session]>>>,
    avg_duration: Mutex<HashMap<NaiveDate, Option<i64>>>,
    avg_distance: Mutex<HashMap<NaiveDate, Option<i64>>>,
    avg_age: Mutex<HashMap<NaiveDate, Option<i64>>>,

    histograms: Mutex<Option<Arc<SessionHistograms>>>,
    clinics: Mutex<Option<Arc<[Clinic]>>>,
}

impl SessionStore {
    pub fn new(source: Arc<dyn SessionSource>) -> Self {
        Self {
            source,
            sessions: tokio::sync::Mutex::new(None),
            by_day: Mutex::new(HashMap::new()),
            avg_duration: Mutex::new(HashMap::new()),
            avg_distance: Mutex::new(HashMap::new()),
            avg_age: Mutex::new(HashMap::new()),
            histograms: Mutex::new(None),
            clinics: Mutex::new(None),
        }
    }

    /// The decoded dataset, in source order. The first call fetches and
    /// decodes; later calls return the cached sequence without touching the
    /// source.
    pub async fn sessions(&self) -> Result<Arc<[Session]>> {
        let mut slot = self.sessions.lock().await;
        if let Some(sessions) = slot.as_ref() {
            return Ok(Arc::clone(sessions));
        }

        let raw = self.source.fetch().await?;
        let sessions: Arc<[Session]> = raw.iter().map(decode_record).collect();
        tracing::debug!(count = sessions.len(), "session dataset materialized");

        *slot = Some(Arc::clone(&sessions));
        Ok(sessions)
    }

    /// Sessions whose start or stop time falls on `day`. A session that
    /// spans midnight shows up under both of its days; a session with
    /// neither timestamp shows up under none.
    pub async fn sessions_on(&self, day: NaiveDate) -> Result<Arc<[Session]>> {
        if let Some(hit) = self.by_day.lock().get(&day) {
            return Ok(Arc::clone(hit));
        }

        let sessions = self.sessions().await?;
        let matching: Arc<[Session]> = sessions
            .iter()
            .filter(|s| session_touches_day(s, day))
            .cloned()
            .collect();

        Ok(Arc::clone(self.by_day.lock().entry(day).or_insert(matching)))
    }

    pub async fn num_sessions_on(&self, day: NaiveDate) -> Result<usize> {
        Ok(self.sessions_on(day).await?.len())
    }

    /// Mean session length in minutes on `day`, rounded half away from zero.
    /// `None` when no session on that day has a duration.
    pub async fn average_duration_on(&self, day: NaiveDate) -> Result<Option<i64>> {
        self.day_average(&self.avg_duration, day, |s| {
            s.duration_minutes.map(|d| d as f64)
        })
        .await
    }

    /// Mean distance traveled to the clinic on `day`, same rounding rule.
    pub async fn average_distance_on(&self, day: NaiveDate) -> Result<Option<i64>> {
        self.day_average(&self.avg_distance, day, |s| s.distance).await
    }

    /// Mean visitor age on `day`, from birth year and the session's start
    /// year. Sessions missing either are excluded.
    pub async fn average_age_on(&self, day: NaiveDate) -> Result<Option<i64>> {
        self.day_average(&self.avg_age, day, |s| {
            let (birth, start) = (s.birth_year?, s.start_time?);
            Some((i64::from(start.year()) - birth) as f64)
        })
        .await
    }

    async fn day_average(
        &self,
        cache: &Mutex<HashMap<NaiveDate, Option<i64>>>,
        day: NaiveDate,
        value: impl Fn(&Session) -> Option<f64>,
    ) -> Result<Option<i64>> {
        if let Some(hit) = cache.lock().get(&day) {
            return Ok(*hit);
        }

        let sessions = self.sessions_on(day).await?;
        let average = rounded_mean(sessions.iter().filter_map(value));

        Ok(*cache.lock().entry(day).or_insert(average))
    }

    /// All three frequency distributions, computed in a single pass over the
    /// dataset on first use and cached for the store's lifetime.
    pub async fn histograms(&self) -> Result<Arc<SessionHistograms>> {
        if let Some(hit) = self.histograms.lock().as_ref() {
            return Ok(Arc::clone(hit));
        }

        let sessions = self.sessions().await?;
        let computed = Arc::new(compute_histograms(&sessions));

        Ok(Arc::clone(self.histograms.lock().get_or_insert(computed)))
    }

    /// Sessions that started during each hour of the day (local time).
    pub async fn start_hour_counts(&self) -> Result<[u32; 24]> {
        Ok(self.histograms().await?.start_hours)
    }

    /// Sessions that stopped during each hour of the day (local time).
    pub async fn stop_hour_counts(&self) -> Result<[u32; 24]> {
        Ok(self.histograms().await?.stop_hours)
    }

    /// Count of sessions per exact duration in minutes. Length is one past
    /// the longest recorded duration; `[0]` when no session has one.
    pub async fn duration_counts(&self) -> Result<Vec<u32>> {
        Ok(self.histograms().await?.durations.clone())
    }

    /// Unique clinics referenced by the dataset, in first-appearance order.
    pub async fn clinics(&self) -> Result<Arc<[Clinic]>> {
        if let Some(hit) = self.clinics.lock().as_ref() {
            return Ok(Arc::clone(hit));
        }

        let sessions = self.sessions().await?;
        let computed: Arc<[Clinic]> = collect_clinics(&sessions).into();

        Ok(Arc::clone(self.clinics.lock().get_or_insert(computed)))
    }
}

/// Tight bounding box over clinic positions. Bounds of zero clinics are
/// undefined, so an empty slice is rejected rather than answered.
pub fn clinic_bounds(clinics: &[Clinic]) -> Result<Bounds> {
    let mut positions = clinics.iter().map(|c| c.position);
    let first = positions.next().ok_or_else(|| {
        SessionsError::InvalidInput("cannot compute bounds of zero clinics".into())
    })?;

    let mut bounds = Bounds {
        south_west: first,
        north_east: first,
    };
    for p in positions {
        bounds.south_west.lat = bounds.south_west.lat.min(p.lat);
        bounds.south_west.lng = bounds.south_west.lng.min(p.lng);
        bounds.north_east.lat = bounds.north_east.lat.max(p.lat);
        bounds.north_east.lng = bounds.north_east.lng.max(p.lng);
    }
    Ok(bounds)
}

fn session_touches_day(session: &Session, day: NaiveDate) -> bool {
    let on_day = |t: Option<NaiveDateTime>| t.is_some_and(|t| t.date() == day);
    on_day(session.start_time) || on_day(session.stop_time)
}

/// Mean rounded half away from zero; `None` for an empty iterator.
fn rounded_mean(values: impl Iterator<Item = f64>) -> Option<i64> {
    let mut sum = 0.0_f64;
    let mut count = 0_u32;
    for v in values {
        sum += v;
        count += 1;
    }

    if count == 0 {
        None
    } else {
        Some((sum / f64::from(count)).round() as i64)
    }
}

fn compute_histograms(sessions: &[Session]) -> SessionHistograms {
    let mut start_hours = [0_u32; 24];
    let mut stop_hours = [0_u32; 24];
    // Stays [0] when no session has a duration: max-of-empty defaults to 0.
    let mut durations = vec![0_u32; 1];

    for session in sessions {
        if let Some(t) = session.start_time {
            start_hours[t.hour() as usize] += 1;
        }
        if let Some(t) = session.stop_time {
            stop_hours[t.hour() as usize] += 1;
        }
        if let Some(Ok(d)) = session.duration_minutes.map(usize::try_from) {
            if d >= durations.len() {
                durations.resize(d + 1, 0);
            }
            durations[d] += 1;
        }
    }

    SessionHistograms {
        start_hours,
        stop_hours,
        durations,
    }
}

fn collect_clinics(sessions: &[Session]) -> Vec<Clinic> {
    let mut seen = HashSet::new();
    let mut clinics = Vec::new();

    for session in sessions {
        let (Some(name), Some(lat_raw), Some(lng_raw)) = (
            session.clinic_name.as_deref(),
            session.clinic_latitude.as_deref(),
            session.clinic_longitude.as_deref(),
        ) else {
            continue;
        };
        let (Ok(lat), Ok(lng)) = (lat_raw.trim().parse::<f64>(), lng_raw.trim().parse::<f64>())
        else {
            tracing::warn!(clinic = name, "skipping clinic with unparsable coordinates");
            continue;
        };

        // Dedup on the raw coordinate strings, not the parsed floats.
        if seen.insert((name.to_owned(), lat_raw.to_owned(), lng_raw.to_owned())) {
            clinics.push(Clinic {
                name: name.to_owned(),
                position: LatLng { lat, lng },
            });
        }
    }

    clinics
}
