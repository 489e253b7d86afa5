/// The two scheduled sweeps, both on Paris time like the original
/// deployment: the daily-unlock reminder just after midnight, and the J-14
/// reminder mid-morning. Each sweep is idempotent per day via a stamp on
/// the room document, so a restarted dispatcher never double-notifies.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use duo_store::RoomStore;
use duo_types::dates;

use crate::messenger::{Messenger, Notification};
use crate::{NotifyResult, data_payload, send_to_room};

pub const TIME_ZONE: Tz = chrono_tz::Europe::Paris;

/// 00:05 — "the word and the challenge are ready".
const DAILY_UNLOCK_AT: (u32, u32) = (0, 5);
/// 09:00 — two weeks to go.
const J14_AT: (u32, u32) = (9, 0);

fn date_key_in_tz(at: DateTime<Utc>) -> String {
    at.with_timezone(&TIME_ZONE).format("%Y-%m-%d").to_string()
}

/// Notify every room that has not yet been told about today's unlock, then
/// stamp it. Returns the number of rooms notified.
pub async fn daily_unlock_sweep<M: Messenger>(
    store: &RoomStore,
    messenger: &M,
    today_key: &str,
) -> NotifyResult<usize> {
    let mut notified = 0;
    for code in store.list_codes()? {
        let Some(doc) = store.get(&code)? else { continue };
        if doc.last_daily_notify.as_deref() == Some(today_key) {
            continue;
        }

        let notification = Notification {
            title: "Mot + mini défi dispo ✨".to_string(),
            body: "Le mot du jour et le mini défi sont prêts à être débloqués.".to_string(),
            data: data_payload(&[
                ("type", "daily-unlock"),
                ("roomId", &code),
                ("dateKey", today_key),
            ]),
        };
        if let Err(err) = send_to_room(store, messenger, &code, &notification).await {
            warn!(code = %code, "daily-unlock notification failed: {err}");
            continue;
        }
        store.stamp_daily_notify(&code, today_key)?;
        notified += 1;
    }
    Ok(notified)
}

/// Notify rooms whose reunion is exactly 14 days out, keyed on the target
/// date so a rescheduled reunion re-notifies but a rerun does not.
pub async fn j14_sweep<M: Messenger>(
    store: &RoomStore,
    messenger: &M,
    now: DateTime<Utc>,
) -> NotifyResult<usize> {
    let mut notified = 0;
    for code in store.list_codes()? {
        let Some(doc) = store.get(&code)? else { continue };
        let Some(target_ms) = dates::parse_target_iso(&doc.target_iso) else { continue };
        if dates::days_until(target_ms, now.timestamp_millis()) != 14 {
            continue;
        }

        let target_key = DateTime::<Utc>::from_timestamp_millis(target_ms)
            .map(date_key_in_tz)
            .unwrap_or_default();
        if doc.last_j14_notify.as_deref() == Some(target_key.as_str()) {
            continue;
        }

        let notification = Notification {
            title: "J-14 💖".to_string(),
            body: "Dans 14 jours, on se retrouve. Ça se rapproche !".to_string(),
            data: data_payload(&[
                ("type", "j-14"),
                ("roomId", &code),
                ("targetDateKey", &target_key),
            ]),
        };
        if let Err(err) = send_to_room(store, messenger, &code, &notification).await {
            warn!(code = %code, "J-14 notification failed: {err}");
            continue;
        }
        store.stamp_j14_notify(&code, &target_key)?;
        notified += 1;
    }
    Ok(notified)
}

/// Seconds until the next `hh:mm` in Paris. DST gaps resolve to the
/// following valid instant.
fn until_next(now: DateTime<Utc>, (hour, minute): (u32, u32)) -> Duration {
    let local = now.with_timezone(&TIME_ZONE);
    let mut day = local.date_naive();
    loop {
        if let Some(candidate) = day
            .and_hms_opt(hour, minute, 0)
            .and_then(|naive| TIME_ZONE.from_local_datetime(&naive).earliest())
        {
            if candidate > local {
                let seconds = (candidate - local).num_seconds().max(1) as u64;
                return Duration::from_secs(seconds);
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => return Duration::from_secs(60),
        }
    }
}

pub async fn run_daily_unlock_job<M: Messenger>(store: Arc<RoomStore>, messenger: Arc<M>) {
    loop {
        tokio::time::sleep(until_next(Utc::now(), DAILY_UNLOCK_AT)).await;
        let today_key = date_key_in_tz(Utc::now());
        match daily_unlock_sweep(&store, messenger.as_ref(), &today_key).await {
            Ok(count) if count > 0 => info!("daily-unlock sweep notified {count} rooms"),
            Ok(_) => {}
            Err(err) => warn!("daily-unlock sweep failed: {err}"),
        }
    }
}

pub async fn run_j14_job<M: Messenger>(store: Arc<RoomStore>, messenger: Arc<M>) {
    loop {
        tokio::time::sleep(until_next(Utc::now(), J14_AT)).await;
        match j14_sweep(&store, messenger.as_ref(), Utc::now()).await {
            Ok(count) if count > 0 => info!("J-14 sweep notified {count} rooms"),
            Ok(_) => {}
            Err(err) => warn!("J-14 sweep failed: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_until_next_rolls_to_tomorrow() {
        // 01:00 Paris is past 00:05, so the next unlock sweep is tomorrow.
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 23, 0, 0).unwrap(); // 01:00 Paris (CEST)
        let wait = until_next(now, DAILY_UNLOCK_AT);
        assert!(wait > Duration::from_secs(22 * 3600));
        assert!(wait < Duration::from_secs(24 * 3600));

        // And before the slot, it is later the same day.
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 5, 0, 0).unwrap(); // 07:00 Paris
        let wait = until_next(now, J14_AT);
        assert_eq!(wait, Duration::from_secs(2 * 3600));
    }

    #[test]
    fn test_date_key_uses_paris_time() {
        // 23:30 UTC on June 1 is already June 2 in Paris.
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 23, 30, 0).unwrap();
        assert_eq!(date_key_in_tz(now), "2026-06-02");
    }
}
