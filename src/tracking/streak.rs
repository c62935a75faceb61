use chrono::{Duration, NaiveDate};

use crate::models::activity::{Activity, ActivityView, DerivedActivityView, Progress};
use crate::tracking::history::{count_in_window, WINDOW_DAYS};

/// Everything the view shows for `activity` on `today`. Pure: the same
/// activity and day always give the same view.
pub fn derive_view(activity: &Activity, today: NaiveDate) -> DerivedActivityView {
    let weekly_count = count_in_window(activity, today);
    DerivedActivityView {
        weekly_count,
        weekly_percent: percent(weekly_count as usize, WINDOW_DAYS as usize),
        completed_today: activity.performed_dates.contains(&today),
        last_performed: activity.last_performed(),
        current_streak: current_streak(activity, today),
        longest_streak: longest_streak(activity),
    }
}

/// Consecutive days ending today, or ending yesterday while today is still open.
pub fn current_streak(activity: &Activity, today: NaiveDate) -> u32 {
    let dates = &activity.performed_dates;
    let mut check = if dates.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    for d in dates.range(..=check).rev() {
        if *d != check {
            break;
        }
        streak += 1;
        check -= Duration::days(1);
    }
    streak
}

pub fn longest_streak(activity: &Activity) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;
    for d in &activity.performed_dates {
        run = match prev {
            Some(p) if *d == p + Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(*d);
    }
    longest
}

/// How many activities are done today, out of all loaded ones.
pub fn progress(views: &[ActivityView]) -> Progress {
    let completed = views.iter().filter(|v| v.derived.completed_today).count();
    Progress {
        completed,
        total: views.len(),
        percent: percent(completed, views.len()),
    }
}

fn percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round().min(100.0) as u8
}
